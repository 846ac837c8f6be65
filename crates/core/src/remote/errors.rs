//! Remote cart errors.

use std::error::Error as StdError;

use thiserror::Error;

/// Boxed source error from the transport layer.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// How a remote failure should be treated by the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorClass {
    /// Network failure, timeout or server-side error. Local state stays the
    /// source of truth and sync is retried later.
    Transient,

    /// The server refused the request, e.g. an item is no longer available.
    Rejected,

    /// The identity is no longer valid.
    Unauthorized,
}

/// Failure talking to the storefront cart API.
#[derive(Debug, Error)]
pub enum RemoteCartError {
    /// The request never produced a response.
    #[error("transport error")]
    Transport(#[source] BoxError),

    /// The server answered with a non-success status.
    #[error("remote cart returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if any.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("failed to decode remote cart response")]
    Decode(#[source] BoxError),

    /// No authenticated identity is available to talk to the server.
    #[error("no authenticated identity")]
    Unauthenticated,
}

impl RemoteCartError {
    /// Wrap a transport failure.
    pub fn transport(source: impl Into<BoxError>) -> Self {
        Self::Transport(source.into())
    }

    /// A non-success HTTP answer.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Wrap a body decoding failure.
    pub fn decode(source: impl Into<BoxError>) -> Self {
        Self::Decode(source.into())
    }

    /// HTTP status if the server answered.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// How the cart should react to this failure.
    pub fn class(&self) -> RemoteErrorClass {
        match self {
            Self::Transport(_) => RemoteErrorClass::Transient,
            Self::Status { status, .. } => match *status {
                401 | 403 => RemoteErrorClass::Unauthorized,
                408 | 425 | 429 | 500..=599 => RemoteErrorClass::Transient,
                _ => RemoteErrorClass::Rejected,
            },
            Self::Decode(_) => RemoteErrorClass::Rejected,
            Self::Unauthenticated => RemoteErrorClass::Unauthorized,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn server_errors_are_transient() {
        assert_eq!(
            RemoteCartError::status(503, "unavailable").class(),
            RemoteErrorClass::Transient
        );
        assert_eq!(
            RemoteCartError::status(429, "slow down").class(),
            RemoteErrorClass::Transient
        );
    }

    #[test]
    fn client_errors_are_rejections() {
        let error = RemoteCartError::status(422, "out of stock");

        assert_eq!(error.class(), RemoteErrorClass::Rejected);
        assert_eq!(error.status_code(), Some(422));
    }

    #[test]
    fn auth_failures_are_unauthorized() {
        assert_eq!(
            RemoteCartError::status(401, "expired").class(),
            RemoteErrorClass::Unauthorized
        );
        assert_eq!(
            RemoteCartError::Unauthenticated.class(),
            RemoteErrorClass::Unauthorized
        );
    }

    #[test]
    fn network_failures_are_transient() {
        let error =
            RemoteCartError::transport(io::Error::new(io::ErrorKind::ConnectionRefused, "down"));

        assert_eq!(error.class(), RemoteErrorClass::Transient);
        assert_eq!(error.status_code(), None);
    }
}
