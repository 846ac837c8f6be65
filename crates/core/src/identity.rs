//! Identity
//!
//! The cart only needs to know whether somebody is signed in, who, and which
//! bearer token to present. Sign-in screens and token refresh live elsewhere.

use std::sync::{PoisonError, RwLock};

use mockall::automock;

/// Authentication signal consumed by the cart.
#[automock]
pub trait Identity: Send + Sync {
    /// Whether remote sync should be attempted at all.
    fn is_authenticated(&self) -> bool;

    /// Stable identifier of the signed-in user.
    fn user_id(&self) -> Option<String>;

    /// Bearer token for the remote cart API.
    fn access_token(&self) -> Option<String>;
}

/// Signed-in user details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// Stable user identifier.
    pub user_id: String,

    /// Bearer token for the storefront API.
    pub token: String,
}

/// In-process session holder, shared between the cart and the auth flow.
#[derive(Debug, Default)]
pub struct Session {
    user: RwLock<Option<SessionUser>>,
}

impl Session {
    /// A session that starts signed out.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A session that starts signed in.
    #[must_use]
    pub fn signed_in(user_id: impl Into<String>, token: impl Into<String>) -> Self {
        let session = Self::default();
        session.sign_in(user_id, token);
        session
    }

    /// Replace whoever is signed in.
    pub fn sign_in(&self, user_id: impl Into<String>, token: impl Into<String>) {
        let mut user = self.user.write().unwrap_or_else(PoisonError::into_inner);

        *user = Some(SessionUser {
            user_id: user_id.into(),
            token: token.into(),
        });
    }

    /// Forget the signed-in user.
    pub fn sign_out(&self) {
        *self.user.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn current(&self) -> Option<SessionUser> {
        self.user
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Identity for Session {
    fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    fn user_id(&self) -> Option<String> {
        self.current().map(|user| user.user_id)
    }

    fn access_token(&self) -> Option<String> {
        self.current().map(|user| user.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_out() {
        let session = Session::anonymous();

        assert!(!session.is_authenticated());

        session.sign_in("u-1", "secret");

        assert!(session.is_authenticated());
        assert_eq!(session.user_id().as_deref(), Some("u-1"));
        assert_eq!(session.access_token().as_deref(), Some("secret"));

        session.sign_out();

        assert!(session.access_token().is_none());
    }
}
