//! Cart facade errors.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{cart::ProductId, remote::RemoteCartError};

/// Errors surfaced by [`crate::Cart`] and [`crate::sync::PendingSync`].
#[derive(Debug, Error)]
pub enum CartError {
    /// A server operation was requested with nobody signed in.
    #[error("no signed-in shopper; the cart is local only")]
    NotAuthenticated,

    /// The storefront API failed or refused the request.
    #[error("remote cart request failed")]
    Remote(#[source] RemoteCartError),

    /// The sync worker went away before answering.
    #[error("the sync worker stopped before answering")]
    WorkerStopped,

    /// Products with a negative price cannot be added.
    #[error("product {product_id} has a negative price ({price})")]
    NegativePrice {
        /// Offending product.
        product_id: ProductId,

        /// The price it was offered at.
        price: Decimal,
    },

    /// The line or cart total would not fit a [`Decimal`].
    #[error("adding {quantity} of product {product_id} at {price} overflows the cart total")]
    AmountOverflow {
        /// Offending product.
        product_id: ProductId,

        /// Unit price of the addition.
        price: Decimal,

        /// Requested quantity.
        quantity: i64,
    },
}

impl From<RemoteCartError> for CartError {
    fn from(error: RemoteCartError) -> Self {
        match error {
            RemoteCartError::Unauthenticated => Self::NotAuthenticated,
            error => Self::Remote(error),
        }
    }
}
