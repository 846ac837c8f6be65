//! Remote Cart Client

use async_trait::async_trait;
use mockall::automock;

pub mod errors;
pub mod models;

pub use errors::{RemoteCartError, RemoteErrorClass};
pub use models::*;

/// REST collaborator holding the server-side cart of the signed-in shopper.
#[automock]
#[async_trait]
pub trait RemoteCartClient: Send + Sync {
    /// `GET /cart`
    async fn fetch_cart(&self) -> Result<RemoteCart, RemoteCartError>;

    /// `POST /cart/add`
    async fn add_item(&self, item: NewRemoteItem) -> Result<(), RemoteCartError>;

    /// `PUT /cart/item/{id}`
    async fn update_item(
        &self,
        item: RemoteItemId,
        update: RemoteItemUpdate,
    ) -> Result<(), RemoteCartError>;

    /// `DELETE /cart/item/{id}`
    async fn remove_item(&self, item: RemoteItemId) -> Result<(), RemoteCartError>;

    /// `DELETE /cart/clear`
    async fn clear_cart(&self) -> Result<(), RemoteCartError>;

    /// `POST /cart/merge`
    ///
    /// Asks the server to fold its guest cart for this session into the
    /// shopper's cart and returns the result.
    async fn merge_guest_cart(&self) -> Result<RemoteCart, RemoteCartError>;
}
