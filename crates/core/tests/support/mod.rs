//! In-memory stand-in for the storefront cart API.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use duka_cart::remote::{
    NewRemoteItem, RemoteCart, RemoteCartClient, RemoteCartError, RemoteCartItem, RemoteItemId,
    RemoteItemUpdate,
};
use rust_decimal::Decimal;

#[derive(Debug, Default)]
struct ServerState {
    rows: Vec<RemoteCartItem>,
    next_id: u64,
    offline: bool,
    pushes: Vec<NewRemoteItem>,
}

#[derive(Debug, Default)]
pub struct FakeServer {
    state: Mutex<ServerState>,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server already holding `(product_id, size, quantity)` rows.
    pub fn with_rows(rows: &[(u64, &str, i64)]) -> Self {
        let server = Self::new();

        {
            let mut state = server.lock();

            for (product_id, size, quantity) in rows {
                let id = state.allocate_id();
                state.rows.push(row(id, *product_id, size, "Default", *quantity));
            }
        }

        server
    }

    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn rows(&self) -> Vec<RemoteCartItem> {
        self.lock().rows.clone()
    }

    pub fn pushes(&self) -> Vec<NewRemoteItem> {
        self.lock().pushes.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn online(&self) -> Result<std::sync::MutexGuard<'_, ServerState>, RemoteCartError> {
        let state = self.lock();

        if state.offline {
            return Err(RemoteCartError::transport(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        Ok(state)
    }
}

impl ServerState {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

fn row(id: u64, product_id: u64, size: &str, color: &str, quantity: i64) -> RemoteCartItem {
    RemoteCartItem {
        id: RemoteItemId::from(id),
        product_id,
        title: format!("Product {product_id}"),
        price: Decimal::TEN,
        quantity,
        size: Some(size.to_string()),
        color: Some(color.to_string()),
        image_url: None,
        stock_quantity: Some(20),
        brand_id: None,
        brand_name: None,
    }
}

#[async_trait]
impl RemoteCartClient for FakeServer {
    async fn fetch_cart(&self) -> Result<RemoteCart, RemoteCartError> {
        // Lets other tasks run mid-request, like a real round trip would.
        tokio::task::yield_now().await;

        let state = self.online()?;

        Ok(RemoteCart {
            id: Some("server-cart".into()),
            items: state.rows.clone(),
            total_items: 0,
            total_amount: Decimal::ZERO,
        })
    }

    async fn add_item(&self, item: NewRemoteItem) -> Result<(), RemoteCartError> {
        let mut state = self.online()?;

        state.pushes.push(item.clone());

        let existing = state.rows.iter_mut().find(|row| {
            row.product_id == item.product_id
                && row.size.as_deref() == Some(item.size.as_str())
                && row.color.as_deref() == Some(item.color.as_str())
        });

        if let Some(existing) = existing {
            existing.quantity += i64::from(item.quantity);
        } else {
            let id = state.allocate_id();
            state.rows.push(row(
                id,
                item.product_id,
                &item.size,
                &item.color,
                i64::from(item.quantity),
            ));
        }

        Ok(())
    }

    async fn update_item(
        &self,
        item: RemoteItemId,
        update: RemoteItemUpdate,
    ) -> Result<(), RemoteCartError> {
        let mut state = self.online()?;

        let row = state
            .rows
            .iter_mut()
            .find(|row| row.id == item)
            .ok_or_else(|| RemoteCartError::status(404, "cart item not found"))?;

        row.quantity = i64::from(update.quantity);

        Ok(())
    }

    async fn remove_item(&self, item: RemoteItemId) -> Result<(), RemoteCartError> {
        let mut state = self.online()?;

        state.rows.retain(|row| row.id != item);

        Ok(())
    }

    async fn clear_cart(&self) -> Result<(), RemoteCartError> {
        self.online()?.rows.clear();

        Ok(())
    }

    async fn merge_guest_cart(&self) -> Result<RemoteCart, RemoteCartError> {
        self.fetch_cart().await
    }
}
