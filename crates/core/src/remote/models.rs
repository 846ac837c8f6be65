//! Remote Cart Models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    cart::models::{
        BrandId, CartLineItem, CartSnapshot, IdentityKey, LineId, ProductId, normalize_variant,
    },
    ids::TypedId,
};

/// Server-side cart id.
pub type RemoteCartId = TypedId<RemoteCart>;

/// Server-side cart item id.
pub type RemoteItemId = TypedId<RemoteCartItem>;

/// The server-held cart, as returned by `GET /cart`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteCart {
    /// Server cart id, absent for a cart that was never written.
    #[serde(default)]
    pub id: Option<RemoteCartId>,

    /// Rows in server order.
    #[serde(default)]
    pub items: Vec<RemoteCartItem>,

    /// Item count as reported by the server.
    #[serde(default)]
    pub total_items: u64,

    /// Amount as reported by the server.
    #[serde(default)]
    pub total_amount: Decimal,
}

impl RemoteCart {
    /// Whether the server holds no rows.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether the remote cart holds any variant of `product_id`.
    pub fn has_product(&self, product_id: ProductId) -> bool {
        self.items.iter().any(|item| item.product_id == product_id)
    }

    /// Whether the remote cart holds exactly this identity key.
    pub fn has_key(&self, key: &IdentityKey) -> bool {
        self.items.iter().any(|item| &item.key() == key)
    }

    /// Convert into local line items.
    ///
    /// Rows with a quantity below one are dropped. Rows sharing an identity
    /// key are folded into one line, keeping the first row's server id.
    pub fn into_snapshot(self, synced: bool) -> CartSnapshot {
        let mut items: Vec<CartLineItem> = Vec::with_capacity(self.items.len());

        for remote in self.items {
            let Some(line) = remote.into_line_item() else {
                continue;
            };

            match items.iter_mut().find(|item| item.id == line.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity);
                }
                None => items.push(line),
            }
        }

        CartSnapshot {
            total_item_count: self.total_items,
            total_amount: self.total_amount,
            ..CartSnapshot::from_items(items, self.id, synced)
        }
    }
}

/// One row of the server-held cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCartItem {
    /// Server item id, used in `/cart/item/{id}` paths.
    pub id: RemoteItemId,

    /// Product the row is for.
    pub product_id: ProductId,

    /// Product title.
    #[serde(default, alias = "product_title", alias = "name")]
    pub title: String,

    /// Unit price. Numbers and numeric strings are accepted.
    #[serde(default, alias = "unit_price")]
    pub price: Decimal,

    /// Rows below one are dropped on conversion.
    pub quantity: i64,

    /// Size, `None` meaning the default variant.
    #[serde(default)]
    pub size: Option<String>,

    /// Color, `None` meaning the default variant.
    #[serde(default)]
    pub color: Option<String>,

    /// Product image.
    #[serde(default)]
    pub image_url: Option<String>,

    /// Stock the server reports.
    #[serde(default)]
    pub stock_quantity: Option<u32>,

    /// Brand id, if known.
    #[serde(default)]
    pub brand_id: Option<BrandId>,

    /// Brand display name.
    #[serde(default)]
    pub brand_name: Option<String>,
}

impl RemoteCartItem {
    /// Identity key of the row, with missing variants normalised.
    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(self.product_id, self.size.as_deref(), self.color.as_deref())
    }

    /// Convert into a local line, or `None` for rows with no quantity.
    pub fn into_line_item(self) -> Option<CartLineItem> {
        let quantity = u32::try_from(self.quantity).ok().filter(|q| *q >= 1)?;

        let key = self.key();
        let id: LineId = key.line_id();

        Some(CartLineItem {
            id,
            product_id: self.product_id,
            title: self.title,
            unit_price: self.price.max(Decimal::ZERO),
            quantity,
            size: key.size,
            color: key.color,
            image_url: self.image_url.unwrap_or_default(),
            available_stock: self.stock_quantity.unwrap_or_default(),
            brand_id: self.brand_id,
            brand_name: self.brand_name.unwrap_or_default(),
            remote_item_id: Some(self.id),
        })
    }
}

/// Body of `POST /cart/add`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRemoteItem {
    /// Product to add.
    pub product_id: ProductId,

    /// Units to add on top of what the server holds.
    pub quantity: u32,

    /// Normalised size.
    pub size: String,

    /// Normalised color.
    pub color: String,
}

impl NewRemoteItem {
    /// Request pushing `quantity` units of `line` to the server.
    pub fn for_line(line: &CartLineItem, quantity: u32) -> Self {
        Self {
            product_id: line.product_id,
            quantity,
            size: normalize_variant(Some(&line.size)),
            color: normalize_variant(Some(&line.color)),
        }
    }
}

/// Body of `PUT /cart/item/{id}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItemUpdate {
    /// New absolute quantity.
    pub quantity: u32,
}
