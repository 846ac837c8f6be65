//! Cart Models

use std::fmt::{Display, Formatter, Result as FmtResult};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::remote::models::{RemoteCartId, RemoteItemId};

/// Size or color recorded when the shopper did not pick one.
pub const DEFAULT_VARIANT: &str = "Default";

/// Storefront product identifier.
pub type ProductId = u64;

/// Storefront brand identifier.
pub type BrandId = u64;

/// Normalise an optional size or color, falling back to [`DEFAULT_VARIANT`].
pub fn normalize_variant(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|variant| !variant.is_empty())
        .unwrap_or(DEFAULT_VARIANT)
        .to_string()
}

/// Line Id
///
/// Derived from the identity key as `"{product_id}-{size}-{color}"`. A `-`
/// inside a size or color is written as `%2D` (and `%` as `%25`), so two
/// different keys never share an id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(String);

impl LineId {
    /// Borrow the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LineId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<&str> for LineId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The `(product_id, size, color)` tuple that decides whether two additions
/// share a line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    /// Product the line is for.
    pub product_id: ProductId,

    /// Normalised size, [`DEFAULT_VARIANT`] when none was picked.
    pub size: String,

    /// Normalised color, [`DEFAULT_VARIANT`] when none was picked.
    pub color: String,
}

impl IdentityKey {
    /// Build a key, normalising missing variants.
    pub fn new(product_id: ProductId, size: Option<&str>, color: Option<&str>) -> Self {
        Self {
            product_id,
            size: normalize_variant(size),
            color: normalize_variant(color),
        }
    }

    /// The line id this key maps to.
    pub fn line_id(&self) -> LineId {
        LineId(format!(
            "{}-{}-{}",
            self.product_id,
            escape_variant(&self.size),
            escape_variant(&self.color)
        ))
    }
}

fn escape_variant(variant: &str) -> String {
    variant.replace('%', "%25").replace('-', "%2D")
}

/// Product details captured when a shopper adds to the cart.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Storefront product id.
    pub id: ProductId,

    /// Display title.
    pub title: String,

    /// Unit price. Must not be negative.
    pub price: Decimal,

    /// Product image shown next to the line.
    pub image_url: String,

    /// Stock the storefront reported when the product was shown.
    pub stock_quantity: u32,

    /// Brand the product is sold under, if known.
    pub brand_id: Option<BrandId>,

    /// Brand display name.
    pub brand_name: String,
}

/// Cart Line Item
#[derive(Debug, Clone, PartialEq)]
pub struct CartLineItem {
    /// Derived from the identity key, see [`IdentityKey::line_id`].
    pub id: LineId,

    /// Product the line is for.
    pub product_id: ProductId,

    /// Title captured when the line was created.
    pub title: String,

    /// Unit price captured when the line was created.
    pub unit_price: Decimal,

    /// Always at least one.
    pub quantity: u32,

    /// Normalised size.
    pub size: String,

    /// Normalised color.
    pub color: String,

    /// Product image.
    pub image_url: String,

    /// Advisory only, used by the UI to clamp quantity pickers.
    pub available_stock: u32,

    /// Brand the product is sold under, if known.
    pub brand_id: Option<BrandId>,

    /// Brand display name.
    pub brand_name: String,

    /// Server-side item id, known once the line came back from the remote cart.
    pub remote_item_id: Option<RemoteItemId>,
}

impl CartLineItem {
    /// Create a new line for `product` under the given identity key.
    pub fn new(product: Product, key: &IdentityKey, quantity: u32) -> Self {
        Self {
            id: key.line_id(),
            product_id: product.id,
            title: product.title,
            unit_price: product.price,
            quantity,
            size: key.size.clone(),
            color: key.color.clone(),
            image_url: product.image_url,
            available_stock: product.stock_quantity,
            brand_id: product.brand_id,
            brand_name: product.brand_name,
            remote_item_id: None,
        }
    }

    /// The identity key the line was created under.
    pub fn key(&self) -> IdentityKey {
        IdentityKey {
            product_id: self.product_id,
            size: self.size.clone(),
            color: self.color.clone(),
        }
    }

    /// `unit_price * quantity`, or `None` if that does not fit a [`Decimal`].
    pub fn checked_line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }

    /// `unit_price * quantity`, saturating at [`Decimal::MAX`].
    pub fn line_total(&self) -> Decimal {
        self.unit_price.saturating_mul(Decimal::from(self.quantity))
    }
}

/// Reconciliation state of the local cart relative to the server cart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Matches the last server snapshot, or there is nothing to sync.
    #[default]
    Synced,

    /// Local changes the server has not seen yet.
    Dirty,

    /// A reconciliation pass is in flight.
    Syncing,

    /// The last pass failed; see [`CartState::last_error`].
    SyncFailed,
}

impl Display for SyncStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Synced => "synced",
            Self::Dirty => "dirty",
            Self::Syncing => "syncing",
            Self::SyncFailed => "sync_failed",
        })
    }
}

/// Cart State
///
/// The aggregate root. Only [`crate::cart::store`] mutates it; everything
/// else reads it through the accessors below.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    pub(super) items: Vec<CartLineItem>,
    pub(super) total_item_count: u64,
    pub(super) total_amount: Decimal,
    pub(super) remote_cart_id: Option<RemoteCartId>,
    pub(super) sync_status: SyncStatus,
    pub(super) last_error: Option<String>,
    pub(super) version: u64,
}

impl CartState {
    /// Line items in insertion order.
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    /// Look up a line by id.
    pub fn item(&self, line: &LineId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| &item.id == line)
    }

    /// Sum of quantities over all lines.
    pub fn total_item_count(&self) -> u64 {
        self.total_item_count
    }

    /// Sum of `unit_price * quantity` over all lines.
    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    /// Server-side cart id, once a pass has seen the remote cart.
    pub fn remote_cart_id(&self) -> Option<&RemoteCartId> {
        self.remote_cart_id.as_ref()
    }

    /// Where the cart stands relative to the server.
    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status
    }

    /// Message of the last failed sync, cleared by a successful one.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Monotonic counter bumped by every local mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether a line with the given identity key exists.
    pub fn contains(&self, key: &IdentityKey) -> bool {
        let line = key.line_id();

        self.items.iter().any(|item| item.id == line)
    }
}

/// Authoritative cart contents installed by `ReplaceWithSnapshot`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartSnapshot {
    /// Lines in display order.
    pub items: Vec<CartLineItem>,

    /// Reported item count. Recomputed on install.
    pub total_item_count: u64,

    /// Reported amount. Recomputed on install.
    pub total_amount: Decimal,

    /// Server-side cart id, if any.
    pub remote_cart_id: Option<RemoteCartId>,

    /// Whether installing this leaves the cart `synced` rather than `dirty`.
    pub synced: bool,
}

impl CartSnapshot {
    /// Build a snapshot whose totals are derived from `items`.
    pub fn from_items(
        items: Vec<CartLineItem>,
        remote_cart_id: Option<RemoteCartId>,
        synced: bool,
    ) -> Self {
        let (total_item_count, total_amount) = totals(&items);

        Self {
            items,
            total_item_count,
            total_amount,
            remote_cart_id,
            synced,
        }
    }
}

/// Recompute `(total_item_count, total_amount)` from scratch.
///
/// The amount saturates at [`Decimal::MAX`] rather than overflowing.
pub fn totals(items: &[CartLineItem]) -> (u64, Decimal) {
    items.iter().fold((0, Decimal::ZERO), |(count, amount), item| {
        (
            count.saturating_add(u64::from(item.quantity)),
            amount.saturating_add(item.line_total()),
        )
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn missing_variants_normalise_to_default() {
        let key = IdentityKey::new(7, None, Some("  "));

        assert_eq!(key.size, DEFAULT_VARIANT);
        assert_eq!(key.color, DEFAULT_VARIANT);
        assert_eq!(key.line_id().as_str(), "7-Default-Default");
    }

    #[test]
    fn line_id_includes_size_and_color() {
        let key = IdentityKey::new(7, Some("M"), Some("Red"));

        assert_eq!(key.line_id(), LineId::from("7-M-Red"));
    }

    #[test]
    fn dashes_inside_variants_cannot_collide() {
        let wide = IdentityKey::new(7, Some("X-L"), Some("Red"));
        let narrow = IdentityKey::new(7, Some("X"), Some("L-Red"));

        assert_ne!(wide.line_id(), narrow.line_id());
        assert_eq!(wide.line_id().as_str(), "7-X%2DL-Red");
        assert_eq!(narrow.line_id().as_str(), "7-X-L%2DRed");
    }

    #[test]
    fn percent_signs_are_escaped_too() {
        let literal = IdentityKey::new(7, Some("X%2DL"), None);
        let dashed = IdentityKey::new(7, Some("X-L"), None);

        assert_ne!(literal.line_id(), dashed.line_id());
    }

    #[test]
    fn totals_sum_quantities_and_amounts() {
        let key = IdentityKey::new(1, None, None);
        let product = Product {
            id: 1,
            title: "Kikoi".to_string(),
            price: dec!(12.50),
            image_url: String::new(),
            stock_quantity: 4,
            brand_id: None,
            brand_name: String::new(),
        };

        let items = vec![CartLineItem::new(product, &key, 3)];

        assert_eq!(totals(&items), (3, dec!(37.50)));
    }

    #[test]
    fn oversized_line_totals_do_not_panic() {
        let key = IdentityKey::new(1, None, None);
        let product = Product {
            id: 1,
            title: "Gold".to_string(),
            price: dec!(100000000000000000000),
            image_url: String::new(),
            stock_quantity: 1,
            brand_id: None,
            brand_name: String::new(),
        };

        let item = CartLineItem::new(product, &key, u32::MAX);

        assert_eq!(item.checked_line_total(), None);
        assert_eq!(item.line_total(), Decimal::MAX);
        assert_eq!(totals(&[item.clone(), item]).1, Decimal::MAX);
    }

    #[test]
    fn sync_status_displays_snake_case() {
        assert_eq!(SyncStatus::SyncFailed.to_string(), "sync_failed");
    }
}
