//! Persisted cart schema.
//!
//! Snapshots are written as version [`SCHEMA_VERSION`]. Payloads without a
//! `schemaVersion` field are the legacy storefront shape and get upgraded on
//! load; anything newer than this build understands is rejected.
//!
//! Money is written as JSON numbers carrying every digit of the [`Decimal`],
//! so stored totals always match the stored lines exactly.

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    cart::models::{
        BrandId, CartLineItem, CartSnapshot, CartState, IdentityKey, ProductId, totals,
    },
    ids::TypedId,
    persistence::StorageError,
    remote::models::{RemoteCartId, RemoteItemId},
};

/// Schema version written by this build.
pub const SCHEMA_VERSION: u64 = 1;

/// Implicit version of payloads that predate `schemaVersion`.
pub const LEGACY_SCHEMA_VERSION: u64 = 0;

/// Just enough of a payload to pick the schema it was written with.
#[derive(Debug, Deserialize)]
struct SchemaHeader {
    #[serde(default, rename = "schemaVersion")]
    schema_version: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedCart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    schema_version: Option<u64>,

    #[serde(default)]
    items: Vec<PersistedItem>,

    #[serde(default)]
    total_items: u64,

    #[serde(default, with = "rust_decimal::serde::arbitrary_precision")]
    total_amount: Decimal,

    #[serde(default)]
    cart_id: Option<RemoteCartId>,

    #[serde(default)]
    updated_at: Option<Timestamp>,
}

/// Legacy payloads sometimes carry numeric ids, so this is read loosely.
type StoredLineId = TypedId<PersistedItem>;

#[derive(Debug, Serialize, Deserialize)]
struct PersistedItem {
    #[serde(default)]
    id: Option<StoredLineId>,

    product_id: ProductId,

    #[serde(default)]
    title: Option<String>,

    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    price: Decimal,

    quantity: i64,

    #[serde(default)]
    size: Option<String>,

    #[serde(default)]
    color: Option<String>,

    #[serde(default)]
    image_url: Option<String>,

    #[serde(default)]
    stock_quantity: Option<u32>,

    #[serde(default)]
    brand_id: Option<BrandId>,

    #[serde(default)]
    brand_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    remote_item_id: Option<RemoteItemId>,
}

impl From<&CartLineItem> for PersistedItem {
    fn from(item: &CartLineItem) -> Self {
        Self {
            id: Some(StoredLineId::new(item.id.as_str())),
            product_id: item.product_id,
            title: Some(item.title.clone()),
            price: item.unit_price,
            quantity: i64::from(item.quantity),
            size: Some(item.size.clone()),
            color: Some(item.color.clone()),
            image_url: Some(item.image_url.clone()),
            stock_quantity: Some(item.available_stock),
            brand_id: item.brand_id,
            brand_name: Some(item.brand_name.clone()),
            remote_item_id: item.remote_item_id.clone(),
        }
    }
}

impl PersistedItem {
    fn into_line_item(self, quantity: u32, remote_item_id: Option<RemoteItemId>) -> CartLineItem {
        let key = IdentityKey::new(self.product_id, self.size.as_deref(), self.color.as_deref());

        CartLineItem {
            id: key.line_id(),
            product_id: self.product_id,
            title: self.title.unwrap_or_default(),
            unit_price: self.price,
            quantity,
            size: key.size,
            color: key.color,
            image_url: self.image_url.unwrap_or_default(),
            available_stock: self.stock_quantity.unwrap_or_default(),
            brand_id: self.brand_id,
            brand_name: self.brand_name.unwrap_or_default(),
            remote_item_id,
        }
    }
}

/// Serialise `state` as a current-version snapshot.
///
/// # Errors
///
/// Returns [`StorageError::Serialize`] if JSON encoding fails.
pub fn encode(state: &CartState, updated_at: Timestamp) -> Result<String, StorageError> {
    let persisted = PersistedCart {
        schema_version: Some(SCHEMA_VERSION),
        items: state.items().iter().map(PersistedItem::from).collect(),
        total_items: state.total_item_count(),
        total_amount: state.total_amount(),
        cart_id: state.remote_cart_id().cloned(),
        updated_at: Some(updated_at),
    };

    serde_json::to_string(&persisted).map_err(StorageError::Serialize)
}

/// Parse a stored snapshot, upgrading legacy payloads.
///
/// The returned snapshot is marked unsynced when it holds any lines, since
/// nothing guarantees the server still agrees with what was stored.
///
/// # Errors
///
/// Returns an error when the payload is not JSON, does not match either
/// schema, fails validation, or comes from a newer schema version.
pub fn decode(raw: &str) -> Result<CartSnapshot, StorageError> {
    let header: SchemaHeader = serde_json::from_str(raw).map_err(StorageError::Deserialize)?;

    let version = match header.schema_version {
        None => LEGACY_SCHEMA_VERSION,
        Some(version) => version
            .as_u64()
            .ok_or_else(|| StorageError::Invalid("schemaVersion is not an integer".to_string()))?,
    };

    if version > SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion(version));
    }

    let persisted: PersistedCart = serde_json::from_str(raw).map_err(StorageError::Deserialize)?;

    if version == LEGACY_SCHEMA_VERSION {
        Ok(upgrade_legacy(persisted))
    } else {
        validate(persisted)
    }
}

/// Legacy carts stored the server item id in `id` once synced, allowed zero
/// quantities and omitted variants. Repair rather than reject.
fn upgrade_legacy(persisted: PersistedCart) -> CartSnapshot {
    let items = persisted
        .items
        .into_iter()
        .filter_map(|mut item| {
            let quantity = u32::try_from(item.quantity).ok().filter(|q| *q >= 1)?;

            item.price = item.price.max(Decimal::ZERO);

            let key = IdentityKey::new(item.product_id, item.size.as_deref(), item.color.as_deref());
            let derived = key.line_id();
            let unescaped = format!("{}-{}-{}", key.product_id, key.size, key.color);

            let remote_item_id = item.remote_item_id.take().or_else(|| {
                item.id
                    .take()
                    .filter(|id| id.as_str() != derived.as_str() && id.as_str() != unescaped)
                    .map(|id| RemoteItemId::new(id.into_string()))
            });

            Some(item.into_line_item(quantity, remote_item_id))
        })
        .collect::<Vec<_>>();

    let synced = items.is_empty();

    CartSnapshot::from_items(items, persisted.cart_id, synced)
}

fn validate(persisted: PersistedCart) -> Result<CartSnapshot, StorageError> {
    let mut items = Vec::with_capacity(persisted.items.len());

    for mut item in persisted.items {
        let quantity = u32::try_from(item.quantity)
            .ok()
            .filter(|q| *q >= 1)
            .ok_or_else(|| {
                StorageError::Invalid(format!("line quantity {} is below one", item.quantity))
            })?;

        if item.price.is_sign_negative() {
            return Err(StorageError::Invalid(format!(
                "line price {} is negative",
                item.price
            )));
        }

        let remote_item_id = item.remote_item_id.take();
        let line = item.into_line_item(quantity, remote_item_id);

        if items.iter().any(|existing: &CartLineItem| existing.id == line.id) {
            return Err(StorageError::Invalid(format!("duplicate line {}", line.id)));
        }

        items.push(line);
    }

    let (count, amount) = totals(&items);

    if count != persisted.total_items || amount != persisted.total_amount {
        return Err(StorageError::Invalid(
            "stored totals disagree with stored lines".to_string(),
        ));
    }

    let synced = items.is_empty();

    Ok(CartSnapshot::from_items(items, persisted.cart_id, synced))
}
