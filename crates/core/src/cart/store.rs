//! Cart Store
//!
//! A pure reducer over [`CartAction`]s plus a small owner type that holds the
//! current [`CartState`]. Every action takes the current state and yields a
//! new one; the input is never touched.

use rust_decimal::Decimal;
use tracing::warn;

use crate::cart::models::{
    CartLineItem, CartSnapshot, CartState, IdentityKey, LineId, Product, SyncStatus, totals,
};

/// Cart Action
#[derive(Debug, Clone, PartialEq)]
pub enum CartAction {
    /// Add `quantity` of `product` in the given variant. Quantities below one
    /// are treated as one.
    AddItem {
        /// Product details captured for a new line.
        product: Product,
        /// Units to add.
        quantity: i64,
        /// Size, `None` for the default variant.
        size: Option<String>,
        /// Color, `None` for the default variant.
        color: Option<String>,
    },

    /// Remove a line. Unknown lines are ignored.
    RemoveItem(LineId),

    /// Set a line's quantity; anything below one removes the line.
    UpdateQuantity {
        /// Line to change.
        line: LineId,
        /// New absolute quantity.
        quantity: i64,
    },

    /// Reset to the empty aggregate.
    ClearCart,

    /// Install authoritative contents from the server or local storage.
    ReplaceWithSnapshot(CartSnapshot),

    /// A sync attempt has started.
    BeginSync,

    /// A sync attempt failed with the given message.
    SyncFailed(String),

    /// The authenticated identity went away; forget server-side ids.
    DetachRemote,
}

/// Apply `action` to `state`, returning the next state.
pub fn reduce(state: &CartState, action: CartAction) -> CartState {
    let mut next = state.clone();

    match action {
        CartAction::AddItem {
            product,
            quantity,
            size,
            color,
        } => add_item(&mut next, product, quantity, size.as_deref(), color.as_deref()),
        CartAction::RemoveItem(line) => remove_item(&mut next, &line),
        CartAction::UpdateQuantity { line, quantity } => {
            update_quantity(&mut next, &line, quantity);
        }
        CartAction::ClearCart => clear(&mut next),
        CartAction::ReplaceWithSnapshot(snapshot) => replace(&mut next, snapshot),
        CartAction::BeginSync => next.sync_status = SyncStatus::Syncing,
        CartAction::SyncFailed(message) => {
            next.sync_status = SyncStatus::SyncFailed;
            next.last_error = Some(message);
        }
        CartAction::DetachRemote => detach(&mut next),
    }

    next
}

fn normalize_quantity(quantity: i64) -> u32 {
    u32::try_from(quantity.max(1)).unwrap_or(u32::MAX)
}

fn mark_dirty(state: &mut CartState) {
    state.sync_status = SyncStatus::Dirty;
    state.version += 1;
}

fn add_item(
    state: &mut CartState,
    product: Product,
    quantity: i64,
    size: Option<&str>,
    color: Option<&str>,
) {
    let quantity = normalize_quantity(quantity);
    let key = IdentityKey::new(product.id, size, color);
    let line = key.line_id();

    let position = state.items.iter().position(|item| item.id == line);

    let (previous, unit_price) = match position.and_then(|index| state.items.get(index)) {
        Some(item) => (item.quantity, item.unit_price),
        None => (0, product.price),
    };

    let next_quantity = previous.saturating_add(quantity);
    let added = next_quantity - previous;

    let Some(total_amount) = unit_price
        .checked_mul(Decimal::from(next_quantity))
        .and_then(|_| unit_price.checked_mul(Decimal::from(added)))
        .and_then(|amount| state.total_amount.checked_add(amount))
    else {
        warn!(
            product_id = product.id,
            %unit_price,
            quantity = next_quantity,
            "cart amount would overflow, ignoring addition"
        );
        return;
    };

    match position.and_then(|index| state.items.get_mut(index)) {
        Some(item) => item.quantity = next_quantity,
        None => state.items.push(CartLineItem::new(product, &key, quantity)),
    }

    state.total_item_count = state.total_item_count.saturating_add(u64::from(added));
    state.total_amount = total_amount;

    mark_dirty(state);
}

fn remove_item(state: &mut CartState, line: &LineId) {
    let Some(position) = state.items.iter().position(|item| &item.id == line) else {
        return;
    };

    let removed = state.items.remove(position);

    state.total_item_count -= u64::from(removed.quantity);
    state.total_amount -= removed.line_total();

    mark_dirty(state);
}

fn update_quantity(state: &mut CartState, line: &LineId, quantity: i64) {
    if quantity < 1 {
        remove_item(state, line);
        return;
    }

    let quantity = normalize_quantity(quantity);

    let Some(item) = state.items.iter_mut().find(|item| &item.id == line) else {
        return;
    };

    if item.quantity == quantity {
        return;
    }

    let previous_total = item.line_total();

    let Some(total_amount) = item
        .unit_price
        .checked_mul(Decimal::from(quantity))
        .and_then(|next_total| (state.total_amount - previous_total).checked_add(next_total))
    else {
        warn!(
            line = %line,
            unit_price = %item.unit_price,
            quantity,
            "cart amount would overflow, ignoring quantity change"
        );
        return;
    };

    let previous = item.quantity;
    item.quantity = quantity;

    state.total_item_count = state.total_item_count - u64::from(previous) + u64::from(quantity);
    state.total_amount = total_amount;

    mark_dirty(state);
}

fn clear(state: &mut CartState) {
    if state.items.is_empty() {
        return;
    }

    state.items.clear();
    state.total_item_count = 0;
    state.total_amount = Decimal::ZERO;

    mark_dirty(state);
}

fn replace(state: &mut CartState, snapshot: CartSnapshot) {
    let (count, amount) = totals(&snapshot.items);

    if count != snapshot.total_item_count || amount != snapshot.total_amount {
        warn!(
            reported_items = snapshot.total_item_count,
            reported_amount = %snapshot.total_amount,
            derived_items = count,
            derived_amount = %amount,
            "snapshot totals disagree with its items; using derived totals"
        );
    }

    state.items = snapshot.items;
    state.total_item_count = count;
    state.total_amount = amount;
    state.remote_cart_id = snapshot.remote_cart_id;

    if snapshot.synced {
        state.sync_status = SyncStatus::Synced;
        state.last_error = None;
    } else {
        state.sync_status = SyncStatus::Dirty;
    }
}

fn detach(state: &mut CartState) {
    state.remote_cart_id = None;

    for item in &mut state.items {
        item.remote_item_id = None;
    }

    if state.items.is_empty() {
        state.sync_status = SyncStatus::Synced;
        state.version += 1;
    } else {
        mark_dirty(state);
    }
}

/// Cart Store
///
/// Owns the single [`CartState`] of a session.
#[derive(Debug, Default)]
pub struct CartStore {
    state: CartState,
}

impl CartStore {
    /// Start from an existing state, e.g. one loaded from storage.
    #[must_use]
    pub fn new(state: CartState) -> Self {
        Self { state }
    }

    /// The current state.
    pub fn state(&self) -> &CartState {
        &self.state
    }

    /// Apply an action. Returns whether the state changed.
    pub fn dispatch(&mut self, action: CartAction) -> bool {
        let next = reduce(&self.state, action);
        let changed = next != self.state;

        self.state = next;

        changed
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use crate::remote::models::RemoteItemId;

    use super::*;

    fn product(id: u64, price: Decimal) -> Product {
        Product {
            id,
            title: format!("Product {id}"),
            price,
            image_url: format!("https://cdn.example.com/{id}.jpg"),
            stock_quantity: 10,
            brand_id: Some(3),
            brand_name: "Nyota".to_string(),
        }
    }

    fn add(id: u64, price: Decimal, quantity: i64, size: &str, color: &str) -> CartAction {
        CartAction::AddItem {
            product: product(id, price),
            quantity,
            size: Some(size.to_string()),
            color: Some(color.to_string()),
        }
    }

    fn assert_totals_consistent(state: &CartState) {
        let (count, amount) = totals(state.items());

        assert_eq!(state.total_item_count(), count, "item count drifted");
        assert_eq!(state.total_amount(), amount, "amount drifted");
    }

    #[test]
    fn adding_same_variant_twice_merges_quantities() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(10), 2, "M", "Red"));
        store.dispatch(add(7, dec!(10), 1, "M", "Red"));

        let state = store.state();

        assert_eq!(state.items().len(), 1);
        assert_eq!(state.items()[0].quantity, 3);
        assert_eq!(state.total_amount(), dec!(30));
        assert_totals_consistent(state);
    }

    #[test]
    fn different_sizes_are_distinct_lines() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(10), 1, "M", "Red"));
        store.dispatch(add(7, dec!(10), 1, "L", "Red"));

        assert_eq!(store.state().items().len(), 2);
        assert_eq!(store.state().total_item_count(), 2);
    }

    #[test]
    fn dashed_variants_stay_separate_lines() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(10), 1, "X-L", "Red"));
        store.dispatch(add(7, dec!(10), 1, "X", "L-Red"));

        let state = store.state();
        let variants: Vec<(&str, &str)> = state
            .items()
            .iter()
            .map(|item| (item.size.as_str(), item.color.as_str()))
            .collect();

        assert_eq!(variants, vec![("X-L", "Red"), ("X", "L-Red")]);
        assert!(state.contains(&IdentityKey::new(7, Some("X"), Some("L-Red"))));
        assert!(!state.contains(&IdentityKey::new(7, Some("X"), Some("L"))));
        assert_totals_consistent(state);
    }

    #[test]
    fn overflowing_amounts_leave_state_untouched() {
        let mut store = CartStore::default();

        store.dispatch(add(1, dec!(100000000000000000000), 1, "M", "Red"));

        let before = store.state().clone();

        let changed = store.dispatch(add(1, dec!(100000000000000000000), i64::MAX, "M", "Red"));

        assert!(!changed, "overflowing add changed the cart");
        assert_eq!(store.state(), &before);

        let changed = store.dispatch(CartAction::UpdateQuantity {
            line: LineId::from("1-M-Red"),
            quantity: i64::MAX,
        });

        assert!(!changed, "overflowing update changed the cart");
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn lines_keep_insertion_order() {
        let mut store = CartStore::default();

        store.dispatch(add(3, dec!(1), 1, "S", "Blue"));
        store.dispatch(add(1, dec!(1), 1, "S", "Blue"));
        store.dispatch(add(2, dec!(1), 1, "S", "Blue"));

        let ids: Vec<u64> = store.state().items().iter().map(|i| i.product_id).collect();

        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn non_positive_add_quantity_is_treated_as_one() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(4.25), 0, "M", "Red"));
        store.dispatch(add(8, dec!(1), -5, "M", "Red"));

        assert_eq!(store.state().items()[0].quantity, 1);
        assert_eq!(store.state().items()[1].quantity, 1);
        assert_eq!(store.state().total_amount(), dec!(5.25));
    }

    #[test]
    fn update_to_zero_removes_line() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(10), 2, "M", "Red"));
        store.dispatch(add(9, dec!(5), 1, "M", "Red"));
        store.dispatch(CartAction::UpdateQuantity {
            line: LineId::from("7-M-Red"),
            quantity: 0,
        });

        let state = store.state();

        assert_eq!(state.items().len(), 1);
        assert_eq!(state.total_item_count(), 1);
        assert_eq!(state.total_amount(), dec!(5));
    }

    #[test]
    fn update_adjusts_totals_by_delta() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(2.50), 4, "M", "Red"));
        store.dispatch(CartAction::UpdateQuantity {
            line: LineId::from("7-M-Red"),
            quantity: 1,
        });

        assert_eq!(store.state().total_item_count(), 1);
        assert_eq!(store.state().total_amount(), dec!(2.50));
        assert_totals_consistent(store.state());
    }

    #[test]
    fn quantity_never_drops_below_one_across_updates() {
        let mut store = CartStore::default();

        store.dispatch(add(1, dec!(3), 2, "M", "Red"));
        store.dispatch(add(2, dec!(7), 1, "M", "Red"));

        for quantity in [5, -1, 3, 0, 2, 1, -10, 4] {
            for line in ["1-M-Red", "2-M-Red"] {
                store.dispatch(CartAction::UpdateQuantity {
                    line: LineId::from(line),
                    quantity,
                });

                assert!(
                    store.state().items().iter().all(|item| item.quantity >= 1),
                    "a line dropped below one"
                );
                assert_totals_consistent(store.state());
            }
        }
    }

    #[test]
    fn removing_unknown_line_is_a_no_op() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(10), 1, "M", "Red"));

        let before = store.state().clone();
        let changed = store.dispatch(CartAction::RemoveItem(LineId::from("99-M-Red")));

        assert!(!changed);
        assert_eq!(store.state(), &before);
    }

    #[test]
    fn clearing_empty_cart_is_idempotent() {
        let mut store = CartStore::default();

        let changed = store.dispatch(CartAction::ClearCart);

        assert!(!changed);
        assert_eq!(store.state(), &CartState::default());
    }

    #[test]
    fn mutations_mark_dirty_and_bump_version() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(10), 1, "M", "Red"));

        assert_eq!(store.state().sync_status(), SyncStatus::Dirty);
        assert_eq!(store.state().version(), 1);

        store.dispatch(CartAction::ClearCart);

        assert_eq!(store.state().version(), 2);
        assert!(store.state().is_empty());
    }

    #[test]
    fn sync_status_transitions() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(10), 1, "M", "Red"));
        store.dispatch(CartAction::BeginSync);

        assert_eq!(store.state().sync_status(), SyncStatus::Syncing);

        store.dispatch(CartAction::SyncFailed("offline".to_string()));

        assert_eq!(store.state().sync_status(), SyncStatus::SyncFailed);
        assert_eq!(store.state().last_error(), Some("offline"));

        // A failed sync does not block further local edits.
        store.dispatch(add(7, dec!(10), 1, "M", "Red"));

        assert_eq!(store.state().sync_status(), SyncStatus::Dirty);
        assert_eq!(store.state().items()[0].quantity, 2);
    }

    #[test]
    fn replace_with_snapshot_recomputes_totals() {
        let mut store = CartStore::default();
        let key = IdentityKey::new(5, Some("XL"), None);
        let item = CartLineItem::new(product(5, dec!(8)), &key, 2);

        store.dispatch(CartAction::ReplaceWithSnapshot(CartSnapshot {
            items: vec![item],
            total_item_count: 99,
            total_amount: dec!(1),
            remote_cart_id: Some("c-1".into()),
            synced: true,
        }));

        let state = store.state();

        assert_eq!(state.total_item_count(), 2);
        assert_eq!(state.total_amount(), dec!(16));
        assert_eq!(state.sync_status(), SyncStatus::Synced);
        assert_eq!(state.remote_cart_id().map(|id| id.as_str()), Some("c-1"));
    }

    #[test]
    fn replace_does_not_bump_version() {
        let mut store = CartStore::default();

        store.dispatch(add(7, dec!(10), 1, "M", "Red"));
        store.dispatch(CartAction::ReplaceWithSnapshot(CartSnapshot::default()));

        assert_eq!(store.state().version(), 1);
    }

    #[test]
    fn detach_forgets_remote_ids_and_keeps_lines() {
        let mut store = CartStore::default();
        let key = IdentityKey::new(5, None, None);
        let mut item = CartLineItem::new(product(5, dec!(8)), &key, 1);
        item.remote_item_id = Some(RemoteItemId::from(31));

        store.dispatch(CartAction::ReplaceWithSnapshot(CartSnapshot::from_items(
            vec![item],
            Some("c-1".into()),
            true,
        )));
        store.dispatch(CartAction::DetachRemote);

        let state = store.state();

        assert_eq!(state.items().len(), 1);
        assert!(state.remote_cart_id().is_none());
        assert!(state.items()[0].remote_item_id.is_none());
        assert_eq!(state.sync_status(), SyncStatus::Dirty);
    }

    #[test]
    fn reduce_leaves_input_untouched() {
        let state = CartState::default();

        let next = reduce(&state, add(1, dec!(2), 1, "M", "Red"));

        assert!(state.is_empty());
        assert_eq!(next.items().len(), 1);
    }
}
