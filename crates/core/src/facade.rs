//! Cart Facade
//!
//! The only component UI code talks to. Every mutation is applied to the
//! local [`CartStore`] and persisted straight away. When a shopper is signed
//! in, the matching remote operation and a reconciliation pass are queued
//! for the [`SyncWorker`]; the returned [`PendingSync`] reports how the
//! remote half went.
//!
//! Outcomes of reconciliation passes come back as [`SyncEvent`]s which the
//! owner drains with [`Cart::apply_sync_events`] or [`Cart::next_sync_event`].
//! An event computed from an older cart version than the current one is
//! dropped.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    cart::{
        CartAction, CartSnapshot, CartState, CartStore, IdentityKey, LineId, Product, ProductId,
    },
    errors::CartError,
    identity::Identity,
    persistence::LocalPersistence,
    reconcile::{ReconcileOutcome, ReconciliationPolicy},
    remote::{NewRemoteItem, RemoteCartClient, RemoteErrorClass, RemoteItemId, RemoteItemUpdate},
    sync::{PendingSync, ReconcileReason, RemoteOp, SyncEvent, SyncJob, SyncWorker},
};

/// Cart Facade
pub struct Cart {
    store: CartStore,
    persistence: LocalPersistence,
    identity: Arc<dyn Identity>,
    policy: ReconciliationPolicy,
    jobs: Option<mpsc::UnboundedSender<SyncJob>>,
    events: mpsc::UnboundedReceiver<SyncEvent>,
    worker: Option<JoinHandle<()>>,
    was_authenticated: bool,
}

impl std::fmt::Debug for Cart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cart")
            .field("state", self.store.state())
            .field("persistence", &self.persistence)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Cart {
    /// Load the persisted cart and spawn its sync worker.
    ///
    /// Must be called from within a tokio runtime. If a shopper is already
    /// signed in, a merge-on-login pass is queued straight away.
    pub fn start(
        persistence: LocalPersistence,
        identity: Arc<dyn Identity>,
        remote: Arc<dyn RemoteCartClient>,
        policy: ReconciliationPolicy,
    ) -> Self {
        let state = persistence.load();

        let (jobs, job_rx) = mpsc::unbounded_channel();
        let (event_tx, events) = mpsc::unbounded_channel();

        let worker = SyncWorker::new(job_rx, event_tx, remote, identity.clone(), policy);
        let worker = tokio::spawn(worker.run());

        let was_authenticated = identity.is_authenticated();

        info!(
            items = state.items().len(),
            version = state.version(),
            authenticated = was_authenticated,
            "cart loaded"
        );

        let mut cart = Self {
            store: CartStore::new(state),
            persistence,
            identity,
            policy,
            jobs: Some(jobs),
            events,
            worker: Some(worker),
            was_authenticated,
        };

        if was_authenticated {
            cart.request_reconcile(ReconcileReason::Login);
        }

        cart
    }

    /// The current cart.
    pub fn state(&self) -> &CartState {
        self.store.state()
    }

    /// Add `quantity` of `product` in the given variant.
    ///
    /// Quantities below one are treated as one. The local cart is updated
    /// whatever happens on the network.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NegativePrice`] for a negative price and
    /// [`CartError::AmountOverflow`] when the line or cart total would not
    /// fit a [`Decimal`]. Nothing is changed in either case.
    pub fn add_to_cart(
        &mut self,
        product: Product,
        quantity: i64,
        size: Option<&str>,
        color: Option<&str>,
    ) -> Result<PendingSync, CartError> {
        if product.price.is_sign_negative() {
            return Err(CartError::NegativePrice {
                product_id: product.id,
                price: product.price,
            });
        }

        let line = IdentityKey::new(product.id, size, color).line_id();
        let before = self.line_quantity(&line);
        let (product_id, price) = (product.id, product.price);

        if !self.dispatch(CartAction::AddItem {
            product,
            quantity,
            size: size.map(str::to_string),
            color: color.map(str::to_string),
        }) {
            return Err(CartError::AmountOverflow {
                product_id,
                price,
                quantity,
            });
        }

        let Some(item) = self.store.state().item(&line) else {
            return Ok(PendingSync::local_only());
        };

        let added = item.quantity.saturating_sub(before);

        if added == 0 {
            return Ok(PendingSync::local_only());
        }

        let op = RemoteOp::Add(NewRemoteItem::for_line(item, added));

        Ok(self.sync_mutation(op))
    }

    /// Remove a line. Unknown lines are ignored.
    ///
    /// A line whose server id has not come back yet is removed on the server
    /// by identity key.
    pub fn remove_from_cart(&mut self, line: &LineId) -> PendingSync {
        let Some(target) = self.remote_target(line) else {
            return PendingSync::local_only();
        };

        if !self.dispatch(CartAction::RemoveItem(line.clone())) {
            return PendingSync::local_only();
        }

        self.sync_mutation(target.remove())
    }

    /// Set a line's quantity. Anything below one removes the line.
    ///
    /// A change that would overflow the cart total is ignored.
    pub fn update_quantity(&mut self, line: &LineId, quantity: i64) -> PendingSync {
        let Some(target) = self.remote_target(line) else {
            return PendingSync::local_only();
        };

        if !self.dispatch(CartAction::UpdateQuantity {
            line: line.clone(),
            quantity,
        }) {
            return PendingSync::local_only();
        }

        let op = match self.store.state().item(line) {
            Some(updated) => target.update(RemoteItemUpdate {
                quantity: updated.quantity,
            }),
            None => target.remove(),
        };

        self.sync_mutation(op)
    }

    /// Empty the cart.
    pub fn clear_cart(&mut self) -> PendingSync {
        if !self.dispatch(CartAction::ClearCart) {
            return PendingSync::local_only();
        }

        self.sync_mutation(RemoteOp::Clear)
    }

    /// Reconcile with the server now and wait for the result.
    ///
    /// The pass goes through the sync worker like every other, after
    /// whatever is already queued, so it never races a background pass.
    /// Events of passes that finished before it are applied first.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotAuthenticated`] when nobody is signed in,
    /// [`CartError::Remote`] when the remote cart cannot be fetched and
    /// [`CartError::WorkerStopped`] when the worker is gone. The cart is left
    /// in `sync_failed` when the fetch fails.
    pub async fn sync_cart(&mut self) -> Result<ReconcileOutcome, CartError> {
        if !self.identity.is_authenticated() {
            return Err(CartError::NotAuthenticated);
        }

        self.dispatch(CartAction::BeginSync);

        let (reply, event) = oneshot::channel();

        self.send(SyncJob::Reconcile {
            snapshot: self.store.state().clone(),
            reason: ReconcileReason::Manual,
            reply: Some(reply),
        });

        let event = event.await.map_err(|_closed| CartError::WorkerStopped)?;

        self.apply_sync_events();

        match event {
            SyncEvent::Reconciled { outcome, .. } => {
                self.install(&outcome);
                Ok(outcome)
            }
            SyncEvent::Failed { error, .. } => {
                self.dispatch(CartAction::SyncFailed(error.to_string()));
                Err(error.into())
            }
        }
    }

    /// Queue another reconciliation pass. Returns `false` when nobody is
    /// signed in.
    pub fn retry_sync(&mut self) -> bool {
        if !self.identity.is_authenticated() {
            return false;
        }

        self.dispatch(CartAction::BeginSync);
        self.request_reconcile(ReconcileReason::Retry);

        true
    }

    /// React to the identity signal flipping.
    ///
    /// Signing in queues a merge-on-login pass. Signing out keeps the lines
    /// as a guest cart but forgets every server-side id. Returns whether the
    /// signal actually changed since the last call.
    pub fn identity_changed(&mut self) -> bool {
        let authenticated = self.identity.is_authenticated();

        if authenticated == self.was_authenticated {
            return false;
        }

        self.was_authenticated = authenticated;

        if authenticated {
            info!(user = ?self.identity.user_id(), "shopper signed in, merging carts");

            self.dispatch(CartAction::BeginSync);
            self.request_reconcile(ReconcileReason::Login);
        } else {
            info!("shopper signed out, keeping cart as guest cart");

            self.dispatch(CartAction::DetachRemote);
        }

        true
    }

    /// The server consumed the cart at checkout; forget it locally.
    pub fn checkout_completed(&mut self) {
        self.store.dispatch(CartAction::ClearCart);
        self.store
            .dispatch(CartAction::ReplaceWithSnapshot(CartSnapshot {
                synced: true,
                ..CartSnapshot::default()
            }));

        self.persistence.clear();

        info!(version = self.store.state().version(), "checkout completed, cart cleared");
    }

    /// Apply every sync event that has already arrived. Returns how many
    /// were applied rather than dropped as stale.
    pub fn apply_sync_events(&mut self) -> usize {
        let mut applied = 0;

        while let Ok(event) = self.events.try_recv() {
            if self.apply_event(event) {
                applied += 1;
            }
        }

        applied
    }

    /// Wait for the next sync event and apply it.
    ///
    /// Returns `None` once the worker has stopped, otherwise whether the
    /// event was applied.
    pub async fn next_sync_event(&mut self) -> Option<bool> {
        let event = self.events.recv().await?;

        Some(self.apply_event(event))
    }

    /// Sum of quantities over all lines.
    pub fn item_count(&self) -> u64 {
        self.store.state().total_item_count()
    }

    /// Sum of `unit_price * quantity` over all lines.
    pub fn total(&self) -> Decimal {
        self.store.state().total_amount()
    }

    /// Whether the exact variant is in the cart.
    pub fn is_in_cart(&self, product_id: ProductId, size: Option<&str>, color: Option<&str>) -> bool {
        self.store
            .state()
            .contains(&IdentityKey::new(product_id, size, color))
    }

    /// Stop the sync worker after it has finished the queued work, apply
    /// what it reported and return the final state.
    pub async fn shutdown(mut self) -> CartState {
        self.jobs = None;

        if let Some(worker) = self.worker.take() {
            if let Err(error) = worker.await {
                warn!(%error, "sync worker ended abnormally");
            }
        }

        self.apply_sync_events();

        self.store.state().clone()
    }

    fn line_quantity(&self, line: &LineId) -> u32 {
        self.store
            .state()
            .item(line)
            .map_or(0, |item| item.quantity)
    }

    /// How the server should find `line`, or `None` for an unknown line.
    fn remote_target(&self, line: &LineId) -> Option<RemoteTarget> {
        let item = self.store.state().item(line)?;

        Some(match &item.remote_item_id {
            Some(id) => RemoteTarget::Item(id.clone()),
            None => RemoteTarget::Key(item.key()),
        })
    }

    /// Apply `action` and persist if anything changed.
    fn dispatch(&mut self, action: CartAction) -> bool {
        let changed = self.store.dispatch(action);

        if changed {
            self.persistence.save(self.store.state());
        }

        changed
    }

    fn sync_mutation(&mut self, op: RemoteOp) -> PendingSync {
        if !self.identity.is_authenticated() {
            return PendingSync::local_only();
        }

        let (reply, outcome) = oneshot::channel();

        debug!(op = op.name(), "queueing remote cart operation");

        self.send(SyncJob::Remote { op, reply });
        self.dispatch(CartAction::BeginSync);
        self.request_reconcile(ReconcileReason::Mutation);

        PendingSync::awaiting(outcome)
    }

    fn request_reconcile(&self, reason: ReconcileReason) {
        self.send(SyncJob::Reconcile {
            snapshot: self.store.state().clone(),
            reason,
            reply: None,
        });
    }

    fn send(&self, job: SyncJob) {
        let Some(jobs) = &self.jobs else {
            return;
        };

        if jobs.send(job).is_err() {
            warn!("sync worker is gone, change stays local");
        }
    }

    fn apply_event(&mut self, event: SyncEvent) -> bool {
        let current = self.store.state().version();

        if event.version() < current {
            debug!(
                event_version = event.version(),
                current, "dropping stale sync event"
            );
            return false;
        }

        match event {
            SyncEvent::Reconciled { outcome, .. } => self.install(&outcome),
            SyncEvent::Failed { error, .. } => {
                if error.class() == RemoteErrorClass::Unauthorized {
                    warn!(%error, "remote cart refused the shopper's credentials");
                }

                self.dispatch(CartAction::SyncFailed(error.to_string()));
            }
        }

        true
    }

    fn install(&mut self, outcome: &ReconcileOutcome) {
        self.dispatch(CartAction::ReplaceWithSnapshot(outcome.snapshot.clone()));

        if !outcome.is_complete() {
            self.dispatch(CartAction::SyncFailed(format!(
                "{} cart line(s) could not be pushed to the server",
                outcome.failed_pushes
            )));
        }
    }
}

/// Server-side handle on a local line.
enum RemoteTarget {
    Item(RemoteItemId),
    Key(IdentityKey),
}

impl RemoteTarget {
    fn remove(self) -> RemoteOp {
        match self {
            Self::Item(item) => RemoteOp::Remove(item),
            Self::Key(key) => RemoteOp::RemoveByKey(key),
        }
    }

    fn update(self, update: RemoteItemUpdate) -> RemoteOp {
        match self {
            Self::Item(item) => RemoteOp::Update { item, update },
            Self::Key(key) => RemoteOp::UpdateByKey { key, update },
        }
    }
}
