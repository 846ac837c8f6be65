//! Reconciliation Policy
//!
//! Merges the client-held cart into the server-held one:
//!
//! 1. Fetch the remote cart. If that fails nothing else happens.
//! 2. Push every local line the remote cart does not already hold. The
//!    remote cart stays authoritative for lines it does hold, so server
//!    quantities are never overwritten.
//! 3. Reload the remote cart and hand it back as the snapshot to install.
//!
//! Pushes are independent. One failing push does not stop the others, and a
//! pass can leave the server partially merged. Lines whose push failed are
//! carried over into the returned snapshot so they are not lost locally.

use tracing::{debug, info, warn};

use crate::{
    cart::models::{CartLineItem, CartSnapshot, CartState},
    remote::{NewRemoteItem, RemoteCart, RemoteCartClient, RemoteCartError},
};

/// How a local line is matched against the remote cart during a merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeMatch {
    /// A local line counts as present remotely if any remote row has the same
    /// product, whatever its size or color. A local variant of a product the
    /// server already holds in another variant is therefore not pushed.
    #[default]
    ProductId,

    /// Match on the full `(product_id, size, color)` identity key.
    IdentityKey,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// State to install via `ReplaceWithSnapshot`.
    pub snapshot: CartSnapshot,

    /// Lines pushed successfully.
    pub pushed: usize,

    /// Lines whose push failed.
    pub failed_pushes: usize,

    /// Local lines not pushed because the remote cart already had them.
    pub skipped: usize,
}

impl ReconcileOutcome {
    /// Whether every push went through.
    pub fn is_complete(&self) -> bool {
        self.failed_pushes == 0
    }
}

/// Reconciliation Policy
#[derive(Debug, Clone, Copy, Default)]
pub struct ReconciliationPolicy {
    merge_match: MergeMatch,
    server_guest_merge: bool,
}

impl ReconciliationPolicy {
    /// Policy matching lines by `merge_match`, without server guest merge.
    #[must_use]
    pub fn new(merge_match: MergeMatch) -> Self {
        Self {
            merge_match,
            server_guest_merge: false,
        }
    }

    /// Ask the server to merge its guest cart (`POST /cart/merge`) before the
    /// merge-on-login pass.
    #[must_use]
    pub fn with_server_guest_merge(mut self, enabled: bool) -> Self {
        self.server_guest_merge = enabled;
        self
    }

    /// How local lines are matched against remote rows.
    pub fn merge_match(&self) -> MergeMatch {
        self.merge_match
    }

    fn is_present(&self, remote: &RemoteCart, line: &CartLineItem) -> bool {
        match self.merge_match {
            MergeMatch::ProductId => remote.has_product(line.product_id),
            MergeMatch::IdentityKey => remote.has_key(&line.key()),
        }
    }

    /// Merge-on-login: optionally fold the server guest cart, then reconcile.
    ///
    /// A failed guest merge is logged and the regular pass still runs.
    ///
    /// # Errors
    ///
    /// Returns an error when the remote cart cannot be fetched.
    pub async fn reconcile_on_login(
        &self,
        local: &CartState,
        remote: &dyn RemoteCartClient,
    ) -> Result<ReconcileOutcome, RemoteCartError> {
        if self.server_guest_merge {
            if let Err(error) = remote.merge_guest_cart().await {
                warn!(%error, "server-side guest cart merge failed");
            }
        }

        self.reconcile(local, remote).await
    }

    /// Run one reconciliation pass of `local` against `remote`.
    ///
    /// # Errors
    ///
    /// Returns an error when the remote cart cannot be fetched, before or
    /// after pushing. Individual push failures are not errors.
    pub async fn reconcile(
        &self,
        local: &CartState,
        remote: &dyn RemoteCartClient,
    ) -> Result<ReconcileOutcome, RemoteCartError> {
        let remote_cart = remote.fetch_cart().await?;

        let (missing, present): (Vec<&CartLineItem>, Vec<&CartLineItem>) = local
            .items()
            .iter()
            .partition(|line| !self.is_present(&remote_cart, line));

        for line in &present {
            debug!(line = %line.id, "remote cart already holds product, not pushing");
        }

        let mut pushed = 0;
        let mut failed = Vec::new();

        for line in missing {
            match remote
                .add_item(NewRemoteItem::for_line(line, line.quantity))
                .await
            {
                Ok(()) => pushed += 1,
                Err(error) => {
                    warn!(line = %line.id, %error, "failed to push cart line");
                    failed.push(line.clone());
                }
            }
        }

        let merged = if pushed == 0 && failed.is_empty() {
            remote_cart
        } else {
            remote.fetch_cart().await?
        };

        let failed_pushes = failed.len();
        let mut snapshot = merged.into_snapshot(failed.is_empty());

        if !failed.is_empty() {
            let retained: Vec<CartLineItem> = failed
                .into_iter()
                .filter(|line| !snapshot.items.iter().any(|item| item.id == line.id))
                .collect();

            snapshot.items.extend(retained);
            snapshot = CartSnapshot::from_items(snapshot.items, snapshot.remote_cart_id, false);
        }

        info!(
            pushed,
            failed_pushes,
            skipped = present.len(),
            remote_items = snapshot.items.len(),
            "cart reconciliation finished"
        );

        Ok(ReconcileOutcome {
            snapshot,
            pushed,
            failed_pushes,
            skipped: present.len(),
        })
    }
}
