//! Sync Config

use clap::Args;
use duka_cart::reconcile::{MergeMatch, ReconciliationPolicy};

/// How local lines are matched against the server cart on merge.
#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
pub enum MergeMatchArg {
    /// Any variant of the same product counts as present.
    #[default]
    ProductId,

    /// Only the exact product, size and color count as present.
    IdentityKey,
}

impl From<MergeMatchArg> for MergeMatch {
    fn from(value: MergeMatchArg) -> Self {
        match value {
            MergeMatchArg::ProductId => Self::ProductId,
            MergeMatchArg::IdentityKey => Self::IdentityKey,
        }
    }
}

/// Reconciliation settings.
#[derive(Debug, Args)]
pub struct SyncConfig {
    /// Merge matching rule (product-id, identity-key)
    #[arg(long, env = "CART_MERGE_MATCH", value_enum, default_value_t = MergeMatchArg::ProductId)]
    pub merge_match: MergeMatchArg,

    /// Ask the server to merge its guest cart before the login merge
    #[arg(long, env = "CART_SERVER_GUEST_MERGE", default_value_t = false)]
    pub server_guest_merge: bool,
}

impl SyncConfig {
    /// The reconciliation policy these settings describe.
    #[must_use]
    pub fn policy(&self) -> ReconciliationPolicy {
        ReconciliationPolicy::new(self.merge_match.into())
            .with_server_guest_merge(self.server_guest_merge)
    }
}
