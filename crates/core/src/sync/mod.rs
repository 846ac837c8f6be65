//! Background sync.
//!
//! Local mutations never wait on the network. The cart hands [`SyncJob`]s to
//! a [`SyncWorker`] over a channel and later drains [`SyncEvent`]s back.
//! Every event carries the cart version it was computed from so that a
//! response to an older snapshot cannot clobber newer local edits.

use tokio::sync::oneshot;

use crate::{
    cart::{CartState, IdentityKey},
    reconcile::ReconcileOutcome,
    remote::{NewRemoteItem, RemoteCartError, RemoteItemId, RemoteItemUpdate},
};

mod worker;

pub(crate) use worker::SyncWorker;

/// A single remote mutation mirroring a local one.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOp {
    /// `POST /cart/add`
    Add(NewRemoteItem),

    /// `PUT /cart/item/{id}` for a line whose server id is known.
    Update {
        /// Server item to change.
        item: RemoteItemId,
        /// New quantity.
        update: RemoteItemUpdate,
    },

    /// `PUT /cart/item/{id}` for a line whose server id has not come back
    /// yet. The worker looks the row up by identity key first.
    UpdateByKey {
        /// Identity key of the local line.
        key: IdentityKey,
        /// New quantity.
        update: RemoteItemUpdate,
    },

    /// `DELETE /cart/item/{id}`
    Remove(RemoteItemId),

    /// `DELETE /cart/item/{id}`, looked up by identity key like
    /// [`RemoteOp::UpdateByKey`].
    RemoveByKey(IdentityKey),

    /// `DELETE /cart/clear`
    Clear,
}

impl RemoteOp {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Add(_) => "add",
            Self::Update { .. } | Self::UpdateByKey { .. } => "update",
            Self::Remove(_) | Self::RemoveByKey(_) => "remove",
            Self::Clear => "clear",
        }
    }
}

/// Why a reconciliation pass was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileReason {
    /// Follows a local mutation.
    Mutation,

    /// Merge-on-login.
    Login,

    /// The owner asked to retry after a failure.
    Retry,

    /// [`crate::Cart::sync_cart`], which waits for the result.
    Manual,
}

pub(crate) type OpReply = oneshot::Sender<Result<(), RemoteCartError>>;

/// Receives the event of the pass a waiting caller asked for, instead of the
/// event channel.
pub(crate) type ReconcileReply = oneshot::Sender<SyncEvent>;

/// Work queued for the sync worker.
#[derive(Debug)]
pub(crate) enum SyncJob {
    Remote {
        op: RemoteOp,
        reply: OpReply,
    },
    Reconcile {
        snapshot: CartState,
        reason: ReconcileReason,
        reply: Option<ReconcileReply>,
    },
}

/// Outcome reported back by the worker.
#[derive(Debug)]
pub enum SyncEvent {
    /// A pass finished; install its snapshot.
    Reconciled {
        /// Cart version the pass started from.
        version: u64,
        /// What the pass produced.
        outcome: ReconcileOutcome,
    },

    /// A pass could not fetch the remote cart.
    Failed {
        /// Cart version the pass started from.
        version: u64,
        /// Why it failed.
        error: RemoteCartError,
    },
}

impl SyncEvent {
    /// Cart version the event was computed from.
    pub fn version(&self) -> u64 {
        match self {
            Self::Reconciled { version, .. } | Self::Failed { version, .. } => *version,
        }
    }
}

/// Handle on the remote half of a cart mutation.
///
/// The local half has already been applied by the time this is returned.
/// Awaiting [`PendingSync::outcome`] reports whether the server accepted the
/// matching remote operation; dropping the handle is fine.
#[derive(Debug)]
#[must_use = "await `outcome()` to learn whether the server accepted the change"]
pub struct PendingSync {
    reply: Option<oneshot::Receiver<Result<(), RemoteCartError>>>,
}

impl PendingSync {
    /// Nothing was sent to the server.
    pub fn local_only() -> Self {
        Self { reply: None }
    }

    pub(crate) fn awaiting(reply: oneshot::Receiver<Result<(), RemoteCartError>>) -> Self {
        Self { reply: Some(reply) }
    }

    /// Whether nothing was sent to the server.
    pub fn is_local_only(&self) -> bool {
        self.reply.is_none()
    }

    /// Wait for the remote operation.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CartError::Remote`] if the server rejected or could
    /// not be reached, [`crate::CartError::NotAuthenticated`] if the shopper
    /// signed out before the operation ran, and
    /// [`crate::CartError::WorkerStopped`] if the sync worker went away
    /// before answering.
    pub async fn outcome(self) -> Result<(), crate::CartError> {
        let Some(reply) = self.reply else {
            return Ok(());
        };

        reply
            .await
            .map_err(|_closed| crate::CartError::WorkerStopped)?
            .map_err(crate::CartError::from)
    }
}
