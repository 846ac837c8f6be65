//! Sync worker task.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::{
    cart::{CartState, IdentityKey},
    identity::Identity,
    reconcile::ReconciliationPolicy,
    remote::{RemoteCartClient, RemoteCartError, RemoteItemId, RemoteItemUpdate},
    sync::{ReconcileReason, ReconcileReply, RemoteOp, SyncEvent, SyncJob},
};

/// Executes queued remote operations and reconciliation passes.
///
/// Jobs that pile up while a pass is in flight are handled as one batch:
/// remote operations run in dispatch order, then a single reconciliation
/// pass runs against the newest queued snapshot. Passes never overlap.
pub(crate) struct SyncWorker {
    jobs: UnboundedReceiver<SyncJob>,
    events: UnboundedSender<SyncEvent>,
    executor: Executor,
}

impl std::fmt::Debug for SyncWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncWorker")
            .field("policy", &self.executor.policy)
            .finish_non_exhaustive()
    }
}

/// The parts of the worker shared across awaits.
struct Executor {
    remote: Arc<dyn RemoteCartClient>,
    identity: Arc<dyn Identity>,
    policy: ReconciliationPolicy,
}

impl SyncWorker {
    pub(crate) fn new(
        jobs: UnboundedReceiver<SyncJob>,
        events: UnboundedSender<SyncEvent>,
        remote: Arc<dyn RemoteCartClient>,
        identity: Arc<dyn Identity>,
        policy: ReconciliationPolicy,
    ) -> Self {
        Self {
            jobs,
            events,
            executor: Executor {
                remote,
                identity,
                policy,
            },
        }
    }

    /// Run until the job channel closes or nobody listens for events.
    pub(crate) async fn run(self) {
        let Self {
            mut jobs,
            events,
            executor,
        } = self;

        while let Some(first) = jobs.recv().await {
            let mut batch = vec![first];

            while let Ok(job) = jobs.try_recv() {
                batch.push(job);
            }

            let mut latest: Option<(CartState, ReconcileReason)> = None;
            let mut waiter: Option<ReconcileReply> = None;

            for job in batch {
                match job {
                    SyncJob::Remote { op, reply } => {
                        let result = executor.execute(op).await;

                        if reply.send(result).is_err() {
                            debug!("caller stopped waiting for remote cart operation");
                        }
                    }
                    SyncJob::Reconcile {
                        snapshot,
                        reason,
                        reply,
                    } => {
                        let reason = match latest {
                            Some((_, ReconcileReason::Login)) => ReconcileReason::Login,
                            _ => reason,
                        };

                        latest = Some((snapshot, reason));

                        if reply.is_some() {
                            waiter = reply;
                        }
                    }
                }
            }

            let Some((snapshot, reason)) = latest else {
                continue;
            };

            let event = executor.reconcile(&snapshot, reason).await;

            let event = match waiter {
                Some(waiter) => match waiter.send(event) {
                    Ok(()) => continue,
                    Err(event) => event,
                },
                None => event,
            };

            if events.send(event).is_err() {
                break;
            }
        }

        debug!("sync worker stopped");
    }
}

impl Executor {
    async fn execute(&self, op: RemoteOp) -> Result<(), RemoteCartError> {
        if !self.identity.is_authenticated() {
            return Err(RemoteCartError::Unauthenticated);
        }

        let name = op.name();

        let result = match op {
            RemoteOp::Add(item) => self.remote.add_item(item).await,
            RemoteOp::Update { item, update } => self.remote.update_item(item, update).await,
            RemoteOp::UpdateByKey { key, update } => self.update_by_key(&key, update).await,
            RemoteOp::Remove(item) => self.remote.remove_item(item).await,
            RemoteOp::RemoveByKey(key) => self.remove_by_key(&key).await,
            RemoteOp::Clear => self.remote.clear_cart().await,
        };

        match &result {
            Ok(()) => debug!(op = name, "remote cart operation applied"),
            Err(error) => {
                warn!(op = name, %error, class = ?error.class(), "remote cart operation failed");
            }
        }

        result
    }

    /// Server rows holding `key`, in server order.
    async fn rows_for(&self, key: &IdentityKey) -> Result<Vec<RemoteItemId>, RemoteCartError> {
        let cart = self.remote.fetch_cart().await?;

        Ok(cart
            .items
            .into_iter()
            .filter(|row| &row.key() == key)
            .map(|row| row.id)
            .collect())
    }

    /// Set the first matching row to the new quantity and drop any
    /// duplicates, so the folded server line ends up at that quantity.
    async fn update_by_key(
        &self,
        key: &IdentityKey,
        update: RemoteItemUpdate,
    ) -> Result<(), RemoteCartError> {
        let mut rows = self.rows_for(key).await?.into_iter();

        let Some(first) = rows.next() else {
            debug!(line = %key.line_id(), "no server row for line yet, leaving it to reconciliation");
            return Ok(());
        };

        self.remote.update_item(first, update).await?;

        for duplicate in rows {
            self.remote.remove_item(duplicate).await?;
        }

        Ok(())
    }

    async fn remove_by_key(&self, key: &IdentityKey) -> Result<(), RemoteCartError> {
        for row in self.rows_for(key).await? {
            self.remote.remove_item(row).await?;
        }

        Ok(())
    }

    async fn reconcile(&self, snapshot: &CartState, reason: ReconcileReason) -> SyncEvent {
        let version = snapshot.version();

        if !self.identity.is_authenticated() {
            return SyncEvent::Failed {
                version,
                error: RemoteCartError::Unauthenticated,
            };
        }

        info!(version, ?reason, "reconciling cart with server");

        let result = match reason {
            ReconcileReason::Login => {
                self.policy
                    .reconcile_on_login(snapshot, self.remote.as_ref())
                    .await
            }
            ReconcileReason::Mutation | ReconcileReason::Retry | ReconcileReason::Manual => {
                self.policy.reconcile(snapshot, self.remote.as_ref()).await
            }
        };

        match result {
            Ok(outcome) => SyncEvent::Reconciled { version, outcome },
            Err(error) => {
                warn!(version, %error, class = ?error.class(), "cart reconciliation failed");
                SyncEvent::Failed { version, error }
            }
        }
    }
}
