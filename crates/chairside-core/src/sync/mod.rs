//! Offline sync engine
//!
//! Writes that could not be confirmed remotely sit in the durable queue and
//! are replayed oldest-first by `drain()`. An operation is removed only
//! after the remote API confirms it; a failed replay halts the pass so that
//! causally dependent writes (a session create before its treatments) are
//! never applied out of order.

mod connectivity;

pub use connectivity::{connectivity_channel, spawn_reconnect_listener, ConnectivityProbe};

use std::sync::Arc;

use tokio::sync::{broadcast, watch, Mutex};

use crate::api::{form_fields, RemoteApi};
use crate::error::{Error, Result};
use crate::models::{NewSyncOperation, WriteMethod};
use crate::services::StoreService;

const REFRESH_CHANNEL_CAPACITY: usize = 16;

/// Result of an immediate write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The remote API confirmed the write
    Applied,
    /// The write is parked in the queue under the given id
    Queued(i64),
}

#[derive(Debug, PartialEq, Eq)]
enum DrainOutcome {
    AlreadyRunning,
    Offline,
    Empty,
    Drained { removed: usize, remaining: usize },
}

/// Replays queued writes against the remote API.
pub struct SyncService {
    store: StoreService,
    api: Arc<dyn RemoteApi>,
    online: watch::Receiver<bool>,
    refresh: broadcast::Sender<()>,
    drain_guard: Mutex<()>,
}

impl SyncService {
    #[must_use]
    pub fn new(store: StoreService, api: Arc<dyn RemoteApi>, online: watch::Receiver<bool>) -> Self {
        let (refresh, _) = broadcast::channel(REFRESH_CHANNEL_CAPACITY);
        Self {
            store,
            api,
            online,
            refresh,
            drain_guard: Mutex::new(()),
        }
    }

    /// Current connectivity state as last published by the probe.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Subscribe to the "server state may have changed" signal emitted after
    /// a pass that removed at least one operation.
    #[must_use]
    pub fn subscribe_refresh(&self) -> broadcast::Receiver<()> {
        self.refresh.subscribe()
    }

    /// Replay queued writes in order until the queue empties or a replay
    /// fails. Errors are logged, never propagated.
    pub async fn drain(&self) {
        match self.drain_pass().await {
            Ok(DrainOutcome::AlreadyRunning) => {
                tracing::debug!("Drain already in progress; skipping");
            }
            Ok(DrainOutcome::Offline) => {
                tracing::debug!("Offline; leaving queue untouched");
            }
            Ok(DrainOutcome::Empty) => {
                tracing::debug!("Sync queue empty; nothing to replay");
            }
            Ok(DrainOutcome::Drained { removed, remaining }) => {
                tracing::info!(removed, remaining, "Sync pass finished");
            }
            Err(error) => {
                tracing::warn!(%error, "Sync pass aborted on store error");
            }
        }
    }

    async fn drain_pass(&self) -> Result<DrainOutcome> {
        // Two close-together triggers (startup + reconnect) must not race on
        // the same queue
        let Ok(_guard) = self.drain_guard.try_lock() else {
            return Ok(DrainOutcome::AlreadyRunning);
        };

        if !self.is_online() {
            return Ok(DrainOutcome::Offline);
        }

        let operations = self.store.pending_operations().await?;
        if operations.is_empty() {
            return Ok(DrainOutcome::Empty);
        }

        let total = operations.len();
        let mut removed = 0;

        for operation in operations {
            let fields = form_fields(&operation.payload);
            match self
                .api
                .submit(&operation.endpoint, operation.method, &fields)
                .await
            {
                Ok(()) => {
                    // Removal only after confirmed success; a delete failure
                    // halts the pass and the write replays next time
                    self.store.delete_operation(operation.id).await?;
                    removed += 1;
                }
                Err(error) => {
                    // Later operations may depend on this one, so the whole
                    // pass stops here
                    tracing::warn!(
                        id = operation.id,
                        endpoint = %operation.endpoint,
                        %error,
                        "Replay failed; halting pass"
                    );
                    break;
                }
            }
        }

        if removed > 0 {
            let _ = self.refresh.send(());
        }

        Ok(DrainOutcome::Drained {
            removed,
            remaining: total - removed,
        })
    }

    /// Apply a write immediately when possible, otherwise park it in the
    /// queue.
    ///
    /// A transport failure falls back to the queue; a remote rejection
    /// (non-success status) is returned to the caller instead of being
    /// queued, since replaying it verbatim would wedge the queue. Enqueue
    /// failures always propagate.
    pub async fn submit_or_enqueue(
        &self,
        endpoint: &str,
        method: WriteMethod,
        payload: serde_json::Map<String, serde_json::Value>,
    ) -> Result<WriteOutcome> {
        if self.is_online() {
            let fields = form_fields(&payload);
            match self.api.submit(endpoint, method, &fields).await {
                Ok(()) => {
                    let _ = self.refresh.send(());
                    return Ok(WriteOutcome::Applied);
                }
                Err(Error::Http(error)) => {
                    tracing::warn!(%endpoint, %error, "Immediate write failed; queueing");
                }
                Err(other) => return Err(other),
            }
        }

        let operation = NewSyncOperation::new(endpoint, method, payload);
        let id = self.store.enqueue_operation(&operation).await?;
        tracing::info!(id, %endpoint, "Write queued for replay");
        Ok(WriteOutcome::Queued(id))
    }
}
