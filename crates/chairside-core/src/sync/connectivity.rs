//! Connectivity tracking and the reconnect listener
//!
//! Connectivity is a single boolean published on a watch channel. The probe
//! pings the remote API on an interval and publishes transitions; the
//! reconnect listener drains once at startup and again on every
//! offline-to-online edge.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::RemoteApi;
use crate::sync::SyncService;

/// Channel carrying the current connectivity state.
#[must_use]
pub fn connectivity_channel(initial: bool) -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(initial)
}

/// Periodically pings the remote API and publishes state transitions.
pub struct ConnectivityProbe {
    api: Arc<dyn RemoteApi>,
    tx: watch::Sender<bool>,
    interval: Duration,
}

impl ConnectivityProbe {
    #[must_use]
    pub fn new(api: Arc<dyn RemoteApi>, tx: watch::Sender<bool>, interval: Duration) -> Self {
        Self { api, tx, interval }
    }

    /// Ping once and publish the result if it differs from the current
    /// state. Returns the observed reachability.
    pub async fn check_once(&self) -> bool {
        let reachable = self.api.ping().await;

        let changed = self.tx.send_if_modified(|state| {
            if *state == reachable {
                false
            } else {
                *state = reachable;
                true
            }
        });

        if changed {
            if reachable {
                tracing::info!("Remote API reachable again");
            } else {
                tracing::info!("Remote API unreachable; entering offline mode");
            }
        }

        reachable
    }

    /// Probe until the channel has no receivers left.
    pub async fn run(self) {
        loop {
            self.check_once().await;
            if self.tx.is_closed() {
                return;
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Spawn the task that keeps the queue drained.
///
/// One drain runs immediately so writes queued in a previous session are
/// replayed without waiting for a connectivity edge; after that the task
/// drains on every transition to online.
pub fn spawn_reconnect_listener(
    sync: Arc<SyncService>,
    mut online: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        online.mark_changed();

        while online.changed().await.is_ok() {
            if *online.borrow_and_update() {
                sync.drain().await;
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use crate::models::WriteMethod;
    use crate::Result;

    struct FlakyRemote {
        reachable: AtomicBool,
        pings: AtomicUsize,
    }

    impl FlakyRemote {
        fn new(reachable: bool) -> Self {
            Self {
                reachable: AtomicBool::new(reachable),
                pings: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteApi for FlakyRemote {
        async fn submit(
            &self,
            _endpoint: &str,
            _method: WriteMethod,
            _fields: &[(String, String)],
        ) -> Result<()> {
            Ok(())
        }

        async fn fetch(&self, _endpoint: &str) -> Result<Value> {
            Ok(json!([]))
        }

        async fn ping(&self) -> bool {
            self.pings.fetch_add(1, Ordering::SeqCst);
            self.reachable.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn check_once_publishes_only_transitions() {
        let api = Arc::new(FlakyRemote::new(true));
        let (tx, mut rx) = connectivity_channel(false);
        let probe = ConnectivityProbe::new(api.clone(), tx, Duration::from_secs(30));
        rx.mark_unchanged();

        assert!(probe.check_once().await);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());

        // Steady state publishes nothing
        assert!(probe.check_once().await);
        assert!(!rx.has_changed().unwrap());

        api.reachable.store(false, Ordering::SeqCst);
        assert!(!probe.check_once().await);
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());

        assert_eq!(api.pings.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_stops_when_all_receivers_drop() {
        let api = Arc::new(FlakyRemote::new(true));
        let (tx, rx) = connectivity_channel(true);
        let probe = ConnectivityProbe::new(api, tx, Duration::from_millis(5));

        drop(rx);
        tokio::time::timeout(Duration::from_secs(1), probe.run())
            .await
            .expect("probe should exit once the channel closes");
    }
}
