//! Connectivity monitor
//!
//! Holds the current online/offline status and tells subscribers about
//! transitions. Repeated reports of the same status are swallowed, and a new
//! subscriber is not called back with the current value.
//!
//! The status itself lives in a `tokio::sync::watch` channel so async code
//! can wait for the connection to come back, while synchronous callbacks are
//! kept in a registry keyed by subscription id.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use abacus_core::ports::IReachability;

type Callback = Arc<dyn Fn(bool) + Send + Sync>;

struct Inner {
    state: watch::Sender<bool>,
    subscribers: DashMap<u64, Callback>,
    next_id: AtomicU64,
}

/// Shared online/offline status with transition notifications
///
/// Cloning is cheap; all clones observe and drive the same status.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (state, _) = watch::channel(initially_online);
        Self {
            inner: Arc::new(Inner {
                state,
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Current status without waiting
    pub fn current_status(&self) -> bool {
        *self.inner.state.borrow()
    }

    /// Reports the observed status
    ///
    /// Subscribers are called only when the value actually changes. Returns
    /// `true` if this call was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = self.inner.state.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if !changed {
            return false;
        }

        info!(online, "Connectivity changed");

        // Snapshot the callbacks so one may unsubscribe while being called
        let callbacks: Vec<Callback> = self
            .inner
            .subscribers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        for callback in callbacks {
            callback(online);
        }
        true
    }

    /// Registers a callback for future transitions
    ///
    /// The callback stays registered until the returned [`Subscription`] is
    /// dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.insert(id, Arc::new(callback));
        debug!(subscription = id, "Connectivity subscriber added");
        Subscription {
            id,
            monitor: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// A receiver for async consumers of the raw status
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.inner.state.subscribe()
    }

    /// Resolves once the status is online (immediately if it already is)
    pub async fn wait_for_connection(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|online| *online).await;
    }

    /// Spawns a background task that probes `reachability` every `interval`
    /// and feeds the result into the monitor until `cancel` fires.
    pub fn spawn_probe(
        &self,
        reachability: Arc<dyn IReachability>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            info!(interval_ms = interval.as_millis() as u64, "Reachability probe starting");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("Reachability probe stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let online = reachability.is_reachable().await;
                        monitor.set_online(online);
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.current_status())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle for a registered connectivity callback
///
/// Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    monitor: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.monitor.upgrade() {
            inner.subscribers.remove(&self.id);
            debug!(subscription = self.id, "Connectivity subscriber removed");
        }
    }
}
