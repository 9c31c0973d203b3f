//! Reachability of optional collaborators.
//!
//! The probe owns the only writer of the capability flag. Request processing
//! reads [`CapabilityFlags`] snapshots and never mutates them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use ticketwise_graph::SharedStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default bound on a single reachability check.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Snapshot of which optional collaborators are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityFlags {
    /// Relationship store reachable and enabled.
    pub relationship_store: bool,
}

impl CapabilityFlags {
    pub fn all() -> Self {
        Self {
            relationship_store: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Checks whether the relationship store can be used.
///
/// Cloning shares the flag, so a background refresh and the orchestrator
/// see the same value.
#[derive(Clone)]
pub struct CapabilityProbe {
    store: Option<SharedStore>,
    enabled: bool,
    timeout: Duration,
    relationship_store: Arc<AtomicBool>,
}

impl std::fmt::Debug for CapabilityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityProbe")
            .field("store", &self.store.as_ref().map(|s| s.name().to_string()))
            .field("enabled", &self.enabled)
            .field("timeout", &self.timeout)
            .field("relationship_store", &self.relationship_store.load(Ordering::SeqCst))
            .finish()
    }
}

impl CapabilityProbe {
    /// Probe for `store`. The flag reads false until the first probe.
    pub fn new(store: Option<SharedStore>) -> Self {
        Self {
            store,
            enabled: true,
            timeout: DEFAULT_PROBE_TIMEOUT,
            relationship_store: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A probe that always reports the store unavailable.
    pub fn disabled() -> Self {
        Self::new(None).with_enabled(false)
    }

    /// Honour the configuration toggle. A disabled probe never touches the store.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current flags without probing.
    pub fn flags(&self) -> CapabilityFlags {
        CapabilityFlags {
            relationship_store: self.relationship_store.load(Ordering::SeqCst),
        }
    }

    /// Check reachability now, store the result, and return fresh flags.
    ///
    /// A timeout or missing store counts as unreachable.
    pub async fn probe(&self) -> CapabilityFlags {
        let reachable = match (&self.store, self.enabled) {
            (Some(store), true) => {
                match tokio::time::timeout(self.timeout, store.is_reachable()).await {
                    Ok(reachable) => reachable,
                    Err(_) => {
                        tracing::warn!(
                            store = store.name(),
                            timeout_ms = self.timeout.as_millis() as u64,
                            "relationship store probe timed out"
                        );
                        false
                    }
                }
            }
            _ => false,
        };

        let previous = self.relationship_store.swap(reachable, Ordering::SeqCst);
        if previous != reachable {
            tracing::info!(
                relationship_store = reachable,
                enabled = self.enabled,
                "capability changed"
            );
        }
        self.flags()
    }

    /// Re-probe every `interval` until `cancel` fires.
    pub fn spawn_refresh(&self, interval: Duration, cancel: CancellationToken) -> JoinHandle<()> {
        let probe = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately; startup already probed.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("capability refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        probe.probe().await;
                    }
                }
            }
        })
    }
}
