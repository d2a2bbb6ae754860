//! Traffic weight router — splits traffic between a stable version and a
//! canary.
//!
//! The router holds a single split at a time, so the stable and canary
//! weights sum to 100 by construction. Versions that lose their traffic
//! (a rolled-back canary, a superseded stable) stay registered at weight 0
//! so they remain resolvable for inspection or manual rollback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use tracing::{debug, info};

use crate::machine::WeightCommand;

struct SplitState {
    /// Version holding the non-canary share of traffic.
    stable: String,
    /// Active canary version, if a split is in effect.
    canary: Option<String>,
    /// Canary traffic weight (0-100).
    canary_weight: u8,
    /// Versions retained at weight 0.
    retained: Vec<String>,
}

/// Routes traffic between the stable version and an optional canary.
pub struct TrafficRouter {
    state: RwLock<SplitState>,
    counter: AtomicUsize,
}

impl TrafficRouter {
    /// Create a router with all traffic on the given stable version.
    pub fn new(stable_version: &str) -> Self {
        Self {
            state: RwLock::new(SplitState {
                stable: stable_version.to_string(),
                canary: None,
                canary_weight: 0,
                retained: Vec::new(),
            }),
            counter: AtomicUsize::new(0),
        }
    }

    /// The version currently holding the stable share of traffic.
    pub fn stable_version(&self) -> String {
        self.state.read().expect("traffic lock").stable.clone()
    }

    /// Register a canary version and apply its entry weight.
    pub fn begin_split(&self, canary_version: &str, cmd: WeightCommand) {
        let mut state = self.state.write().expect("traffic lock");
        if let Some(old) = state.canary.take() {
            state.retained.push(old);
        }
        state.canary = Some(canary_version.to_string());
        state.canary_weight = cmd.canary_percent;
        info!(
            stable = %state.stable,
            canary = canary_version,
            weight = cmd.canary_percent,
            "traffic split started"
        );
    }

    /// Apply a weight command to the current split.
    ///
    /// Weight 100 promotes the canary to stable (the old stable is retained
    /// at weight 0); weight 0 ends the split and retains the canary.
    pub fn apply(&self, cmd: WeightCommand) {
        let mut state = self.state.write().expect("traffic lock");
        let Some(canary) = state.canary.clone() else {
            return;
        };

        match cmd.canary_percent {
            100 => {
                let old_stable = std::mem::replace(&mut state.stable, canary);
                state.retained.push(old_stable);
                state.canary = None;
                state.canary_weight = 0;
                info!(stable = %state.stable, "canary promoted to stable");
            }
            0 => {
                state.canary = None;
                state.canary_weight = 0;
                state.retained.push(canary.clone());
                info!(stable = %state.stable, retained = %canary, "traffic restored to stable");
            }
            weight => {
                state.canary_weight = weight;
                debug!(canary = %canary, weight, "canary weight adjusted");
            }
        }
    }

    /// Current traffic weight for a version. Unregistered versions get 0.
    pub fn weight_of(&self, version: &str) -> u8 {
        let state = self.state.read().expect("traffic lock");
        if state.canary.as_deref() == Some(version) {
            state.canary_weight
        } else if state.stable == version {
            100 - state.canary_weight
        } else {
            0
        }
    }

    /// True if the version is still registered (possibly at weight 0).
    pub fn is_registered(&self, version: &str) -> bool {
        let state = self.state.read().expect("traffic lock");
        state.stable == version
            || state.canary.as_deref() == Some(version)
            || state.retained.iter().any(|v| v == version)
    }

    /// Pick the version for the next request (deterministic weighted pick).
    pub fn select_version(&self) -> String {
        let state = self.state.read().expect("traffic lock");
        let slot = (self.counter.fetch_add(1, Ordering::Relaxed) % 100) as u8;
        match &state.canary {
            Some(canary) if slot < state.canary_weight => canary.clone(),
            _ => state.stable.clone(),
        }
    }
}
