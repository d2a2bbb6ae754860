//! Deployment state machine.
//!
//! `Canary → Monitoring → {Promoted | RolledBack}`. The terminal states
//! absorb; no transition leaves them. Every observation is routed through
//! [`Deployment::observe`], which checks for an alarm breach before crediting
//! a window tick, so a breach on the final tick still rolls back.

use tracing::{debug, info, warn};

use crate::policy::RolloutPolicy;
use crate::sampler::AlarmSample;

/// Unique identifier for a deployment attempt.
pub type DeploymentId = String;

/// Lifecycle state of a deployment.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DeploymentState {
    /// Registered, initial weight not yet applied.
    Canary,
    /// Receiving partial traffic, telemetry under evaluation.
    Monitoring,
    /// Holding 100% traffic. Terminal.
    Promoted,
    /// Reverted to 0% traffic. Terminal.
    RolledBack { reason: String },
}

impl DeploymentState {
    /// Terminal states absorb; nothing transitions out of them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Promoted | Self::RolledBack { .. })
    }
}

/// One control-loop observation.
#[derive(Debug, Clone)]
pub enum Tick {
    /// Telemetry delivered a sample for the canary version.
    Sample(AlarmSample),
    /// Telemetry was unavailable or timed out; counts neither way.
    Skipped,
}

/// Traffic weight change produced by a transition.
///
/// The stable version always holds the remainder, so the two weights sum
/// to 100 by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightCommand {
    /// Percentage of traffic for the canary version (0-100).
    pub canary_percent: u8,
}

impl WeightCommand {
    pub fn canary(percent: u8) -> Self {
        Self {
            canary_percent: percent.min(100),
        }
    }

    /// Percentage of traffic left on the stable version.
    pub fn stable_percent(&self) -> u8 {
        100 - self.canary_percent
    }
}

/// A single deployment attempt of a new version.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Deployment {
    pub id: DeploymentId,
    pub version_id: String,
    pub prior_version: String,
    pub state: DeploymentState,
    /// Current canary traffic weight (0-100).
    pub weight: u8,
    /// Unix timestamp (milliseconds) when the deployment was started.
    pub started_at: u64,
    policy: RolloutPolicy,
    /// Clean samples credited toward the evaluation window.
    clean_ticks: u32,
    /// Skipped samples since the last clean one.
    consecutive_skips: u32,
}

impl Deployment {
    /// Register a new deployment in the `Canary` state.
    pub fn new(
        id: &str,
        version_id: &str,
        prior_version: &str,
        policy: RolloutPolicy,
        started_at: u64,
    ) -> Self {
        Self {
            id: id.to_string(),
            version_id: version_id.to_string(),
            prior_version: prior_version.to_string(),
            state: DeploymentState::Canary,
            weight: policy.initial_weight.min(100),
            started_at,
            policy,
            clean_ticks: 0,
            consecutive_skips: 0,
        }
    }

    /// Apply the initial split and enter `Monitoring`.
    ///
    /// Returns the weight command for the entry split. Only acts from
    /// `Canary`; any other state is left unchanged.
    pub fn begin(&mut self) -> Option<WeightCommand> {
        if self.state != DeploymentState::Canary {
            return None;
        }
        self.state = DeploymentState::Monitoring;
        info!(
            deployment = %self.id,
            version = %self.version_id,
            weight = self.weight,
            window_ticks = self.policy.window_ticks(),
            "canary entered monitoring"
        );
        Some(WeightCommand::canary(self.weight))
    }

    /// Feed one observation into the machine.
    ///
    /// Returns a weight command when the observation caused a terminal
    /// transition. The breach check runs before the window-elapsed check,
    /// so an ambiguous final tick resolves to rollback.
    pub fn observe(&mut self, tick: Tick) -> Option<WeightCommand> {
        match &self.state {
            DeploymentState::Canary => None,
            DeploymentState::Promoted => None,
            DeploymentState::RolledBack { .. } => None,

            DeploymentState::Monitoring => match tick {
                Tick::Sample(sample) => {
                    if sample.error_rate >= self.policy.alarm_threshold {
                        return Some(self.roll_back(format!(
                            "alarm breach: error_rate={:.3} >= threshold={:.3}",
                            sample.error_rate, self.policy.alarm_threshold
                        )));
                    }

                    self.consecutive_skips = 0;
                    self.clean_ticks += 1;
                    debug!(
                        deployment = %self.id,
                        clean = self.clean_ticks,
                        window = self.policy.window_ticks(),
                        "clean sample"
                    );

                    if self.clean_ticks >= self.policy.window_ticks() {
                        self.state = DeploymentState::Promoted;
                        self.weight = 100;
                        info!(deployment = %self.id, version = %self.version_id, "canary promoted");
                        return Some(WeightCommand::canary(100));
                    }
                    None
                }

                Tick::Skipped => {
                    self.consecutive_skips += 1;
                    debug!(
                        deployment = %self.id,
                        skips = self.consecutive_skips,
                        cap = self.policy.max_consecutive_skips,
                        "telemetry sample skipped"
                    );
                    if self.consecutive_skips > self.policy.max_consecutive_skips {
                        return Some(self.roll_back(format!(
                            "telemetry unavailable for {} consecutive samples",
                            self.consecutive_skips
                        )));
                    }
                    None
                }
            },
        }
    }

    /// Operator abort: any non-terminal state goes straight to `RolledBack`.
    pub fn abort(&mut self, reason: &str) -> Option<WeightCommand> {
        if self.state.is_terminal() {
            return None;
        }
        Some(self.roll_back(format!("aborted: {reason}")))
    }

    fn roll_back(&mut self, reason: String) -> WeightCommand {
        warn!(deployment = %self.id, version = %self.version_id, %reason, "rolling back");
        self.state = DeploymentState::RolledBack { reason };
        self.weight = 0;
        WeightCommand::canary(0)
    }
}
