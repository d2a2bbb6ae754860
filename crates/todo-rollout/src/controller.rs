//! Rollout controller — background control loop per active deployment.
//!
//! The controller owns the deployment registry and enforces the one-active-
//! deployment rule: starting a new deployment while any non-terminal one
//! exists fails with `DeploymentInProgress`. Each started deployment gets a
//! single control loop task that samples telemetry once per tick and feeds
//! the observation into the state machine until it lands in a terminal
//! state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{RolloutError, RolloutResult};
use crate::machine::{Deployment, DeploymentId, DeploymentState, Tick};
use crate::policy::RolloutPolicy;
use crate::sampler::{MetricSampler, sample_with_timeout};
use crate::traffic::TrafficRouter;

/// Per-deployment control loop state.
struct LoopSlot {
    /// Handle to the background control task.
    handle: JoinHandle<()>,
    /// Shutdown signal for this loop.
    shutdown_tx: watch::Sender<bool>,
}

/// Drives canary deployments for one service.
pub struct RolloutController<S> {
    sampler: Arc<S>,
    traffic: Arc<TrafficRouter>,
    policy: RolloutPolicy,
    /// All deployments, terminal ones retained for status queries.
    deployments: Arc<RwLock<HashMap<DeploymentId, Deployment>>>,
    /// Active control loops: deployment id → slot.
    loops: Arc<Mutex<HashMap<DeploymentId, LoopSlot>>>,
}

impl<S> Clone for RolloutController<S> {
    fn clone(&self) -> Self {
        Self {
            sampler: self.sampler.clone(),
            traffic: self.traffic.clone(),
            policy: self.policy.clone(),
            deployments: self.deployments.clone(),
            loops: self.loops.clone(),
        }
    }
}

impl<S: MetricSampler> RolloutController<S> {
    /// Create a controller over the given sampler and traffic router.
    pub fn new(sampler: Arc<S>, traffic: Arc<TrafficRouter>, policy: RolloutPolicy) -> Self {
        Self {
            sampler,
            traffic,
            policy,
            deployments: Arc::new(RwLock::new(HashMap::new())),
            loops: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a canary deployment of `version_id`.
    ///
    /// The check-and-register runs under one write lock, so two concurrent
    /// starts cannot both pass the in-progress check.
    pub async fn start(&self, version_id: &str) -> RolloutResult<DeploymentId> {
        let mut deployments = self.deployments.write().await;
        if deployments.values().any(|d| !d.state.is_terminal()) {
            return Err(RolloutError::DeploymentInProgress);
        }

        let stable = self.traffic.stable_version();
        let id = uuid::Uuid::new_v4().to_string();
        let mut deployment = Deployment::new(
            &id,
            version_id,
            &stable,
            self.policy.clone(),
            epoch_millis(),
        );

        if let Some(cmd) = deployment.begin() {
            self.traffic.begin_split(version_id, cmd);
        }
        deployments.insert(id.clone(), deployment);
        drop(deployments);

        self.spawn_loop(&id, version_id).await;
        info!(deployment = %id, version = version_id, prior = %stable, "deployment started");
        Ok(id)
    }

    /// Current state of a deployment, terminal ones included.
    pub async fn status(&self, id: &str) -> Option<DeploymentState> {
        let deployments = self.deployments.read().await;
        deployments.get(id).map(|d| d.state.clone())
    }

    /// Full snapshot of a deployment.
    pub async fn deployment(&self, id: &str) -> Option<Deployment> {
        let deployments = self.deployments.read().await;
        deployments.get(id).cloned()
    }

    /// Operator abort: any non-terminal deployment goes to `RolledBack`.
    ///
    /// Aborting an already-terminal deployment is a no-op.
    pub async fn abort(&self, id: &str, reason: &str) -> RolloutResult<()> {
        {
            let mut deployments = self.deployments.write().await;
            let deployment = deployments
                .get_mut(id)
                .ok_or_else(|| RolloutError::UnknownDeployment(id.to_string()))?;
            if let Some(cmd) = deployment.abort(reason) {
                self.traffic.apply(cmd);
            }
        }
        self.stop_loop(id).await;
        Ok(())
    }

    /// Stop all control loops without changing deployment state
    /// (for graceful shutdown).
    pub async fn shutdown(&self) {
        let mut loops = self.loops.lock().await;
        for (id, slot) in loops.drain() {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            debug!(deployment = %id, "control loop stopped");
        }
        info!("all control loops stopped");
    }

    async fn spawn_loop(&self, id: &str, version_id: &str) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let id_owned = id.to_string();
        let version = version_id.to_string();
        let policy = self.policy.clone();
        let sampler = self.sampler.clone();
        let traffic = self.traffic.clone();
        let deployments = self.deployments.clone();

        let handle = tokio::spawn(async move {
            run_control_loop(
                &id_owned,
                &version,
                &policy,
                sampler,
                traffic,
                deployments,
                shutdown_rx,
            )
            .await;
        });

        let mut loops = self.loops.lock().await;
        if let Some(old) = loops.insert(
            id.to_string(),
            LoopSlot {
                handle,
                shutdown_tx,
            },
        ) {
            // Stop the old loop if one was running under this id.
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
        }
    }

    async fn stop_loop(&self, id: &str) {
        let mut loops = self.loops.lock().await;
        if let Some(slot) = loops.remove(id) {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            debug!(deployment = %id, "control loop stopped");
        }
    }
}

/// The monitoring loop for a single deployment.
async fn run_control_loop<S: MetricSampler>(
    id: &str,
    version_id: &str,
    policy: &RolloutPolicy,
    sampler: Arc<S>,
    traffic: Arc<TrafficRouter>,
    deployments: Arc<RwLock<HashMap<DeploymentId, Deployment>>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let tick = Duration::from_millis(policy.tick_interval_ms);
    let timeout = Duration::from_millis(policy.sample_timeout_ms);

    debug!(deployment = %id, version = version_id, "control loop starting");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(tick) => {
                let outcome = match sample_with_timeout(sampler.as_ref(), version_id, timeout).await {
                    Ok(sample) if sample.version_id == version_id => Tick::Sample(sample),
                    Ok(sample) => {
                        debug!(
                            deployment = %id,
                            got = %sample.version_id,
                            "sample for wrong version, skipping"
                        );
                        Tick::Skipped
                    }
                    Err(e) => {
                        debug!(deployment = %id, error = %e, "sample skipped");
                        Tick::Skipped
                    }
                };

                let mut deployments = deployments.write().await;
                let Some(deployment) = deployments.get_mut(id) else {
                    break;
                };
                if deployment.state.is_terminal() {
                    // Aborted between ticks.
                    break;
                }
                // Weights are applied under the same lock that guards the
                // state, so a terminal state is never visible with stale
                // weights.
                if let Some(cmd) = deployment.observe(outcome) {
                    traffic.apply(cmd);
                }
                if deployment.state.is_terminal() {
                    break;
                }
            }
            _ = shutdown.changed() => {
                break;
            }
        }
    }

    debug!(deployment = %id, "control loop exited");
}

fn epoch_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use crate::sampler::{AlarmSample, SamplerError};

    /// Replays a scripted sequence of sample outcomes, then repeats the
    /// final step forever.
    struct ScriptedSampler {
        script: std::sync::Mutex<VecDeque<Result<f64, ()>>>,
        last: Result<f64, ()>,
    }

    impl ScriptedSampler {
        fn new(steps: Vec<Result<f64, ()>>) -> Self {
            let last = *steps.last().unwrap_or(&Ok(0.0));
            Self {
                script: std::sync::Mutex::new(steps.into()),
                last,
            }
        }
    }

    impl MetricSampler for ScriptedSampler {
        async fn sample(&self, version_id: &str) -> Result<AlarmSample, SamplerError> {
            let step = {
                let mut script = self.script.lock().unwrap();
                script.pop_front().unwrap_or(self.last)
            };
            match step {
                Ok(error_rate) => Ok(AlarmSample {
                    version_id: version_id.to_string(),
                    error_rate,
                    window_end: 1000,
                }),
                Err(()) => Err(SamplerError::Unavailable("scripted outage".to_string())),
            }
        }
    }

    fn test_policy() -> RolloutPolicy {
        RolloutPolicy {
            initial_weight: 10,
            alarm_threshold: 1.0,
            evaluation_window_ms: 50,
            tick_interval_ms: 10,
            sample_timeout_ms: 50,
            max_consecutive_skips: 2,
        }
    }

    fn test_controller(
        steps: Vec<Result<f64, ()>>,
    ) -> (RolloutController<ScriptedSampler>, Arc<TrafficRouter>) {
        let traffic = Arc::new(TrafficRouter::new("v1"));
        let controller = RolloutController::new(
            Arc::new(ScriptedSampler::new(steps)),
            traffic.clone(),
            test_policy(),
        );
        (controller, traffic)
    }

    async fn wait_terminal(
        controller: &RolloutController<ScriptedSampler>,
        id: &str,
    ) -> DeploymentState {
        for _ in 0..400 {
            if let Some(state) = controller.status(id).await {
                if state.is_terminal() {
                    return state;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("deployment did not reach a terminal state");
    }

    #[tokio::test]
    async fn clean_window_promotes_and_shifts_all_traffic() {
        let (controller, traffic) = test_controller(vec![Ok(0.0)]);

        let id = controller.start("v2").await.unwrap();
        assert_eq!(traffic.weight_of("v2"), 10);

        let state = wait_terminal(&controller, &id).await;
        assert_eq!(state, DeploymentState::Promoted);
        assert_eq!(traffic.weight_of("v2"), 100);
        assert_eq!(traffic.weight_of("v1"), 0);
        // The prior version is retained for manual rollback.
        assert!(traffic.is_registered("v1"));

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn breach_rolls_back_and_restores_prior_version() {
        // Clean tick, then a breach at tick 2 of the 5-tick window.
        let (controller, traffic) = test_controller(vec![Ok(0.0), Ok(5.0), Ok(0.0)]);

        let id = controller.start("v2").await.unwrap();
        let state = wait_terminal(&controller, &id).await;

        assert!(matches!(state, DeploymentState::RolledBack { .. }));
        assert_eq!(traffic.weight_of("v1"), 100);
        assert_eq!(traffic.weight_of("v2"), 0);
        // The failed version stays registered untrafficked.
        assert!(traffic.is_registered("v2"));

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn telemetry_blackout_forces_rollback() {
        // Never a breach, never a clean sample either.
        let (controller, traffic) = test_controller(vec![Err(())]);

        let id = controller.start("v2").await.unwrap();
        let state = wait_terminal(&controller, &id).await;

        assert!(matches!(state, DeploymentState::RolledBack { .. }));
        assert_eq!(traffic.weight_of("v1"), 100);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn second_start_rejected_while_active() {
        let (controller, _traffic) = test_controller(vec![Ok(0.0)]);

        let _id = controller.start("v2").await.unwrap();
        let err = controller.start("v3").await.unwrap_err();
        assert_eq!(err, RolloutError::DeploymentInProgress);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn start_allowed_after_terminal() {
        let (controller, _traffic) = test_controller(vec![Ok(9.0)]);

        let id = controller.start("v2").await.unwrap();
        wait_terminal(&controller, &id).await;

        // Prior attempt is terminal, a new one may start.
        let second = controller.start("v3").await.unwrap();
        assert_ne!(second, id);

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn abort_rolls_back_immediately() {
        // Long window so the deployment stays in monitoring.
        let traffic = Arc::new(TrafficRouter::new("v1"));
        let controller = RolloutController::new(
            Arc::new(ScriptedSampler::new(vec![Ok(0.0)])),
            traffic.clone(),
            RolloutPolicy {
                evaluation_window_ms: 60_000,
                tick_interval_ms: 10,
                ..test_policy()
            },
        );

        let id = controller.start("v2").await.unwrap();
        controller.abort(&id, "operator request").await.unwrap();

        let state = controller.status(&id).await.unwrap();
        assert!(matches!(state, DeploymentState::RolledBack { .. }));
        assert_eq!(traffic.weight_of("v1"), 100);
        assert_eq!(traffic.weight_of("v2"), 0);

        // Terminal absorbs: a second abort is a no-op.
        controller.abort(&id, "again").await.unwrap();

        controller.shutdown().await;
    }

    #[tokio::test]
    async fn abort_unknown_deployment_fails() {
        let (controller, _traffic) = test_controller(vec![Ok(0.0)]);
        let err = controller.abort("nope", "reason").await.unwrap_err();
        assert!(matches!(err, RolloutError::UnknownDeployment(_)));
    }

    #[tokio::test]
    async fn status_unknown_deployment_is_none() {
        let (controller, _traffic) = test_controller(vec![Ok(0.0)]);
        assert!(controller.status("nope").await.is_none());
    }

    #[tokio::test]
    async fn terminal_deployments_are_retained_for_status() {
        let (controller, _traffic) = test_controller(vec![Ok(0.0)]);

        let id = controller.start("v2").await.unwrap();
        wait_terminal(&controller, &id).await;

        // Status keeps answering after the loop exits.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(
            controller.status(&id).await,
            Some(DeploymentState::Promoted)
        );

        let snapshot = controller.deployment(&id).await.unwrap();
        assert_eq!(snapshot.version_id, "v2");
        assert_eq!(snapshot.weight, 100);

        controller.shutdown().await;
    }
}
