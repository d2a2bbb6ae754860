//! todo-rollout — staged canary rollouts with automatic revert.
//!
//! A new service version enters at a partial traffic weight, is monitored
//! against an error-rate telemetry stream for a fixed window, and is then
//! either promoted to full traffic or rolled back. Every failure mode
//! (breach, telemetry blackout, operator abort) resolves toward rollback.
//!
//! # Components
//!
//! - **`policy`** — Rollout policy (initial weight, alarm threshold, window)
//! - **`machine`** — Deployment state machine (Canary → Monitoring → terminal)
//! - **`sampler`** — Error-rate telemetry interface + HTTP client
//! - **`traffic`** — Per-version traffic weight router
//! - **`controller`** — Background control loop driving the machine

pub mod controller;
pub mod error;
pub mod machine;
pub mod policy;
pub mod sampler;
pub mod traffic;

pub use controller::RolloutController;
pub use error::{RolloutError, RolloutResult};
pub use machine::{Deployment, DeploymentId, DeploymentState, Tick, WeightCommand};
pub use policy::RolloutPolicy;
pub use sampler::{AlarmSample, HttpSampler, MetricSampler, SamplerError};
pub use traffic::TrafficRouter;
