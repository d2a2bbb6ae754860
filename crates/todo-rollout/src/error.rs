//! Error types for rollout control.

use thiserror::Error;

/// Result type alias for rollout operations.
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Errors surfaced by the rollout controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RolloutError {
    /// Only one non-terminal deployment may exist at a time.
    #[error("a deployment is already in progress")]
    DeploymentInProgress,

    #[error("unknown deployment: {0}")]
    UnknownDeployment(String),
}
