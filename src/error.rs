//! Error types for container lifecycle management.

use std::time::Duration;

use thiserror::Error;

/// Result type for manager operations.
pub type Result<T> = std::result::Result<T, BerthError>;

/// Errors that surface from manager construction or [`run()`].
///
/// Cleanup and container-control failures never appear here: teardown is
/// inherently racy against external engine state, so those paths are
/// best-effort and logged. An absent sentinel file is reported through
/// [`CleanupOutcome::NothingToClean`], not an error.
///
/// [`run()`]: crate::manager::ContainerManager::run
/// [`CleanupOutcome::NothingToClean`]: crate::reclaim::CleanupOutcome::NothingToClean
#[derive(Debug, Error)]
pub enum BerthError {
    /// Invalid configuration (e.g. missing image name). Fatal at
    /// construction, never recovered.
    #[error("configuration error: {reason}")]
    Config {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// Failed to pull the image. Fatal, surfaces as a `run()` error.
    #[error("failed to pull image '{image}': {reason}")]
    ImagePullFailed {
        /// Image name.
        image: String,
        /// Reason for failure.
        reason: String,
    },

    /// The spawn capability failed to start the engine process.
    #[error("failed to spawn '{command}': {reason}")]
    SpawnFailed {
        /// The full command line that was being spawned.
        command: String,
        /// Reason for failure.
        reason: String,
    },

    /// The health probe never succeeded within the bound. Distinct from
    /// pull and spawn failures, and from "no health check configured"
    /// (which resolves successfully without probing).
    #[error("health check at '{url}' did not succeed within {waited:?}")]
    HealthCheckTimeout {
        /// The readiness endpoint that was probed.
        url: String,
        /// How long was waited before giving up.
        waited: Duration,
    },
}
