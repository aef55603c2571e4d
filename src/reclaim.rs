//! Stale-container reclamation via the cidfile sentinel.
//!
//! The engine writes the container id into the sentinel at
//! `run --cidfile <path>`; the file is the only linkage between a manager
//! instance and a container across process restarts. A crash can leave the
//! file behind with no matching container, so every step here tolerates
//! "already gone".

use std::path::PathBuf;
use std::sync::Arc;

use crate::container;
use crate::ops::{CommandRunner, FileStore};

/// Outcome of a [`Reclaimer::cleanup`] pass. Never an error: an absent or
/// unreadable sentinel is the expected case on a clean start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// A sentinel was found; the file is gone and stop/remove were issued
    /// against the recorded id.
    Cleaned {
        /// The container id read from the sentinel.
        container_id: String,
    },
    /// No readable sentinel; nothing to clean.
    NothingToClean,
}

/// Detects and removes stale containers left by a prior run.
pub struct Reclaimer {
    cidfile: PathBuf,
    runner: Arc<dyn CommandRunner>,
    files: Arc<dyn FileStore>,
}

impl Reclaimer {
    pub fn new(cidfile: PathBuf, runner: Arc<dyn CommandRunner>, files: Arc<dyn FileStore>) -> Self {
        Self {
            cidfile,
            runner,
            files,
        }
    }

    /// Reclaim whatever the sentinel points at.
    ///
    /// Reads the sentinel, deletes it, then issues stop and remove against
    /// the recorded id. Stop and remove failures are logged and swallowed;
    /// the engine may have reaped the container already. An unreadable
    /// sentinel still gets a delete-if-exists before reporting
    /// [`CleanupOutcome::NothingToClean`].
    pub async fn cleanup(&self) -> CleanupOutcome {
        let contents = match self.files.read_to_string(&self.cidfile).await {
            Ok(contents) => contents,
            Err(e) => {
                tracing::trace!("no sentinel at {}: {e}", self.cidfile.display());
                self.remove_sentinel().await;
                return CleanupOutcome::NothingToClean;
            }
        };

        self.remove_sentinel().await;

        let container_id = contents.trim().to_string();
        if container_id.is_empty() {
            // A crash between file creation and the engine writing the id
            // leaves an empty sentinel.
            return CleanupOutcome::NothingToClean;
        }

        if let Err(e) = container::stop_container(self.runner.as_ref(), &container_id).await {
            tracing::debug!("stop of stale container {container_id} failed: {e}");
        }
        if let Err(e) = container::remove_container(self.runner.as_ref(), &container_id).await {
            tracing::debug!("remove of stale container {container_id} failed: {e}");
        }

        tracing::info!("reclaimed stale container {container_id}");
        CleanupOutcome::Cleaned { container_id }
    }

    async fn remove_sentinel(&self) {
        if let Err(e) = self.files.remove(&self.cidfile).await {
            tracing::debug!("failed to remove sentinel {}: {e}", self.cidfile.display());
        }
    }
}
