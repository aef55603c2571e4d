//! Local image presence check and pull-on-miss.

use std::sync::Arc;

use crate::error::{BerthError, Result};
use crate::ops::CommandRunner;

/// Ensures the configured image exists locally before a run.
pub struct ImageResolver {
    image: String,
    runner: Arc<dyn CommandRunner>,
}

impl ImageResolver {
    pub fn new(image: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            image: image.into(),
            runner,
        }
    }

    /// Whether `docker inspect <image>` exits zero. Any failure counts as
    /// absent, transient inspect errors included.
    pub async fn is_present(&self) -> bool {
        self.runner
            .run(&format!("docker inspect {}", self.image))
            .await
            .is_ok()
    }

    /// Issue `docker pull <image>`. A failed pull is fatal to startup.
    pub async fn pull(&self) -> Result<()> {
        tracing::info!("pulling image: {}", self.image);
        self.runner
            .run(&format!("docker pull {}", self.image))
            .await
            .map_err(|e| BerthError::ImagePullFailed {
                image: self.image.clone(),
                reason: e.to_string(),
            })?;
        tracing::info!("pulled image: {}", self.image);
        Ok(())
    }

    /// Pull only when the image is absent locally.
    pub async fn ensure_present(&self) -> Result<()> {
        if self.is_present().await {
            tracing::debug!("image '{}' exists locally", self.image);
            return Ok(());
        }
        self.pull().await
    }
}
