//! Lifecycle management for a containerized test dependency.
//!
//! A [`ContainerManager`] starts one named Docker container (e.g. a
//! browser-automation backend), confirms it is healthy, and guarantees
//! clean teardown even across crashed prior runs. Identity is tracked
//! through a cidfile sentinel written by the engine at
//! `docker run --cidfile <path>`, so a new run can reclaim whatever a
//! previous process left behind.
//!
//! `run()` proceeds in strict order: reclaim stale resources, ensure the
//! image is present (pull on cache miss), spawn the memoized `docker run`
//! command, emit [`LifecycleEvent::ProcessCreated`], then poll the optional
//! readiness endpoint with bounded retries before resolving. `stop()` kills
//! the live process, then reclaims the sentinel-tracked container; it never
//! fails.
//!
//! All engine, filesystem, and network access goes through the capability
//! traits in [`ops`], so tests substitute the stubs in [`testing`] instead
//! of monkey-patching.
//!
//! # Example
//!
//! ```rust,no_run
//! use berth::{ContainerManager, ManagerConfig};
//!
//! # async fn example() -> berth::Result<()> {
//! let config = ManagerConfig::new("selenium/standalone-chrome")
//!     .switch("d")
//!     .option("p", vec!["4444:4444".to_string()])
//!     .option("shm-size", "2g")
//!     .health_check_url("http://localhost:4444/wd/hub/status");
//!
//! let manager = ContainerManager::new(config)?;
//!
//! // Resolves once the service answers its health check.
//! manager.run().await?;
//!
//! // ... drive the test suite against the container ...
//!
//! manager.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod command;
pub mod config;
pub mod container;
pub mod error;
pub mod health;
pub mod image;
pub mod manager;
pub mod ops;
pub mod reclaim;
pub mod testing;

pub use config::{ManagerConfig, OptionValue};
pub use error::{BerthError, Result};
pub use health::HealthReporter;
pub use image::ImageResolver;
pub use manager::{ContainerManager, LifecycleEvent, ManagerDeps};
pub use reclaim::{CleanupOutcome, Reclaimer};
