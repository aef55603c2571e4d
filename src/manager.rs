//! Container lifecycle manager: reclaim, resolve, spawn, health-confirm.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use crate::command;
use crate::config::ManagerConfig;
use crate::error::{BerthError, Result};
use crate::health::HealthReporter;
use crate::image::ImageResolver;
use crate::ops::{
    self, CommandRunner, FileStore, HttpProbe, Probe, ProcessHandle, Spawner, TokioFileStore,
    TokioRunner, TokioSpawner,
};
use crate::reclaim::Reclaimer;

/// Lifecycle notifications emitted by a [`ContainerManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Emitted exactly once per successful spawn, as soon as the engine
    /// process handle exists and before the health check runs.
    ProcessCreated {
        /// OS process id of the engine process, when known.
        pid: Option<u32>,
    },
}

/// External capabilities a [`ContainerManager`] is built on. [`Default`]
/// wires the real tokio/reqwest implementations; tests substitute stubs
/// from [`testing`](crate::testing).
#[derive(Clone)]
pub struct ManagerDeps {
    pub runner: Arc<dyn CommandRunner>,
    pub spawner: Arc<dyn Spawner>,
    pub files: Arc<dyn FileStore>,
    pub probe: Arc<dyn Probe>,
}

impl Default for ManagerDeps {
    fn default() -> Self {
        Self {
            runner: Arc::new(TokioRunner),
            spawner: Arc::new(TokioSpawner),
            files: Arc::new(TokioFileStore),
            probe: Arc::new(HttpProbe::new()),
        }
    }
}

/// Manages the lifecycle of one named container for a test harness.
///
/// `run()` reclaims anything a crashed prior run left behind, ensures the
/// image is present, spawns `docker run`, and resolves only once the
/// service answers its health check (or immediately when none is
/// configured). `stop()` kills the live process and reclaims the
/// sentinel-tracked container; it never fails.
pub struct ContainerManager {
    config: ManagerConfig,
    run_command: String,
    reclaimer: Reclaimer,
    resolver: ImageResolver,
    health: HealthReporter,
    spawner: Arc<dyn Spawner>,
    process: Mutex<Option<Box<dyn ProcessHandle>>>,
    events: broadcast::Sender<LifecycleEvent>,
}

impl std::fmt::Debug for ContainerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerManager")
            .field("config", &self.config)
            .field("run_command", &self.run_command)
            .finish_non_exhaustive()
    }
}

impl ContainerManager {
    /// Create a manager backed by the real engine CLI, filesystem, and HTTP
    /// probe.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        Self::with_deps(config, ManagerDeps::default())
    }

    /// Create a manager with injected capabilities.
    ///
    /// Validates the configuration and computes the `docker run` command
    /// once; the command never changes for the lifetime of the instance.
    pub fn with_deps(config: ManagerConfig, deps: ManagerDeps) -> Result<Self> {
        config.validate()?;

        let run_command = command::build_run_command(&config);
        let reclaimer = Reclaimer::new(config.cidfile_path(), deps.runner.clone(), deps.files);
        let resolver = ImageResolver::new(config.image.clone(), deps.runner);
        let health = HealthReporter::new(
            config.health_check_url.clone(),
            config.poll_interval,
            config.max_wait,
            deps.probe,
        );
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            config,
            run_command,
            reclaimer,
            resolver,
            health,
            spawner: deps.spawner,
            process: Mutex::new(None),
            events,
        })
    }

    /// The memoized `docker run` command line.
    pub fn docker_run_command(&self) -> &str {
        &self.run_command
    }

    /// Subscribe to lifecycle events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.events.subscribe()
    }

    /// Whether a live process handle is currently tracked.
    pub async fn is_running(&self) -> bool {
        self.process.lock().await.is_some()
    }

    /// Start the container and wait until it is confirmed healthy.
    ///
    /// Strict order: stale-resource cleanup, image resolution, spawn,
    /// health confirmation. Exactly one `docker run` is issued per call,
    /// and exactly one [`LifecycleEvent::ProcessCreated`] is emitted once
    /// the handle exists, debug or not.
    pub async fn run(&self) -> Result<()> {
        let outcome = self.reclaimer.cleanup().await;
        if self.config.debug {
            tracing::debug!("pre-run cleanup: {outcome:?}");
        }

        self.resolver.ensure_present().await?;

        if self.config.debug {
            tracing::debug!("spawning: {}", self.run_command);
        }

        let mut handle = self.spawner.spawn(&self.run_command).await.map_err(|e| {
            BerthError::SpawnFailed {
                command: self.run_command.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some(stdout) = handle.take_stdout() {
            ops::drain_stream(stdout, "stdout", self.config.debug);
        }
        if let Some(stderr) = handle.take_stderr() {
            ops::drain_stream(stderr, "stderr", self.config.debug);
        }

        let pid = handle.id();
        *self.process.lock().await = Some(handle);

        // No subscribers is fine; the send result is irrelevant.
        let _ = self.events.send(LifecycleEvent::ProcessCreated { pid });

        self.health.await_ready().await?;

        tracing::info!("container for '{}' is up", self.config.image);
        Ok(())
    }

    /// Stop the container. Never fails.
    ///
    /// Kills the live process handle if one exists (a no-op otherwise),
    /// clears it, then always runs stale-resource cleanup to remove the
    /// sentinel-tracked container.
    pub async fn stop(&self) {
        if let Some(mut handle) = self.process.lock().await.take() {
            handle.kill().await;
            tracing::debug!("killed container process for '{}'", self.config.image);
        }

        let outcome = self.reclaimer.cleanup().await;
        tracing::debug!("post-stop cleanup: {outcome:?}");
    }
}

impl Drop for ContainerManager {
    fn drop(&mut self) {
        if let Ok(guard) = self.process.try_lock()
            && guard.is_some()
        {
            tracing::warn!(
                "ContainerManager for '{}' dropped without stop(), container may remain running",
                self.config.image
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::testing::{MemoryFileStore, StubProbe, StubRunner, StubSpawner};

    struct Fixture {
        runner: Arc<StubRunner>,
        spawner: Arc<StubSpawner>,
        files: Arc<MemoryFileStore>,
        probe: Arc<StubProbe>,
    }

    impl Fixture {
        fn new(runner: StubRunner, probe: StubProbe) -> Self {
            Self {
                runner: Arc::new(runner),
                spawner: Arc::new(StubSpawner::new()),
                files: Arc::new(MemoryFileStore::new()),
                probe: Arc::new(probe),
            }
        }

        fn deps(&self) -> ManagerDeps {
            ManagerDeps {
                runner: self.runner.clone(),
                spawner: self.spawner.clone(),
                files: self.files.clone(),
                probe: self.probe.clone(),
            }
        }
    }

    fn base_config() -> ManagerConfig {
        ManagerConfig::new("my-image").cidfile("/work/my_image.cid")
    }

    #[test]
    fn test_empty_image_rejected_at_construction() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());

        let err = ContainerManager::with_deps(ManagerConfig::new(""), fixture.deps()).unwrap_err();

        assert!(matches!(err, BerthError::Config { .. }));
    }

    #[test]
    fn test_run_command_memoized_at_construction() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();

        assert_eq!(
            manager.docker_run_command(),
            "docker run --cidfile /work/my_image.cid --rm my-image"
        );
    }

    #[tokio::test]
    async fn test_run_spawns_memoized_command_once() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();

        manager.run().await.unwrap();

        assert_eq!(
            fixture.spawner.commands(),
            vec!["docker run --cidfile /work/my_image.cid --rm my-image"]
        );
        assert!(manager.is_running().await);
    }

    #[tokio::test]
    async fn test_run_pulls_only_on_cache_miss() {
        let fixture = Fixture::new(
            StubRunner::new().failing_on("docker inspect"),
            StubProbe::always(),
        );
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();

        manager.run().await.unwrap();

        assert_eq!(
            fixture.runner.calls(),
            vec!["docker inspect my-image", "docker pull my-image"]
        );
        // Pull happened before spawn.
        assert_eq!(fixture.spawner.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_run_skips_pull_when_image_present() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();

        manager.run().await.unwrap();

        assert!(
            !fixture
                .runner
                .calls()
                .iter()
                .any(|c| c.starts_with("docker pull"))
        );
    }

    #[tokio::test]
    async fn test_run_emits_exactly_one_process_created() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();
        let mut events = manager.subscribe();

        manager.run().await.unwrap();

        assert_eq!(
            events.try_recv().unwrap(),
            LifecycleEvent::ProcessCreated { pid: Some(4242) }
        );
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_reclaims_stale_container_first() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        fixture.files.insert("/work/my_image.cid", "stale123");
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();

        manager.run().await.unwrap();

        let calls = fixture.runner.calls();
        assert_eq!(
            calls,
            vec![
                "docker stop stale123",
                "docker rm stale123",
                "docker inspect my-image"
            ]
        );
        assert!(!fixture.files.contains("/work/my_image.cid"));
    }

    #[tokio::test]
    async fn test_spawn_failure_surfaces() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        let deps = ManagerDeps {
            spawner: Arc::new(StubSpawner::new().failing()),
            ..fixture.deps()
        };
        let manager = ContainerManager::with_deps(base_config(), deps).unwrap();

        let err = manager.run().await.unwrap_err();

        assert!(matches!(err, BerthError::SpawnFailed { .. }));
        assert!(!manager.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fails_when_health_never_confirms() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::never());
        let config = base_config()
            .health_check_url("http://localhost:4444/status")
            .poll_interval(Duration::from_millis(500))
            .max_wait(Duration::from_secs(15));
        let manager = ContainerManager::with_deps(config, fixture.deps()).unwrap();

        let err = manager.run().await.unwrap_err();

        assert!(matches!(err, BerthError::HealthCheckTimeout { .. }));
        // The process was spawned; health failure is a distinct, later stage.
        assert_eq!(fixture.spawner.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_stop_kills_once_and_clears_handle() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();
        manager.run().await.unwrap();
        let process = fixture.spawner.last_process().unwrap();

        manager.stop().await;

        assert_eq!(process.kill_count(), 1);
        assert!(!manager.is_running().await);
    }

    #[tokio::test]
    async fn test_stop_without_handle_is_noop_but_still_cleans() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        fixture.files.insert("/work/my_image.cid", "leftover");
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();

        manager.stop().await;

        assert_eq!(
            fixture.runner.calls(),
            vec!["docker stop leftover", "docker rm leftover"]
        );
    }

    #[tokio::test]
    async fn test_stop_twice_kills_only_once() {
        let fixture = Fixture::new(StubRunner::new(), StubProbe::always());
        let manager = ContainerManager::with_deps(base_config(), fixture.deps()).unwrap();
        manager.run().await.unwrap();
        let process = fixture.spawner.last_process().unwrap();

        manager.stop().await;
        manager.stop().await;

        assert_eq!(process.kill_count(), 1);
    }
}
