//! Capability contracts for the outside world, with tokio-backed defaults.
//!
//! The manager never talks to the engine, the filesystem, or the network
//! directly; everything goes through these seams so tests can substitute
//! fakes without monkey-patching. The [`testing`](crate::testing) module
//! provides ready-made stubs.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};

/// Boxed output stream of a spawned process.
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Runs a command to completion.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion. Resolves with captured stdout on a zero
    /// exit status, fails otherwise.
    async fn run(&self, command: &str) -> io::Result<String>;
}

/// Handle to a live spawned process.
#[async_trait]
pub trait ProcessHandle: Send {
    /// OS process id, if the process is still live.
    fn id(&self) -> Option<u32>;

    /// Take ownership of the stdout stream. Returns `None` once taken.
    fn take_stdout(&mut self) -> Option<OutputStream>;

    /// Take ownership of the stderr stream. Returns `None` once taken.
    fn take_stderr(&mut self) -> Option<OutputStream>;

    /// Signal termination. Best-effort: the process may already be gone.
    async fn kill(&mut self);
}

/// Spawns a long-lived process from a full command line.
#[async_trait]
pub trait Spawner: Send + Sync {
    async fn spawn(&self, command: &str) -> io::Result<Box<dyn ProcessHandle>>;
}

/// Filesystem access for the sentinel file.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Remove `path`. Succeeds when the path is already absent.
    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// Reachability probe for the health check.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Resolves when `url` is reachable, fails otherwise.
    async fn ping(&self, url: &str) -> io::Result<()>;
}

fn split_command(command: &str) -> io::Result<(&str, std::str::SplitWhitespace<'_>)> {
    let mut parts = command.split_whitespace();
    let program = parts
        .next()
        .ok_or_else(|| io::Error::other("empty command"))?;
    Ok((program, parts))
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, command: &str) -> io::Result<String> {
        let (program, args) = split_command(command)?;
        let output = Command::new(program).args(args).output().await?;
        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(io::Error::other(format!(
                "'{command}' failed with {}: {}",
                output.status,
                stderr.trim()
            )))
        }
    }
}

/// [`Spawner`] backed by `tokio::process`, with piped stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSpawner;

#[async_trait]
impl Spawner for TokioSpawner {
    async fn spawn(&self, command: &str) -> io::Result<Box<dyn ProcessHandle>> {
        let (program, args) = split_command(command)?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(Box::new(TokioProcess { child }))
    }
}

struct TokioProcess {
    child: Child,
}

#[async_trait]
impl ProcessHandle for TokioProcess {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.child.stdout.take().map(|s| Box::new(s) as OutputStream)
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.child.stderr.take().map(|s| Box::new(s) as OutputStream)
    }

    async fn kill(&mut self) {
        if let Err(e) = self.child.kill().await {
            tracing::debug!("kill failed, process may have already exited: {e}");
        }
    }
}

/// [`FileStore`] backed by `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFileStore;

#[async_trait]
impl FileStore for TokioFileStore {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        match tokio::fs::remove_file(path).await {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// HTTP [`Probe`] backed by `reqwest`. A 2xx response is reachable,
/// everything else is not.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn ping(&self, url: &str) -> io::Result<()> {
        let response = self.client.get(url).send().await.map_err(io::Error::other)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("status {}", response.status())))
        }
    }
}

/// Drain `stream` line by line, re-emitting each line as a tracing event
/// when `log` is set. A full unconsumed pipe stalls the child, so draining
/// happens whether or not the lines are logged.
pub(crate) fn drain_stream(
    stream: OutputStream,
    label: &'static str,
    log: bool,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if log {
                tracing::debug!(target: "berth::container", "{label}: {line}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_runner_captures_stdout() {
        let output = TokioRunner.run("echo hello").await.unwrap();

        assert_eq!(output.trim(), "hello");
    }

    #[tokio::test]
    async fn test_runner_fails_on_nonzero_exit() {
        let err = TokioRunner.run("false").await.unwrap_err();

        assert!(err.to_string().contains("failed"));
    }

    #[tokio::test]
    async fn test_runner_rejects_empty_command() {
        assert!(TokioRunner.run("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_file_store_remove_tolerates_absence() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.cid");

        assert!(TokioFileStore.remove(&missing).await.is_ok());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.cid");
        tokio::fs::write(&path, "abc123").await.unwrap();

        assert_eq!(TokioFileStore.read_to_string(&path).await.unwrap(), "abc123");
        TokioFileStore.remove(&path).await.unwrap();
        assert!(TokioFileStore.read_to_string(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_spawner_exposes_streams_and_kill() {
        let mut handle = TokioSpawner.spawn("sleep 30").await.unwrap();

        assert!(handle.id().is_some());
        assert!(handle.take_stdout().is_some());
        assert!(handle.take_stdout().is_none());
        assert!(handle.take_stderr().is_some());
        handle.kill().await;
    }
}
