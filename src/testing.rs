//! Stub capability implementations for tests.
//!
//! The manager takes its collaborators behind the [`ops`](crate::ops) trait
//! seams, so a test wires these in instead of monkey-patching:
//!
//! - [`StubRunner`]: records every command, fails on configured prefixes
//! - [`StubSpawner`] / [`StubProcessState`]: spawn and kill counting
//! - [`MemoryFileStore`]: in-memory sentinel files, removal counting
//! - [`StubProbe`]: scripted reachability with an attempt counter
//!
//! All state is observable after the fact; use these instead of creating
//! ad-hoc stub implementations per test.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::ops::{CommandRunner, FileStore, OutputStream, Probe, ProcessHandle, Spawner};

/// A [`CommandRunner`] that records every invocation and succeeds with empty
/// output unless the command matches a configured failure prefix.
#[derive(Default)]
pub struct StubRunner {
    fail_prefixes: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl StubRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any command starting with `prefix`.
    pub fn failing_on(mut self, prefix: &str) -> Self {
        self.fail_prefixes.push(prefix.to_string());
        self
    }

    /// Every command run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for StubRunner {
    async fn run(&self, command: &str) -> io::Result<String> {
        self.calls.lock().unwrap().push(command.to_string());
        if self
            .fail_prefixes
            .iter()
            .any(|p| command.starts_with(p.as_str()))
        {
            Err(io::Error::other(format!("stubbed failure for '{command}'")))
        } else {
            Ok(String::new())
        }
    }
}

/// Observable state shared between a [`StubSpawner`] and the handles it
/// produced.
#[derive(Default)]
pub struct StubProcessState {
    kill_count: AtomicU32,
}

impl StubProcessState {
    /// How many times `kill()` was invoked on the handle.
    pub fn kill_count(&self) -> u32 {
        self.kill_count.load(Ordering::SeqCst)
    }
}

struct StubProcess {
    state: Arc<StubProcessState>,
    stdout: Option<OutputStream>,
    stderr: Option<OutputStream>,
}

#[async_trait]
impl ProcessHandle for StubProcess {
    fn id(&self) -> Option<u32> {
        Some(4242)
    }

    fn take_stdout(&mut self) -> Option<OutputStream> {
        self.stdout.take()
    }

    fn take_stderr(&mut self) -> Option<OutputStream> {
        self.stderr.take()
    }

    async fn kill(&mut self) {
        self.state.kill_count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A [`Spawner`] that hands out inert process handles and records every
/// spawned command.
#[derive(Default)]
pub struct StubSpawner {
    fail: bool,
    commands: Mutex<Vec<String>>,
    last_process: Mutex<Option<Arc<StubProcessState>>>,
}

impl StubSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every spawn attempt fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Every command spawned so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Shared state of the most recently spawned process.
    pub fn last_process(&self) -> Option<Arc<StubProcessState>> {
        self.last_process.lock().unwrap().clone()
    }
}

#[async_trait]
impl Spawner for StubSpawner {
    async fn spawn(&self, command: &str) -> io::Result<Box<dyn ProcessHandle>> {
        self.commands.lock().unwrap().push(command.to_string());
        if self.fail {
            return Err(io::Error::other("stubbed spawn failure"));
        }
        let state = Arc::new(StubProcessState::default());
        *self.last_process.lock().unwrap() = Some(state.clone());
        Ok(Box::new(StubProcess {
            state,
            stdout: Some(Box::new(tokio::io::empty())),
            stderr: Some(Box::new(tokio::io::empty())),
        }))
    }
}

/// An in-memory [`FileStore`] counting removal attempts.
#[derive(Default)]
pub struct MemoryFileStore {
    files: Mutex<HashMap<PathBuf, String>>,
    removals: AtomicU32,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<PathBuf>, contents: impl Into<String>) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), contents.into());
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.files.lock().unwrap().contains_key(path.as_ref())
    }

    /// How many removal attempts were made, including for absent paths.
    pub fn removals(&self) -> u32 {
        self.removals.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FileStore for MemoryFileStore {
    async fn read_to_string(&self, path: &Path) -> io::Result<String> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such file"))
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        self.files.lock().unwrap().remove(path);
        Ok(())
    }
}

/// A [`Probe`] that succeeds from the nth attempt onward.
pub struct StubProbe {
    succeed_from: Option<u32>,
    attempts: AtomicU32,
}

impl StubProbe {
    /// Succeed on every attempt.
    pub fn always() -> Self {
        Self::succeed_after(1)
    }

    /// Never succeed.
    pub fn never() -> Self {
        Self {
            succeed_from: None,
            attempts: AtomicU32::new(0),
        }
    }

    /// Fail the first `n - 1` attempts, succeed from the nth on.
    pub fn succeed_after(n: u32) -> Self {
        Self {
            succeed_from: Some(n),
            attempts: AtomicU32::new(0),
        }
    }

    /// How many times `ping` was invoked.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Probe for StubProbe {
    async fn ping(&self, _url: &str) -> io::Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        match self.succeed_from {
            Some(n) if attempt >= n => Ok(()),
            _ => Err(io::Error::other("stubbed unreachable")),
        }
    }
}
