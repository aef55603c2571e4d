//! Container control operations by id.
//!
//! Pure passthroughs to the command-execution capability. No retry here;
//! retry and backoff, if any, belong to callers.

use std::io;

use crate::ops::CommandRunner;

/// Issue `docker stop <id>`.
pub async fn stop_container(runner: &dyn CommandRunner, id: &str) -> io::Result<String> {
    runner.run(&format!("docker stop {id}")).await
}

/// Issue `docker rm <id>`.
pub async fn remove_container(runner: &dyn CommandRunner, id: &str) -> io::Result<String> {
    runner.run(&format!("docker rm {id}")).await
}
