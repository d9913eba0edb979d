//! Phase Watcher
//!
//! Blocks until a queued build (New or Pending) leaves the queue.

use buildlog_core::domain::build::Build;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::repository::{BuildRepository, RepositoryError, WatchEvent};

/// Why waiting for a build did not produce an active build
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("build {0} was deleted while waiting for it to start")]
    Deleted(String),

    #[error("build {name} reported an unknown phase")]
    UnknownPhase { name: String },

    #[error("timed out waiting for build {name} to start after {waited:?}")]
    Timeout { name: String, waited: Duration },

    #[error(transparent)]
    Transport(#[from] RepositoryError),
}

/// Waits until `build` is Running, Complete, Failed, Error or Cancelled
///
/// The whole wait, including watch restarts, is bounded by one deadline
/// `timeout` from now.
///
/// # Returns
/// The first observed build snapshot that left the queued phases
pub async fn wait_until_active(
    builds: &dyn BuildRepository,
    build: &Build,
    timeout: Duration,
) -> Result<Build, WaitError> {
    let deadline = Instant::now() + timeout;

    debug!(
        "Waiting up to {:?} for build {} to leave phase {}",
        timeout,
        build.qualified_name(),
        build.phase
    );

    match tokio::time::timeout_at(deadline, watch_until_active(builds, build)).await {
        Ok(result) => result,
        Err(_) => Err(WaitError::Timeout {
            name: build.qualified_name(),
            waited: timeout,
        }),
    }
}

async fn watch_until_active(builds: &dyn BuildRepository, build: &Build) -> Result<Build, WaitError> {
    let name = build.qualified_name();

    loop {
        if builds.get_build(&build.namespace, &build.name).await?.is_none() {
            return Err(WaitError::Deleted(name));
        }

        let mut watch = match builds.watch_build(&build.namespace, &build.name, 0).await {
            Ok(watch) => watch,
            Err(e) => {
                warn!("Opening watch on build {} failed, retrying: {}", name, e);
                tokio::task::yield_now().await;
                continue;
            }
        };

        while let Some(event) = watch.next().await {
            match event {
                Ok(WatchEvent::Deleted(_)) => return Err(WaitError::Deleted(name)),
                Ok(WatchEvent::Added(observed) | WatchEvent::Modified(observed)) => {
                    if observed.phase.is_active() {
                        debug!("Build {} is now {}", name, observed.phase);
                        return Ok(observed);
                    }
                    if !observed.phase.is_queued() {
                        return Err(WaitError::UnknownPhase { name });
                    }
                }
                Err(e) => {
                    warn!("Watch on build {} failed, restarting: {}", name, e);
                    break;
                }
            }
        }

        // Closed or failed watch: start over from a fresh get
        tokio::task::yield_now().await;
    }
}
