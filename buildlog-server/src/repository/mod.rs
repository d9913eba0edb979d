//! Repository Module
//!
//! Data access layer for the server.
//! Builds and execution units come from a registry, raw step logs come from a
//! log source. Both sit behind traits so the log pipeline can be driven by the
//! in-memory implementations in tests and by real backends in production.

pub mod log;
pub mod memory;
pub mod podman;

use async_trait::async_trait;
use buildlog_core::domain::build::Build;
use buildlog_core::domain::unit::ExecutionUnit;
use futures::stream::BoxStream;
use thiserror::Error;

pub use log::{LogSource, LogStream, MemoryLogSource};
pub use memory::MemoryRegistry;
pub use podman::PodmanLogSource;

/// Result type alias for repository operations
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Errors raised by registries and log sources
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The backing store could not be reached or answered with an error
    #[error("transport error: {0}")]
    Transport(String),

    /// A watch fell too far behind and must be reopened
    #[error("watch expired: {0}")]
    WatchExpired(String),

    /// The requested step has no log output yet
    #[error("no logs available for step {step} of {unit}")]
    LogNotFound { unit: String, step: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Change notification for a watched object
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
    Added(T),
    Modified(T),
    Deleted(T),
}

impl<T> WatchEvent<T> {
    /// The object carried by the event
    pub fn object(&self) -> &T {
        match self {
            WatchEvent::Added(obj) | WatchEvent::Modified(obj) | WatchEvent::Deleted(obj) => obj,
        }
    }
}

/// Stream of build changes, as returned by [`BuildRepository::watch_build`]
pub type BuildWatch = BoxStream<'static, Result<WatchEvent<Build>>>;

/// Read access to builds
#[async_trait]
pub trait BuildRepository: Send + Sync {
    /// Fetches a build by identity
    ///
    /// # Returns
    /// `None` when the build does not exist
    async fn get_build(&self, namespace: &str, name: &str) -> Result<Option<Build>>;

    /// Watches a single build
    ///
    /// Every event with a resource version greater than `from_version` is
    /// delivered. With `from_version == 0` the current state of the build is
    /// replayed first as an `Added` event.
    async fn watch_build(&self, namespace: &str, name: &str, from_version: u64)
    -> Result<BuildWatch>;
}

/// Read access to execution units
#[async_trait]
pub trait ExecutionUnitRepository: Send + Sync {
    /// Fetches an execution unit by identity
    ///
    /// # Returns
    /// `None` when the unit does not exist
    async fn get_unit(&self, namespace: &str, name: &str) -> Result<Option<ExecutionUnit>>;
}
