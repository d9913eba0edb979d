//! Service Module
//!
//! Business logic layer for the server.
//! The build log service drives the phase watcher and the step selector over
//! the repositories.

pub mod build_log;
pub mod metrics;
pub mod phase_watcher;
pub mod steps;

pub use build_log::{BuildLogError, BuildLogService, StreamSettings};
