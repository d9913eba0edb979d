//! Configuration module
//!
//! Settings shared by every command.

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// URL of the build log server
    pub server_url: String,

    /// Namespace used when a command does not name one
    pub namespace: String,
}
