//! Data Transfer Objects
//!
//! This module contains DTOs exchanged between the build log server and its
//! callers (HTTP clients, the CLI) and between the server and log sources.

pub mod log;
