//! Core domain types
//!
//! Builds and execution units are read-only snapshots from the point of view
//! of the log pipeline. They are produced by a registry (in-memory, or any
//! other backing store) and never mutated by the consumers of this crate.

pub mod build;
pub mod unit;
