//! Buildlog Core
//!
//! Core types and conventions shared by the build log server, client and CLI.
//!
//! This crate contains:
//! - Domain types: builds, execution units and their steps
//! - DTOs: build log options and per-step log requests
//! - Naming: deterministic naming conventions between builds and units

pub mod domain;
pub mod dto;
pub mod naming;
