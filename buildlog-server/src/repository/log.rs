//! Log sources
//!
//! A log source turns a [`LogRequest`] for one step of an execution unit into
//! a byte stream of that step's output.

use async_trait::async_trait;
use buildlog_core::dto::log::LogRequest;
use std::collections::HashMap;
use std::io::Cursor;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::RwLock;

use super::{RepositoryError, Result};

/// Raw byte stream of a step log
pub type LogStream = Pin<Box<dyn AsyncRead + Send>>;

/// Source of raw step logs
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Opens the log of one step
    ///
    /// With `request.follow` the stream stays open until the step stops
    /// producing output. Fails when the step has no log yet.
    async fn open(&self, request: &LogRequest) -> Result<LogStream>;
}

/// Caps a stream at `limit_bytes`, when set
pub fn limit_stream(stream: LogStream, limit_bytes: Option<i64>) -> LogStream {
    match limit_bytes {
        Some(limit) if limit > 0 => Box::pin(stream.take(limit as u64)) as LogStream,
        _ => stream,
    }
}

/// Log source holding step logs in memory
///
/// Logs are appended through [`MemoryLogSource::append`]. Opening a step
/// returns a snapshot of what has been appended so far; `follow` has no
/// effect because nothing is produced behind the caller's back.
#[derive(Default)]
pub struct MemoryLogSource {
    logs: RwLock<HashMap<(String, String, String), Vec<u8>>>,
}

impl MemoryLogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends output to the log of a step, creating it if needed
    pub async fn append(&self, namespace: &str, unit: &str, step: &str, bytes: &[u8]) {
        let mut logs = self.logs.write().await;
        logs.entry((namespace.to_string(), unit.to_string(), step.to_string()))
            .or_default()
            .extend_from_slice(bytes);
    }
}

#[async_trait]
impl LogSource for MemoryLogSource {
    async fn open(&self, request: &LogRequest) -> Result<LogStream> {
        let logs = self.logs.read().await;
        let key = (
            request.namespace.clone(),
            request.unit.clone(),
            request.step.clone(),
        );

        let bytes = logs
            .get(&key)
            .ok_or_else(|| RepositoryError::LogNotFound {
                unit: format!("{}/{}", request.namespace, request.unit),
                step: request.step.clone(),
            })?;

        let bytes = match request.tail_lines {
            Some(tail) if tail >= 0 => tail_lines(bytes, tail as usize),
            _ => bytes.clone(),
        };

        Ok(limit_stream(
            Box::pin(Cursor::new(bytes)),
            request.limit_bytes,
        ))
    }
}

/// Last `n` lines of `bytes`, keeping the trailing newline if present
fn tail_lines(bytes: &[u8], n: usize) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }

    let body = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    let start = body
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, b)| **b == b'\n')
        .nth(n - 1)
        .map(|(i, _)| i + 1)
        .unwrap_or(0);

    bytes[start..].to_vec()
}
