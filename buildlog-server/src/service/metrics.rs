//! Log pipeline metrics
//!
//! The log service reports what happens to each request through an injected
//! recorder instead of process-wide counters.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Events emitted by the log pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEvent {
    /// A build log request was accepted for processing
    Requested,
    /// A queued build was answered with an empty stream
    EmptyNoWait,
    /// The request started waiting for a queued build
    WaitStarted,
    /// Waiting for a queued build hit the deadline
    WaitTimedOut,
    /// One step log was copied into the response
    StepStreamed,
    /// An init step failed, so the main step is skipped
    InitStepFailed,
    /// The aggregated stream was cut short by an error
    StreamTruncated,
    /// The aggregated stream ended normally
    StreamCompleted,
}

/// Receives log pipeline events
pub trait LogMetrics: Send + Sync {
    fn record(&self, event: LogEvent);
}

/// Recorder that turns events into debug traces
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMetrics;

impl LogMetrics for TracingMetrics {
    fn record(&self, event: LogEvent) {
        debug!(target: "buildlog_server::metrics", ?event, "build log event");
    }
}

/// Recorder keeping a counter per event
#[derive(Debug, Default)]
pub struct CountingMetrics {
    requested: AtomicU64,
    empty_no_wait: AtomicU64,
    wait_started: AtomicU64,
    wait_timed_out: AtomicU64,
    step_streamed: AtomicU64,
    init_step_failed: AtomicU64,
    stream_truncated: AtomicU64,
    stream_completed: AtomicU64,
}

impl CountingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, event: LogEvent) -> &AtomicU64 {
        match event {
            LogEvent::Requested => &self.requested,
            LogEvent::EmptyNoWait => &self.empty_no_wait,
            LogEvent::WaitStarted => &self.wait_started,
            LogEvent::WaitTimedOut => &self.wait_timed_out,
            LogEvent::StepStreamed => &self.step_streamed,
            LogEvent::InitStepFailed => &self.init_step_failed,
            LogEvent::StreamTruncated => &self.stream_truncated,
            LogEvent::StreamCompleted => &self.stream_completed,
        }
    }

    /// Number of times `event` was recorded
    pub fn count(&self, event: LogEvent) -> u64 {
        self.counter(event).load(Ordering::Relaxed)
    }
}

impl LogMetrics for CountingMetrics {
    fn record(&self, event: LogEvent) {
        self.counter(event).fetch_add(1, Ordering::Relaxed);
    }
}
