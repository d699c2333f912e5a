//! Diagnostic log sinks for scheduler and static-evaluation traces.
//!
//! Lines are only produced when [`SimConfig::log`](crate::SimConfig::log) is
//! set (scheduler) or a sink is passed explicitly (static evaluation).

use pulse_common::SimTime;
use std::sync::{Arc, Mutex, MutexGuard};

/// Receives one diagnostic line per update or evaluation.
pub trait LogSink {
    /// Records `message`, emitted at virtual time `time`.
    fn log(&mut self, time: SimTime, message: &str);
}

/// Forwards lines to the `tracing` subscriber at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn log(&mut self, time: SimTime, message: &str) {
        tracing::debug!(target: "pulse_sim", time_ps = time.as_ps(), "{message}");
    }
}

/// Collects lines in memory as `"<ps>: <message>"`.
///
/// Clones share the same buffer, so a caller can keep one handle and give
/// the other to a scheduler.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    /// Creates a new empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every line logged so far.
    pub fn lines(&self) -> Vec<String> {
        self.buffer().clone()
    }

    /// Takes all accumulated lines, leaving the sink empty.
    pub fn take_all(&self) -> Vec<String> {
        std::mem::take(&mut *self.buffer())
    }

    /// Returns the number of lines logged so far.
    pub fn len(&self) -> usize {
        self.buffer().len()
    }

    /// Returns `true` if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.buffer().is_empty()
    }

    fn buffer(&self) -> MutexGuard<'_, Vec<String>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemorySink {
    fn log(&mut self, time: SimTime, message: &str) {
        self.buffer().push(format!("{}: {message}", time.as_ps()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_formats_time() {
        let mut sink = MemorySink::new();
        sink.log(SimTime::from_ns(1), "a <= 1");
        assert_eq!(sink.lines(), vec!["1000: a <= 1".to_string()]);
    }

    #[test]
    fn clones_share_buffer() {
        let sink = MemorySink::new();
        let mut handle = sink.clone();
        handle.log(SimTime::zero(), "x");
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.take_all().len(), 1);
        assert!(handle.is_empty());
    }

    #[test]
    fn tracing_sink_is_silent_without_subscriber() {
        let mut sink = TracingSink;
        sink.log(SimTime::from_ps(5), "no subscriber installed");
    }
}
