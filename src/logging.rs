//! Progress log sink
//!
//! Launch operations narrate what they did into a sink owned by the job
//! driver. Lines are free text, written once and never read back by this
//! crate — telemetry proper goes through `tracing` instead.

/// Fire-and-forget sink for human-readable progress lines
#[cfg_attr(test, mockall::automock)]
pub trait LogSink: Send {
    fn append(&mut self, message: &str);

    /// Hand buffered lines to wherever the sink keeps them
    fn flush(&mut self);
}

/// Sink that forwards every line straight to `tracing`
#[derive(Debug, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn append(&mut self, message: &str) {
        tracing::info!(target: "batchfleet::joblog", "{}", message);
    }

    fn flush(&mut self) {}
}

/// Sink that buffers lines in memory until flushed
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

impl LogSink for MemorySink {
    fn append(&mut self, message: &str) {
        self.lines.push(message.to_string());
    }

    fn flush(&mut self) {
        if !self.lines.is_empty() {
            tracing::info!(target: "batchfleet::joblog", "{}", self.lines.join("\n"));
        }
    }
}
