//! SinkHandle - a registered sink together with its delivery counters

use std::sync::Arc;

use contracts::{BoxedSink, Message};
use observability::record_message_dispatched;
use tracing::{debug, error, instrument};

use crate::metrics::SinkMetrics;

/// Registry entry owned by the sink manager
pub struct SinkHandle {
    /// Name the sink was registered under
    name: String,
    /// Value of the `type` discriminator it was built from
    sink_type: String,
    sink: BoxedSink,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
}

impl SinkHandle {
    pub fn new(name: impl Into<String>, sink_type: impl Into<String>, sink: BoxedSink) -> Self {
        Self {
            name: name.into(),
            sink_type: sink_type.into(),
            sink,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sink_type(&self) -> &str {
        &self.sink_type
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Write one message, absorbing the error
    ///
    /// Returns true if the sink accepted the message.
    pub async fn write(&mut self, msg: &Message) -> bool {
        match self.sink.write(msg).await {
            Ok(()) => {
                self.metrics.inc_write_count();
                record_message_dispatched(&self.name, true);
                true
            }
            Err(e) => {
                self.metrics.inc_failure_count();
                record_message_dispatched(&self.name, false);
                error!(
                    sink = %self.name,
                    measurement = %msg.name(),
                    error = %e,
                    "Write failed"
                );
                false
            }
        }
    }

    /// Flush then close the sink; consumes the handle so close runs once
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(mut self) {
        if let Err(e) = self.sink.flush().await {
            self.metrics.inc_flush_failure_count();
            error!(sink = %self.name, error = %e, "Flush failed on shutdown");
        }
        self.sink.close().await;
        debug!(sink = %self.name, "Sink closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{sample_message, MockSink};

    #[tokio::test]
    async fn test_handle_counts_writes() {
        let (sink, probe) = MockSink::new("ok");
        let mut handle = SinkHandle::new("ok", "mock", Box::new(sink));

        for i in 0..5 {
            assert!(handle.write(&sample_message(i)).await);
        }

        assert_eq!(handle.metrics().write_count(), 5);
        assert_eq!(handle.metrics().failure_count(), 0);
        assert_eq!(probe.writes(), 5);
    }

    #[tokio::test]
    async fn test_handle_failure_isolation() {
        let (sink, probe) = MockSink::failing("bad");
        let mut handle = SinkHandle::new("bad", "mock", Box::new(sink));

        for i in 0..3 {
            assert!(!handle.write(&sample_message(i)).await);
        }

        assert_eq!(handle.metrics().failure_count(), 3);
        assert_eq!(probe.failures(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_then_closes_once() {
        let (sink, probe) = MockSink::new("s");
        let handle = SinkHandle::new("s", "mock", Box::new(sink));
        assert_eq!(handle.sink_type(), "mock");

        handle.shutdown().await;

        assert_eq!(probe.flushes(), 1);
        assert_eq!(probe.closes(), 1);
    }
}
