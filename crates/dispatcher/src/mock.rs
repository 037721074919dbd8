//! Recording sink used by the dispatcher unit tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use contracts::{ContractError, FieldValue, Message, Sink};

#[derive(Debug, Default)]
pub struct Probe {
    writes: AtomicU64,
    failures: AtomicU64,
    flushes: AtomicU64,
    closes: AtomicU64,
    seen: Mutex<Vec<i64>>,
}

impl Probe {
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::SeqCst)
    }

    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::SeqCst)
    }

    /// `seq` field of every accepted message, in arrival order
    pub fn seen(&self) -> Vec<i64> {
        self.seen.lock().unwrap().clone()
    }
}

pub struct MockSink {
    name: String,
    probe: Arc<Probe>,
    fail: bool,
    delay: Option<Duration>,
}

impl MockSink {
    pub fn new(name: &str) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let sink = Self::with_probe(name, Arc::clone(&probe), false, None);
        (sink, probe)
    }

    /// Sink reporting into an existing probe
    pub fn with_probe(
        name: &str,
        probe: Arc<Probe>,
        fail: bool,
        delay: Option<Duration>,
    ) -> Self {
        Self {
            name: name.to_string(),
            probe,
            fail,
            delay,
        }
    }

    pub fn failing(name: &str) -> (Self, Arc<Probe>) {
        let (mut sink, probe) = Self::new(name);
        sink.fail = true;
        (sink, probe)
    }
}

impl Sink for MockSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, msg: &Message) -> Result<(), ContractError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            self.probe.failures.fetch_add(1, Ordering::SeqCst);
            return Err(ContractError::sink_write(&self.name, "mock failure"));
        }
        self.probe.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(seq) = msg.get_field("seq").and_then(|v| v.as_i64()) {
            self.probe.seen.lock().unwrap().push(seq);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.probe.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Metric message carrying a `seq` field
pub fn sample_message(seq: i64) -> Message {
    Message::new(
        "test_metric",
        [("host", "n1")],
        [("unit", "1")],
        [("value", FieldValue::Float(1.5)), ("seq", FieldValue::Int(seq))],
        Utc.timestamp_nanos(1_700_000_000_000_000_000 + seq),
    )
    .unwrap()
}
