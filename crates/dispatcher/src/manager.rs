//! SinkManager - fans inbound messages out to every registered sink
//!
//! Lifecycle: `new` → `init`/`add_output` → `add_input` → `start` → `close`.
//!
//! Exactly one background task performs all sink writes. For each wake-up it
//! forwards one message to every sink in turn, then drains up to
//! `max_forward` further messages that are already queued before waiting
//! again. A failed write is logged and counted; the sink stays registered.

use std::collections::BTreeMap;
use std::sync::Arc;

use contracts::{Message, SINK_MAX_FORWARD};
use observability::{record_active_sinks, record_dispatch_batch, record_message_received};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::registry::{sink_type_of, SinkRegistry};

type SharedSinks = Arc<Mutex<BTreeMap<String, SinkHandle>>>;

/// How the background task treats messages still queued at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownMode {
    /// Close the sinks right away; queued messages are not forwarded
    Immediate,
    /// Forward what is already queued, then close the sinks
    Drain,
}

struct Running {
    shutdown_tx: oneshot::Sender<ShutdownMode>,
    task: JoinHandle<()>,
}

/// Dispatch manager owning the sink set and the inbound queue
pub struct SinkManager {
    registry: SinkRegistry,
    sinks: SharedSinks,
    input: Option<mpsc::Receiver<Message>>,
    max_forward: usize,
    running: Option<Running>,
}

impl SinkManager {
    /// Uninitialized manager bound to `registry`
    pub fn new(registry: SinkRegistry) -> Self {
        Self {
            registry,
            sinks: Arc::new(Mutex::new(BTreeMap::new())),
            input: None,
            max_forward: SINK_MAX_FORWARD,
            running: None,
        }
    }

    /// `new` followed by `init`
    pub async fn from_config(
        registry: SinkRegistry,
        configs: &Value,
    ) -> Result<Self, DispatcherError> {
        let manager = Self::new(registry);
        manager.init(configs).await?;
        Ok(manager)
    }

    /// Override the per-wake-up drain limit (default [`SINK_MAX_FORWARD`])
    pub fn with_max_forward(mut self, max_forward: usize) -> Self {
        self.max_forward = max_forward;
        self
    }

    pub fn max_forward(&self) -> usize {
        self.max_forward
    }

    pub fn registry(&self) -> &SinkRegistry {
        &self.registry
    }

    /// Register every sink in `configs` (an object of name → config blob)
    ///
    /// Entries that fail to construct are logged and skipped.
    ///
    /// # Errors
    /// - `InvalidConfig` if `configs` is not an object
    /// - `NoUsableSinks` if no sink is registered afterwards
    #[instrument(name = "sink_manager_init", skip(self, configs))]
    pub async fn init(&self, configs: &Value) -> Result<(), DispatcherError> {
        let entries = configs.as_object().ok_or_else(|| {
            DispatcherError::invalid_config("sinks must be an object of name -> config")
        })?;

        for (name, config) in entries {
            if let Err(e) = self.add_output(name, config).await {
                error!(sink = %name, error = %e, "Skipping sink");
            }
        }

        let count = self.sinks.lock().await.len();
        if count == 0 {
            error!("Found no usable sinks");
            return Err(DispatcherError::NoUsableSinks);
        }
        info!(sinks = count, "Sink manager initialized");
        Ok(())
    }

    /// Construct one sink and register it under `name`
    ///
    /// Usable before and after `start`; after start the new sink takes part
    /// from the next wake-up on. An existing entry with the same name is
    /// replaced without being closed.
    #[instrument(name = "sink_manager_add_output", skip(self, config))]
    pub async fn add_output(&self, name: &str, config: &Value) -> Result<(), DispatcherError> {
        let sink = self.registry.construct(name, config).await?;
        let sink_type = sink_type_of(config).unwrap_or_default();
        let handle = SinkHandle::new(name, sink_type, sink);

        let mut sinks = self.sinks.lock().await;
        if sinks.insert(name.to_string(), handle).is_some() {
            warn!(sink = %name, "Replaced existing sink; the previous instance was not closed");
        }
        record_active_sinks(sinks.len());
        debug!(sink = %name, sink_type, "Sink added");
        Ok(())
    }

    /// Bind the inbound queue; only effective before `start`
    pub fn add_input(&mut self, input: mpsc::Receiver<Message>) {
        if self.running.is_some() {
            warn!("Sink manager already running, input ignored");
            return;
        }
        if self.input.replace(input).is_some() {
            debug!("Replaced previously bound input");
        }
    }

    /// Spawn the background consumer and return immediately
    ///
    /// Must be called from within a tokio runtime. A second call is a no-op.
    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("Sink manager already started");
            return;
        }
        if self.input.is_none() {
            warn!("Sink manager started without input");
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let dispatch = DispatchLoop {
            sinks: Arc::clone(&self.sinks),
            input: self.input.take(),
            shutdown_rx,
            max_forward: self.max_forward,
        };
        let task = tokio::spawn(dispatch.run());
        self.running = Some(Running { shutdown_tx, task });
        debug!("Sink manager started");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Stop the background task and close every sink
    ///
    /// Blocks until each sink has been flushed and closed. Messages still
    /// queued are not forwarded. There is no timeout; wrap the call in
    /// `tokio::time::timeout` if a sink may hang.
    #[instrument(name = "sink_manager_close", skip(self))]
    pub async fn close(self) {
        self.shutdown(ShutdownMode::Immediate).await;
    }

    /// Like [`close`](Self::close), but first forwards every message already
    /// in the inbound queue.
    #[instrument(name = "sink_manager_drain_and_close", skip(self))]
    pub async fn drain_and_close(self) {
        self.shutdown(ShutdownMode::Drain).await;
    }

    async fn shutdown(self, mode: ShutdownMode) {
        match self.running {
            Some(Running { shutdown_tx, task }) => {
                if shutdown_tx.send(mode).is_err() {
                    warn!("Dispatch task already gone");
                }
                if let Err(e) = task.await {
                    error!(error = ?e, "Dispatch task panicked");
                }
            }
            None => {
                let mut dispatch = DispatchLoop {
                    sinks: self.sinks,
                    input: self.input,
                    shutdown_rx: oneshot::channel().1,
                    max_forward: self.max_forward,
                };
                if mode == ShutdownMode::Drain {
                    dispatch.drain_pending().await;
                }
                dispatch.close_sinks().await;
            }
        }
        info!("Sink manager closed");
    }

    /// Registered sink names, sorted
    pub async fn sink_names(&self) -> Vec<String> {
        self.sinks.lock().await.keys().cloned().collect()
    }

    /// Per-sink `(name, type, counters)`, sorted by name
    pub async fn metrics(&self) -> Vec<(String, String, MetricsSnapshot)> {
        self.sinks
            .lock()
            .await
            .values()
            .map(|h| {
                (
                    h.name().to_string(),
                    h.sink_type().to_string(),
                    h.metrics().snapshot(),
                )
            })
            .collect()
    }

    /// Shared per-sink counters, sorted by name
    ///
    /// The handles stay live after `close`, so a caller can read the final
    /// counts once every queued message has been forwarded.
    pub async fn metric_handles(&self) -> Vec<(String, String, Arc<SinkMetrics>)> {
        self.sinks
            .lock()
            .await
            .values()
            .map(|h| {
                (
                    h.name().to_string(),
                    h.sink_type().to_string(),
                    Arc::clone(h.metrics()),
                )
            })
            .collect()
    }
}

enum Wake {
    Shutdown(ShutdownMode),
    Message(Message),
    InputClosed,
}

/// State moved into the background task
struct DispatchLoop {
    sinks: SharedSinks,
    input: Option<mpsc::Receiver<Message>>,
    shutdown_rx: oneshot::Receiver<ShutdownMode>,
    max_forward: usize,
}

impl DispatchLoop {
    #[instrument(name = "sink_manager_loop", skip(self), fields(max_forward = self.max_forward))]
    async fn run(mut self) {
        info!("Dispatch loop started");
        let mut forwarded: u64 = 0;

        loop {
            let wake = tokio::select! {
                biased;
                mode = &mut self.shutdown_rx => {
                    // sender dropped without close(): stop right away
                    Wake::Shutdown(mode.unwrap_or(ShutdownMode::Immediate))
                }
                msg = next_message(&mut self.input) => match msg {
                    Some(msg) => Wake::Message(msg),
                    None => Wake::InputClosed,
                },
            };

            match wake {
                Wake::Shutdown(mode) => {
                    if mode == ShutdownMode::Drain {
                        forwarded += self.drain_pending().await;
                    }
                    break;
                }
                Wake::Message(first) => {
                    forwarded += self.forward_batch(first).await;
                }
                Wake::InputClosed => {
                    info!(messages = forwarded, "Input closed, waiting for shutdown");
                    self.input = None;
                }
            }
        }

        self.close_sinks().await;
        info!(messages = forwarded, "Dispatch loop stopped");
    }

    /// Forward `first` plus up to `max_forward` already-queued messages
    async fn forward_batch(&mut self, first: Message) -> u64 {
        let mut sinks = self.sinks.lock().await;
        forward(&mut sinks, &first).await;

        let mut count = 1;
        if let Some(input) = self.input.as_mut() {
            for _ in 0..self.max_forward {
                let Ok(msg) = input.try_recv() else {
                    break;
                };
                forward(&mut sinks, &msg).await;
                count += 1;
            }
        }
        record_dispatch_batch(count);
        count as u64
    }

    /// Forward everything currently queued
    async fn drain_pending(&mut self) -> u64 {
        let Some(input) = self.input.as_mut() else {
            return 0;
        };
        let mut sinks = self.sinks.lock().await;
        let mut count = 0;
        while let Ok(msg) = input.try_recv() {
            forward(&mut sinks, &msg).await;
            count += 1;
        }
        debug!(messages = count, "Drained pending messages");
        count
    }

    async fn close_sinks(&mut self) {
        let handles = std::mem::take(&mut *self.sinks.lock().await);
        let count = handles.len();
        for handle in handles.into_values() {
            handle.shutdown().await;
        }
        record_active_sinks(0);
        debug!(sinks = count, "All sinks closed");
    }
}

async fn next_message(input: &mut Option<mpsc::Receiver<Message>>) -> Option<Message> {
    match input {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn forward(sinks: &mut BTreeMap<String, SinkHandle>, msg: &Message) {
    record_message_received(msg.variant());
    for handle in sinks.values_mut() {
        handle.write(msg).await;
    }
}
