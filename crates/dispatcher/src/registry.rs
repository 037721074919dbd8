//! SinkRegistry - sink type name to constructor mapping
//!
//! The registry is an ordinary value owned by the [`SinkManager`]; there is
//! no process-wide table. Callers start from [`SinkRegistry::new`] (empty) or
//! [`SinkRegistry::with_builtin`] and register extra backends before handing
//! it over.
//!
//! [`SinkManager`]: crate::SinkManager

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use contracts::{BoxedSink, ContractError};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::DispatcherError;
use crate::sinks::{FileSink, PrometheusSink, StdoutSink, UdpSink};

/// Future returned by a sink constructor
pub type ConstructFuture = Pin<Box<dyn Future<Output = Result<BoxedSink, ContractError>> + Send>>;

/// Constructor called with the sink name and its full config blob
pub type SinkConstructor = Arc<dyn Fn(String, Value) -> ConstructFuture + Send + Sync>;

/// Read the `type` discriminator of a sink config blob
pub fn sink_type_of(config: &Value) -> Option<&str> {
    config.get("type").and_then(Value::as_str)
}

/// Sink type registry
#[derive(Clone, Default)]
pub struct SinkRegistry {
    constructors: BTreeMap<String, SinkConstructor>,
}

impl SinkRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the bundled backends: `stdout`, `file`, `udp`, `prometheus`
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("stdout", |name, config| async move {
            let sink = StdoutSink::from_config(name, &config)?;
            Ok::<_, ContractError>(Box::new(sink) as BoxedSink)
        });
        registry.register("file", |name, config| async move {
            let sink = FileSink::from_config(name, &config).await?;
            Ok::<_, ContractError>(Box::new(sink) as BoxedSink)
        });
        registry.register("udp", |name, config| async move {
            let sink = UdpSink::from_config(name, &config).await?;
            Ok::<_, ContractError>(Box::new(sink) as BoxedSink)
        });
        registry.register("prometheus", |name, config| async move {
            let sink = PrometheusSink::from_config(name, &config)?;
            Ok::<_, ContractError>(Box::new(sink) as BoxedSink)
        });
        registry
    }

    /// Add or replace the constructor for `sink_type`
    pub fn register<F, Fut>(&mut self, sink_type: impl Into<String>, constructor: F)
    where
        F: Fn(String, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<BoxedSink, ContractError>> + Send + 'static,
    {
        let constructor: SinkConstructor =
            Arc::new(move |name: String, config: Value| -> ConstructFuture {
                Box::pin(constructor(name, config))
            });
        self.constructors.insert(sink_type.into(), constructor);
    }

    /// Registered type names, sorted
    pub fn types(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, sink_type: &str) -> bool {
        self.constructors.contains_key(sink_type)
    }

    /// Build the sink described by `config`
    ///
    /// # Errors
    /// - `SinkCreation` if the blob is not an object, has no `type`, or the
    ///   backend constructor fails
    /// - `UnknownSinkType` if no constructor is registered for `type`
    #[instrument(name = "sink_registry_construct", skip(self, config))]
    pub async fn construct(&self, name: &str, config: &Value) -> Result<BoxedSink, DispatcherError> {
        if !config.is_object() {
            return Err(DispatcherError::sink_creation(
                name,
                "config must be a JSON object",
            ));
        }
        let sink_type = sink_type_of(config)
            .ok_or_else(|| DispatcherError::sink_creation(name, "missing 'type' field"))?;
        let constructor = self
            .constructors
            .get(sink_type)
            .ok_or_else(|| DispatcherError::unknown_sink_type(name, sink_type))?;

        let sink = constructor(name.to_string(), config.clone())
            .await
            .map_err(|e| DispatcherError::sink_creation(name, e.to_string()))?;
        debug!(sink = name, sink_type, "Sink constructed");
        Ok(sink)
    }
}

impl fmt::Debug for SinkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkRegistry")
            .field("types", &self.types())
            .finish()
    }
}
