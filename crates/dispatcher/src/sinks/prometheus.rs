//! PrometheusSink - exposes metric messages as gauges
//!
//! Values go through the global `metrics` recorder; the HTTP endpoint is the
//! one installed by `observability` (`--metrics-port`). Without a recorder
//! the updates are no-ops.

use std::collections::BTreeSet;

use contracts::{ContractError, FieldValue, Message, Sink, Variant};
use metrics::{gauge, Label};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, trace};

use super::parse_config;

/// Configuration for PrometheusSink
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PrometheusSinkConfig {
    /// Prepended to every gauge name
    pub prefix: String,
    pub meta_as_tags: BTreeSet<String>,
}

/// Sink that sets one gauge per metric name and tag set
pub struct PrometheusSink {
    name: String,
    config: PrometheusSinkConfig,
    updates: u64,
}

impl PrometheusSink {
    pub fn new(name: impl Into<String>, config: PrometheusSinkConfig) -> Self {
        Self {
            name: name.into(),
            config,
            updates: 0,
        }
    }

    /// Create from the sink's config blob
    pub fn from_config(name: impl Into<String>, config: &Value) -> Result<Self, ContractError> {
        let name = name.into();
        let config = parse_config(&name, config)?;
        Ok(Self::new(name, config))
    }

    /// Gauge updates issued so far
    pub fn updates(&self) -> u64 {
        self.updates
    }

    fn gauge_value(&self, msg: &Message) -> Result<f64, ContractError> {
        match msg.get_field("value") {
            Some(FieldValue::Bool(b)) => Ok(if *b { 1.0 } else { 0.0 }),
            Some(value) => value.to_f64().ok_or_else(|| {
                ContractError::sink_write(
                    &self.name,
                    format!("metric '{}' has a non-numeric value", msg.name()),
                )
            }),
            None => Err(ContractError::sink_write(
                &self.name,
                format!("metric '{}' has no value", msg.name()),
            )),
        }
    }
}

impl Sink for PrometheusSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "prometheus_sink_write",
        skip(self, msg),
        fields(sink = %self.name, measurement = %msg.name())
    )]
    async fn write(&mut self, msg: &Message) -> Result<(), ContractError> {
        if msg.variant() != Variant::Metric {
            trace!(variant = %msg.variant(), "Skipping non-metric message");
            return Ok(());
        }
        let value = self.gauge_value(msg)?;
        let labels: Vec<Label> = msg
            .promoted_tags(&self.config.meta_as_tags)
            .into_iter()
            .map(|(k, v)| Label::new(k.to_string(), v.to_string()))
            .collect();

        gauge!(format!("{}{}", self.config.prefix, msg.name()), labels).set(value);
        self.updates += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "prometheus_sink_close", skip(self))]
    async fn close(&mut self) {
        debug!(sink = %self.name, updates = self.updates, "PrometheusSink closed");
    }
}
