//! StdoutSink - prints each message as one record line

use std::collections::BTreeSet;

use contracts::{ContractError, Message, Sink};
use serde::Deserialize;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter, Stdout};
use tracing::{debug, instrument};

use super::{parse_config, OutputFormat};

/// Configuration for StdoutSink
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StdoutSinkConfig {
    pub format: OutputFormat,
    pub meta_as_tags: BTreeSet<String>,
}

/// Sink that writes records to standard output (or any async writer)
pub struct StdoutSink<W = Stdout> {
    name: String,
    config: StdoutSinkConfig,
    writer: BufWriter<W>,
}

impl StdoutSink {
    /// Create from the sink's config blob
    pub fn from_config(name: impl Into<String>, config: &Value) -> Result<Self, ContractError> {
        let name = name.into();
        let config = parse_config(&name, config)?;
        Ok(Self::with_writer(name, config, tokio::io::stdout()))
    }
}

impl<W: AsyncWrite + Unpin + Send> StdoutSink<W> {
    /// Create a sink over an arbitrary writer
    pub fn with_writer(name: impl Into<String>, config: StdoutSinkConfig, writer: W) -> Self {
        Self {
            name: name.into(),
            config,
            writer: BufWriter::new(writer),
        }
    }

    /// Underlying writer (buffered bytes not included until flushed)
    pub fn get_ref(&self) -> &W {
        self.writer.get_ref()
    }
}

impl<W: AsyncWrite + Unpin + Send> Sink for StdoutSink<W> {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "stdout_sink_write",
        skip(self, msg),
        fields(sink = %self.name, measurement = %msg.name())
    )]
    async fn write(&mut self, msg: &Message) -> Result<(), ContractError> {
        let record = self.config.format.encode(msg, &self.config.meta_as_tags)?;
        self.writer
            .write_all(&record)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "stdout_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "stdout_sink_close", skip(self))]
    async fn close(&mut self) {
        debug!(sink = %self.name, "StdoutSink closed");
    }
}
