//! FileSink - appends records to a file on disk

use std::collections::BTreeSet;
use std::path::PathBuf;

use contracts::{ContractError, Message, Sink};
use serde::Deserialize;
use serde_json::Value;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, error, instrument};

use super::{parse_config, OutputFormat};

fn default_append() -> bool {
    true
}

/// Configuration for FileSink
#[derive(Debug, Clone, Deserialize)]
pub struct FileSinkConfig {
    /// Output file; parent directories are created
    pub path: PathBuf,
    /// Append to an existing file instead of truncating it
    #[serde(default = "default_append")]
    pub append: bool,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default)]
    pub meta_as_tags: BTreeSet<String>,
}

impl FileSinkConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append: true,
            format: OutputFormat::default(),
            meta_as_tags: BTreeSet::new(),
        }
    }
}

/// Sink that writes records to a file
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    /// `None` once closed
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Open the target file
    #[instrument(name = "file_sink_new", skip(name, config), fields(path = %config.path.display()))]
    pub async fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let mut options = OpenOptions::new();
        options.create(true);
        if config.append {
            options.append(true);
        } else {
            options.write(true).truncate(true);
        }
        let file = options.open(&config.path).await?;

        debug!(sink = %name, path = %config.path.display(), "FileSink opened");
        Ok(Self {
            name,
            config,
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Create from the sink's config blob
    pub async fn from_config(name: impl Into<String>, config: &Value) -> Result<Self, ContractError> {
        let name = name.into();
        let config: FileSinkConfig = parse_config(&name, config)?;
        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    pub fn path(&self) -> &std::path::Path {
        &self.config.path
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, ContractError> {
        self.writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_write(&self.name, "file already closed"))
    }
}

impl Sink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_write",
        skip(self, msg),
        fields(sink = %self.name, measurement = %msg.name())
    )]
    async fn write(&mut self, msg: &Message) -> Result<(), ContractError> {
        let record = self.config.format.encode(msg, &self.config.meta_as_tags)?;
        let name = self.name.clone();
        self.writer()?
            .write_all(&record)
            .await
            .map_err(|e| ContractError::sink_write(name, e.to_string()))
    }

    #[instrument(name = "file_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        writer
            .flush()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                error!(sink = %self.name, error = %e, "Flush failed on close");
            }
        }
        debug!(sink = %self.name, "FileSink closed");
    }
}
