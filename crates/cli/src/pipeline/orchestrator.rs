//! Pipeline orchestrator - wires the input reader to the sink manager.
//!
//! Lines are read from a file or stdin, decoded into messages and pushed
//! through a bounded queue into the [`SinkManager`]. End of input drains the
//! queue before the sinks are closed; a shutdown signal closes them at once.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use config_loader::{RelayConfig, RelaySettings};
use contracts::Message;
use dispatcher::{sink_type_of, SinkManager, SinkRegistry};
use observability::RelayStatsAggregator;
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{PipelineStats, SinkStats};
use crate::cli::InputFormat;
use crate::error::CliError;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Loaded relay configuration
    pub relay: RelayConfig,

    /// Effective queue and drain settings
    pub settings: RelaySettings,

    /// Input path, `-` for stdin
    pub input: PathBuf,

    /// Encoding of the input lines
    pub input_format: InputFormat,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
}

enum Outcome {
    EndOfInput,
    Interrupted,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Build and initialize the sink manager from the `sinks` section
    pub async fn build_manager(&self) -> Result<SinkManager> {
        let sinks = self
            .config
            .relay
            .sinks()
            .context("Configuration has no usable 'sinks' section")?;

        if self.config.metrics_port.is_none() && has_sink_type(sinks, "prometheus") {
            warn!("Prometheus sink configured but the metrics exporter is disabled");
        }

        let sinks = with_default_meta_as_tags(sinks, &self.config.settings.meta_as_tags);
        let manager = SinkManager::from_config(SinkRegistry::with_builtin(), &sinks)
            .await
            .context("Failed to initialize sinks")?
            .with_max_forward(self.config.settings.max_forward);
        Ok(manager)
    }

    /// Run until the input ends or `shutdown` resolves
    pub async fn run<S>(self, shutdown: S) -> Result<PipelineStats>
    where
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let mut manager = self.build_manager().await?;
        let sink_metrics = manager.metric_handles().await;
        info!(
            sinks = sink_metrics.len(),
            queue_capacity = self.config.settings.queue_capacity,
            max_forward = self.config.settings.max_forward,
            "Sink manager ready"
        );

        let (tx, rx) = mpsc::channel(self.config.settings.queue_capacity);
        manager.add_input(rx);
        manager.start();

        let reader = match open_input(&self.config.input).await {
            Ok(reader) => reader,
            Err(e) => {
                manager.close().await;
                return Err(e.into());
            }
        };

        let mut aggregator = RelayStatsAggregator::new();
        let outcome = {
            let relay = relay_lines(reader, self.config.input_format, &tx, &mut aggregator);
            tokio::pin!(shutdown);
            tokio::select! {
                result = relay => result.map(|()| Outcome::EndOfInput),
                _ = &mut shutdown => Ok(Outcome::Interrupted),
            }
        };
        drop(tx);

        let interrupted = match outcome {
            Ok(Outcome::EndOfInput) => {
                info!("End of input, draining queued messages");
                manager.drain_and_close().await;
                false
            }
            Ok(Outcome::Interrupted) => {
                warn!("Received shutdown signal, closing sinks");
                manager.close().await;
                true
            }
            Err(e) => {
                manager.close().await;
                return Err(e);
            }
        };

        let sinks = sink_metrics
            .into_iter()
            .map(|(name, sink_type, metrics)| SinkStats {
                name,
                sink_type,
                counters: metrics.snapshot(),
            })
            .collect();

        Ok(PipelineStats {
            duration: start_time.elapsed(),
            relay: aggregator.summary(),
            sinks,
            interrupted,
        })
    }
}

/// Copy `keys` into every sink config that has no `meta_as_tags` of its own
fn with_default_meta_as_tags(sinks: &Value, keys: &[String]) -> Value {
    let mut sinks = sinks.clone();
    if keys.is_empty() {
        return sinks;
    }
    if let Some(entries) = sinks.as_object_mut() {
        for config in entries.values_mut() {
            if let Some(config) = config.as_object_mut() {
                config
                    .entry("meta_as_tags")
                    .or_insert_with(|| Value::from(keys.to_vec()));
            }
        }
    }
    sinks
}

fn has_sink_type(sinks: &Value, wanted: &str) -> bool {
    sinks
        .as_object()
        .is_some_and(|entries| entries.values().any(|c| sink_type_of(c) == Some(wanted)))
}

/// Open `path` for line reading; `-` is stdin
///
/// A blocking stdin read cannot be cancelled, so an interrupted run may only
/// exit once the pending line arrives.
async fn open_input(path: &Path) -> Result<Box<dyn AsyncBufRead + Unpin + Send>, CliError> {
    if path == Path::new("-") {
        debug!("Reading input from stdin");
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| CliError::input(path, e))?;
    debug!(path = %path.display(), "Reading input from file");
    Ok(Box::new(BufReader::new(file)))
}

/// Decode every input line and push the messages into `tx`
///
/// Undecodable lines are logged, counted and skipped. Messages refused by a
/// closed queue are counted as dropped.
async fn relay_lines<R>(
    reader: R,
    format: InputFormat,
    tx: &mpsc::Sender<Message>,
    stats: &mut RelayStatsAggregator,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        stats.record_line(line.len());

        let decoded = match format {
            InputFormat::Line => Message::decode_all(line.as_bytes()),
            InputFormat::Json => Message::from_json(line.as_bytes()).map(|msg| vec![msg]),
        };
        let messages = match decoded {
            Ok(messages) => messages,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping undecodable input line");
                stats.record_decode_error();
                continue;
            }
        };

        for msg in messages {
            stats.record_message(&msg);
            if tx.send(msg).await.is_err() {
                stats.record_dropped();
            }
        }
    }

    debug!(lines = line_no, "Input exhausted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    const INPUT: &str = "cpu_load,host=n1 value=0.75 1700000000000000000\n\
                         \n\
                         this is not a message\n\
                         job,host=n1 event=\"started\" 1700000000000000001\n";

    #[tokio::test]
    async fn test_relay_lines_skips_bad_lines() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut stats = RelayStatsAggregator::new();

        relay_lines(INPUT.as_bytes(), InputFormat::Line, &tx, &mut stats)
            .await
            .unwrap();
        drop(tx);

        let mut names = Vec::new();
        while let Some(msg) = rx.recv().await {
            names.push(msg.name().to_string());
        }
        assert_eq!(names, vec!["cpu_load", "job"]);

        let summary = stats.summary();
        assert_eq!(summary.lines, 3);
        assert_eq!(summary.messages, 2);
        assert_eq!(summary.decode_errors, 1);
        assert_eq!(summary.variants.get("metric"), Some(&1));
        assert_eq!(summary.variants.get("event"), Some(&1));
    }

    #[tokio::test]
    async fn test_relay_lines_json_input() {
        let input = "{\"name\":\"m\",\"tags\":{\"host\":\"a\"},\"fields\":{\"value\":1.5},\
                     \"timestamp\":\"2023-11-14T22:13:20Z\"}\n{\"broken\":\n";
        let (tx, mut rx) = mpsc::channel(8);
        let mut stats = RelayStatsAggregator::new();

        relay_lines(input.as_bytes(), InputFormat::Json, &tx, &mut stats)
            .await
            .unwrap();

        let msg = rx.recv().await.unwrap();
        assert_eq!(msg.get_tag("host"), Some("a"));
        assert_eq!(stats.summary().decode_errors, 1);
    }

    #[tokio::test]
    async fn test_relay_lines_counts_dropped_when_queue_closed() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let mut stats = RelayStatsAggregator::new();

        relay_lines(INPUT.as_bytes(), InputFormat::Line, &tx, &mut stats)
            .await
            .unwrap();
        assert_eq!(stats.summary().dropped, 2);
    }

    #[tokio::test]
    async fn test_relay_lines_keeps_multiline_strings_whole() {
        let mut msg = Message::empty();
        msg.set_name("app");
        msg.add_tag("host", "a");
        msg.add_field("log", "line one\nline two");
        let input = format!("{}\n", msg.encode_line(&BTreeSet::new()).unwrap());

        let (tx, mut rx) = mpsc::channel(8);
        let mut stats = RelayStatsAggregator::new();
        relay_lines(input.as_bytes(), InputFormat::Line, &tx, &mut stats)
            .await
            .unwrap();
        drop(tx);

        let relayed = rx.recv().await.unwrap();
        assert_eq!(relayed.fields(), msg.fields());
        assert!(rx.recv().await.is_none());
        assert_eq!(stats.summary().messages, 1);
        assert_eq!(stats.summary().decode_errors, 0);
    }

    #[test]
    fn test_relay_meta_as_tags_fills_sinks_without_their_own() {
        let sinks = serde_json::json!({
            "console": {"type": "stdout"},
            "disk": {"type": "file", "path": "out.lp", "meta_as_tags": ["unit"]},
        });
        let keys = vec!["source".to_string()];

        let merged = with_default_meta_as_tags(&sinks, &keys);
        assert_eq!(merged["console"]["meta_as_tags"], serde_json::json!(["source"]));
        assert_eq!(merged["disk"]["meta_as_tags"], serde_json::json!(["unit"]));

        assert_eq!(with_default_meta_as_tags(&sinks, &[]), sinks);
    }

    #[tokio::test]
    async fn test_run_file_to_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.lp");
        let output = dir.path().join("out.lp");
        std::fs::write(&input, INPUT).unwrap();

        let content = format!(
            r#"{{"sinks": {{"disk": {{"type": "file", "path": {:?}, "append": false}}}}}}"#,
            output.display().to_string()
        );
        let relay = ConfigLoader::load_from_str(&content, ConfigFormat::Json).unwrap();
        let settings = relay.relay_settings().unwrap();

        let pipeline = Pipeline::new(PipelineConfig {
            relay,
            settings,
            input,
            input_format: InputFormat::Line,
            metrics_port: None,
        });
        let stats = pipeline.run(std::future::pending()).await.unwrap();

        assert!(!stats.interrupted);
        assert_eq!(stats.sinks.len(), 1);
        assert_eq!(stats.sinks[0].counters.write_count, 2);

        let written = std::fs::read_to_string(&output).unwrap();
        let decoded = Message::decode_all(written.as_bytes()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(
            decoded[0].encode_line(&BTreeSet::new()).unwrap(),
            "cpu_load,host=n1 value=0.75 1700000000000000000"
        );
    }

    #[tokio::test]
    async fn test_run_missing_input_closes_sinks() {
        let dir = tempdir().unwrap();
        let relay = ConfigLoader::load_from_str(
            r#"{"sinks": {"console": {"type": "stdout"}}}"#,
            ConfigFormat::Json,
        )
        .unwrap();
        let pipeline = Pipeline::new(PipelineConfig {
            settings: relay.relay_settings().unwrap(),
            relay,
            input: dir.path().join("absent.lp"),
            input_format: InputFormat::Line,
            metrics_port: None,
        });

        let err = pipeline.run(std::future::pending()).await.unwrap_err();
        assert!(err.to_string().contains("absent.lp"));
    }

    #[tokio::test]
    async fn test_build_manager_requires_sinks() {
        let pipeline = Pipeline::new(PipelineConfig {
            relay: RelayConfig::default(),
            settings: RelaySettings::default(),
            input: PathBuf::from("-"),
            input_format: InputFormat::Line,
            metrics_port: None,
        });
        assert!(pipeline.build_manager().await.is_err());
    }
}
