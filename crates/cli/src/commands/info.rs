//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::{RelayConfig, RelaySettings};
use dispatcher::{sink_type_of, SinkRegistry};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    relay: RelaySettings,
    sinks: Vec<SinkInfo>,
    available_sink_types: Vec<String>,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sink_type: Option<String>,
    supported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<Value>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let info = build_config_info(&config, &SinkRegistry::with_builtin(), args.sinks)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(
    config: &RelayConfig,
    registry: &SinkRegistry,
    with_blobs: bool,
) -> Result<ConfigInfo> {
    let relay = config.relay_settings().context("Invalid 'relay' section")?;

    let sinks = config
        .get(config_loader::SINKS_KEY)
        .and_then(Value::as_object)
        .map(|entries| {
            entries
                .iter()
                .map(|(name, blob)| {
                    let sink_type = sink_type_of(blob).map(str::to_string);
                    SinkInfo {
                        name: name.clone(),
                        supported: sink_type.as_deref().is_some_and(|t| registry.contains(t)),
                        sink_type,
                        config: with_blobs.then(|| blob.clone()),
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ConfigInfo {
        relay,
        sinks,
        available_sink_types: registry.types().into_iter().map(str::to_string).collect(),
    })
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Telemetry Relay Configuration                  ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("Relay");
    println!("   ├─ Queue capacity: {}", info.relay.queue_capacity);
    println!("   ├─ Max forward: {}", info.relay.max_forward);
    if info.relay.meta_as_tags.is_empty() {
        println!("   └─ Meta as tags: (none)");
    } else {
        println!("   └─ Meta as tags: {}", info.relay.meta_as_tags.join(", "));
    }

    println!("\nSinks ({})", info.sinks.len());
    for (i, sink) in info.sinks.iter().enumerate() {
        let is_last = i == info.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        let sink_type = sink.sink_type.as_deref().unwrap_or("<missing type>");
        let marker = if sink.supported { "" } else { " [unsupported]" };
        println!("   {} {} ({}){}", prefix, sink.name, sink_type, marker);

        if let Some(ref blob) = sink.config {
            if let Some(entries) = blob.as_object() {
                for (key, value) in entries.iter().filter(|(k, _)| k.as_str() != "type") {
                    println!("   {}  {} = {}", child_prefix, key, value);
                }
            }
        }
    }

    println!("\nAvailable sink types: {}", info.available_sink_types.join(", "));
    println!();
}
