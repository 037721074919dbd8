//! `validate` command implementation.

use anyhow::{Context, Result};
use config_loader::{sink_warnings, RelayConfig};
use dispatcher::{sink_type_of, SinkRegistry};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    sink_count: usize,
    queue_capacity: usize,
    max_forward: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    let loaded = config_loader::ConfigLoader::load_from_path(&args.config)
        .and_then(|config| config.relay_settings().map(|settings| (config, settings)));

    match loaded {
        Ok((config, settings)) => {
            let warnings = collect_warnings(&config, &SinkRegistry::with_builtin());
            let sink_count = config
                .sinks()
                .ok()
                .and_then(|s| s.as_object())
                .map_or(0, |s| s.len());

            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    sink_count,
                    queue_capacity: settings.queue_capacity,
                    max_forward: settings.max_forward,
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig, registry: &SinkRegistry) -> Vec<String> {
    let Ok(sinks) = config.sinks() else {
        return vec!["No 'sinks' section - `run` will refuse to start".to_string()];
    };

    let mut warnings = sink_warnings(config);
    let Some(entries) = sinks.as_object() else {
        return warnings;
    };
    if entries.is_empty() {
        warnings.push("No sinks configured - `run` will refuse to start".to_string());
    }
    for (name, blob) in entries {
        if let Some(sink_type) = sink_type_of(blob) {
            if !registry.contains(sink_type) {
                warnings.push(format!(
                    "Sink '{name}' has unknown type '{sink_type}' and will be skipped"
                ));
            }
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Sinks: {}", summary.sink_count);
            println!("  Queue capacity: {}", summary.queue_capacity);
            println!("  Max forward: {}", summary.max_forward);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
