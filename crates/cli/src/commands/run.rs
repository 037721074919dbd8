//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let relay = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let mut settings = relay
        .relay_settings()
        .context("Invalid 'relay' section")?;

    // Apply CLI overrides
    if let Some(capacity) = args.queue_capacity {
        if capacity == 0 {
            anyhow::bail!("--queue-capacity must be at least 1");
        }
        info!(capacity, "Overriding queue capacity from CLI");
        settings.queue_capacity = capacity;
    }
    if let Some(max_forward) = args.max_forward {
        if max_forward == 0 {
            anyhow::bail!("--max-forward must be at least 1");
        }
        info!(max_forward, "Overriding max_forward from CLI");
        settings.max_forward = max_forward;
    }

    let pipeline = Pipeline::new(PipelineConfig {
        relay,
        settings,
        input: args.input.clone(),
        input_format: args.input_format,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    });

    // Dry run - build the sinks, close them and exit
    if args.dry_run {
        let manager = pipeline.build_manager().await?;
        let names = manager.sink_names().await;
        manager.close().await;
        info!(sinks = ?names, "Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    info!(input = %args.input.display(), "Starting relay...");
    let stats = pipeline.run(shutdown_signal()).await?;

    info!(
        messages = stats.relay.messages,
        decode_errors = stats.relay.decode_errors,
        write_failures = stats.total_failures(),
        duration_secs = stats.duration.as_secs_f64(),
        throughput = format!("{:.2}", stats.throughput()),
        "Relay finished"
    );
    stats.print_summary();

    if stats.sinks.iter().all(|s| s.counters.write_count == 0) && stats.relay.messages > 0 {
        return Err(CliError::relay("no sink accepted any message").into());
    }
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
