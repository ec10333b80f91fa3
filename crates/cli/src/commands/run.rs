//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
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

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        pairs = blueprint.feed.pairs.len(),
        frequency_hz = blueprint.feed.frequency_hz,
        subscribers = blueprint.subscribers.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    // Build pipeline configuration
    let pipeline_config = PipelineConfig {
        blueprint,
        max_updates: if args.max_updates == 0 {
            None
        } else {
            Some(args.max_updates)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        settle: Duration::from_millis(args.settle_ms),
        buffer_size: args.buffer_size,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let pipeline = Pipeline::new(pipeline_config);

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    tokio::select! {
        result = pipeline.run() => {
            match result {
                Ok(stats) => {
                    info!(
                        updates_published = stats.updates_published,
                        duration_secs = stats.duration.as_secs_f64(),
                        rate = format!("{:.2}/s", stats.updates_per_sec()),
                        "Pipeline completed successfully"
                    );

                    stats.print_summary();
                }
                Err(e) => {
                    return Err(e).context("Pipeline execution failed");
                }
            }
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("FX Fanout finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::PipelineBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Feed:");
    println!("  Pairs: {}", blueprint.feed.pairs.join(", "));
    println!("  Frequency: {} Hz", blueprint.feed.frequency_hz);
    println!(
        "  Walk: start={}, step=±{}%",
        blueprint.feed.start_rate, blueprint.feed.step_pct
    );

    println!("\nThrottler:");
    println!("  Fault policy: {:?}", blueprint.throttler.fault_policy);

    println!("\nSubscribers ({}):", blueprint.subscribers.len());
    for spec in &blueprint.subscribers {
        let delay = if spec.delay_ms > 0 {
            format!(", delay {}ms", spec.delay_ms)
        } else {
            String::new()
        };
        println!("  - {} ({:?}{})", spec.name, spec.kind, delay);
    }

    println!();
}
