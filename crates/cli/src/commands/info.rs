//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    feed: FeedInfo,
    throttler: ThrottlerInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    subscribers: Vec<SubscriberInfo>,
}

#[derive(Serialize)]
struct FeedInfo {
    pairs: Vec<String>,
    frequency_hz: f64,
    start_rate: f64,
    step_pct: f64,
}

#[derive(Serialize)]
struct ThrottlerInfo {
    fault_policy: String,
}

#[derive(Serialize)]
struct SubscriberInfo {
    name: String,
    kind: String,
    #[serde(skip_serializing_if = "is_zero")]
    delay_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &contracts::PipelineBlueprint) -> ConfigInfo {
    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        feed: FeedInfo {
            pairs: blueprint.feed.pairs.clone(),
            frequency_hz: blueprint.feed.frequency_hz,
            start_rate: blueprint.feed.start_rate,
            step_pct: blueprint.feed.step_pct,
        },
        throttler: ThrottlerInfo {
            fault_policy: format!("{:?}", blueprint.throttler.fault_policy),
        },
        subscribers: blueprint
            .subscribers
            .iter()
            .map(|spec| SubscriberInfo {
                name: spec.name.clone(),
                kind: format!("{:?}", spec.kind),
                delay_ms: spec.delay_ms,
                path: spec.path.as_ref().map(|p| p.display().to_string()),
            })
            .collect(),
    }
}

fn print_config_info(blueprint: &contracts::PipelineBlueprint, args: &InfoArgs) {
    println!("Configuration: {}", args.config.display());
    println!("Version: {:?}", blueprint.version);

    println!("\nFeed:");
    println!("  Pairs ({}): {}", blueprint.feed.pairs.len(), blueprint.feed.pairs.join(", "));
    println!("  Frequency: {} Hz", blueprint.feed.frequency_hz);

    println!("\nThrottler:");
    println!("  Fault policy: {:?}", blueprint.throttler.fault_policy);

    println!("\nSubscribers: {}", blueprint.subscribers.len());
    if args.subscribers {
        for spec in &blueprint.subscribers {
            println!("  - {} ({:?})", spec.name, spec.kind);
            if spec.delay_ms > 0 {
                println!("      delay: {}ms", spec.delay_ms);
            }
            if let Some(ref path) = spec.path {
                println!("      path: {}", path.display());
            }
        }
    }
}
