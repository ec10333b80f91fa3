//! PipelineBlueprint - Config Loader output
//!
//! Describes a complete demo pipeline: engine policy, price feed, subscribers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration blueprint
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PipelineBlueprint {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Engine policy
    #[serde(default)]
    #[validate(nested)]
    pub throttler: ThrottlerConfig,

    /// Price feed settings
    #[validate(nested)]
    pub feed: FeedConfig,

    /// Subscriber definitions
    #[validate(nested)]
    pub subscribers: Vec<SubscriberSpec>,
}

/// Engine policy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct ThrottlerConfig {
    /// What to do when a subscriber callback fails
    #[serde(default)]
    pub fault_policy: FaultPolicy,
}

/// Policy applied when a subscriber callback returns an error
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Log the failure and keep draining (the next update supersedes the value)
    #[default]
    LogAndContinue,
    /// Propagate the failure to the runtime's task-panic surface
    Escalate,
}

/// Price feed configuration (random-walk mock feed)
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeedConfig {
    /// Currency pairs to publish
    #[validate(length(min = 1, message = "at least one pair is required"))]
    pub pairs: Vec<String>,

    /// Publish frequency across all pairs (updates per second)
    #[serde(default = "default_frequency_hz")]
    #[validate(range(min = 0.1, max = 100_000.0))]
    pub frequency_hz: f64,

    /// Initial rate for every pair
    #[serde(default = "default_start_rate")]
    pub start_rate: f64,

    /// Maximum per-step move as a percentage of the current rate
    #[serde(default = "default_step_pct")]
    #[validate(range(min = 0.0, max = 50.0))]
    pub step_pct: f64,
}

fn default_frequency_hz() -> f64 {
    50.0
}

fn default_start_rate() -> f64 {
    1.0
}

fn default_step_pct() -> f64 {
    0.25
}

/// One subscriber definition
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubscriberSpec {
    /// Subscriber name (unique within the blueprint)
    #[validate(length(min = 1, message = "subscriber name cannot be empty"))]
    pub name: String,

    /// Subscriber implementation to instantiate
    pub kind: SubscriberKind,

    /// Artificial per-delivery delay in milliseconds (0 = none)
    #[serde(default)]
    pub delay_ms: u64,

    /// Output path (csv subscribers only)
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Shipped subscriber implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriberKind {
    /// Log every delivery via tracing
    Log,
    /// Append deliveries as CSV rows to a file
    Csv,
}
