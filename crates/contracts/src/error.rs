//! Layered error definitions
//!
//! Categorized by source: config / delivery / feed / engine

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum FanoutError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Delivery Errors =====
    /// Subscriber rejected or failed to process a delivery
    #[error("subscriber '{subscriber}' delivery error: {message}")]
    Delivery { subscriber: String, message: String },

    // ===== Feed Errors =====
    /// Price source failure
    #[error("feed '{feed}' error: {message}")]
    Feed { feed: String, message: String },

    // ===== Engine Errors =====
    /// A fan-out leg could not be dispatched (task spawn failure or panic)
    #[error("fan-out leg for subscriber '{subscriber}' failed: {message}")]
    FanoutLeg { subscriber: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl FanoutError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create subscriber delivery error
    pub fn delivery(subscriber: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            subscriber: subscriber.into(),
            message: message.into(),
        }
    }

    /// Create feed error
    pub fn feed(feed: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Feed {
            feed: feed.into(),
            message: message.into(),
        }
    }

    /// Create fan-out leg error
    pub fn fanout_leg(subscriber: impl Into<String>, message: impl Into<String>) -> Self {
        Self::FanoutLeg {
            subscriber: subscriber.into(),
            message: message.into(),
        }
    }
}
