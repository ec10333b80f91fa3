//! Configuration validation
//!
//! Validation rules:
//! - field-level constraints from the blueprint's `Validate` derives
//! - subscriber names unique
//! - feed pairs unique and non-empty strings
//! - csv subscribers carry an output path

use std::collections::HashSet;

use contracts::{FanoutError, PipelineBlueprint, SubscriberKind};
use validator::Validate;

/// Validate a PipelineBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), FanoutError> {
    validate_fields(blueprint)?;
    validate_pairs(blueprint)?;
    validate_subscriber_names(blueprint)?;
    validate_subscriber_outputs(blueprint)?;
    Ok(())
}

/// Run the derive-level constraints (lengths, ranges)
fn validate_fields(blueprint: &PipelineBlueprint) -> Result<(), FanoutError> {
    blueprint.validate().map_err(|e| {
        let field = e
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        FanoutError::config_validation(field, e.to_string())
    })
}

/// Validate pair list: unique, no empty strings
fn validate_pairs(blueprint: &PipelineBlueprint) -> Result<(), FanoutError> {
    let mut seen = HashSet::new();
    for pair in &blueprint.feed.pairs {
        if pair.is_empty() {
            return Err(FanoutError::config_validation(
                "feed.pairs",
                "pair name cannot be empty",
            ));
        }
        if !seen.insert(pair) {
            return Err(FanoutError::config_validation(
                format!("feed.pairs[{pair}]"),
                "duplicate pair",
            ));
        }
    }
    Ok(())
}

/// Validate subscriber name uniqueness
fn validate_subscriber_names(blueprint: &PipelineBlueprint) -> Result<(), FanoutError> {
    let mut seen = HashSet::new();
    for spec in &blueprint.subscribers {
        if !seen.insert(&spec.name) {
            return Err(FanoutError::config_validation(
                format!("subscribers[name={}]", spec.name),
                "duplicate subscriber name",
            ));
        }
    }
    Ok(())
}

/// Validate kind-specific requirements
fn validate_subscriber_outputs(blueprint: &PipelineBlueprint) -> Result<(), FanoutError> {
    for spec in &blueprint.subscribers {
        if spec.kind == SubscriberKind::Csv && spec.path.is_none() {
            return Err(FanoutError::config_validation(
                format!("subscribers[name={}].path", spec.name),
                "csv subscriber requires an output path",
            ));
        }
    }
    Ok(())
}
