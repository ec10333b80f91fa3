//! PriceSource trait - producer boundary abstraction
//!
//! Defines a unified interface for price producers, decoupling the fan-out
//! pipeline from where rates actually come from. Mock and replay feeds share
//! this interface; a live market-data adapter would implement it the same way.

use std::sync::Arc;

use crate::PriceUpdate;

/// Price update callback type
///
/// When a source produces a rate, it pushes a `PriceUpdate` through this
/// callback. Uses `Arc` so the callback can be shared across source tasks.
pub type PriceCallback = Arc<dyn Fn(PriceUpdate) + Send + Sync>;

/// Price producer trait
///
/// # Contract
/// - `listen` starts emission; calling it while already running is idempotent
/// - `stop` requests emission to cease; in-flight callbacks may still complete
/// - sources never block on downstream processing speed
pub trait PriceSource: Send + Sync {
    /// Source name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Register the update callback and start emitting
    fn listen(&self, callback: PriceCallback);

    /// Stop emitting
    fn stop(&self);

    /// Check whether the source is currently emitting
    fn is_running(&self) -> bool;
}
