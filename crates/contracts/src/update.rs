//! PriceUpdate - feed boundary value
//!
//! One keyed rate observation as produced by a price feed.

use serde::{Deserialize, Serialize};

use crate::PairId;

/// A single price update at the producer boundary.
///
/// The engine conflates solely on `pair`; `seq` is a feed-side sequence number
/// carried for ordering diagnostics and never interpreted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceUpdate {
    /// Currency pair the rate belongs to
    pub pair: PairId,

    /// Most recent rate for the pair
    pub rate: f64,

    /// Optional feed-side sequence number (diagnostics only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,
}

impl PriceUpdate {
    /// Create an update without a sequence number.
    pub fn new(pair: impl Into<PairId>, rate: f64) -> Self {
        Self {
            pair: pair.into(),
            rate,
            seq: None,
        }
    }

    /// Attach a feed-side sequence number.
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}
