//! # Feed
//!
//! Price producers for demos and tests.
//!
//! Both sources implement the [`PriceSource`] contract: register a callback
//! with `listen`, stop emission with `stop`. A live market-data adapter would
//! plug into the pipeline through the same trait.

mod mock;
mod replay;

pub use mock::{MockFeedConfig, MockFeedSource};
pub use replay::{ReplayFeedSource, ReplayStep};

// Re-export contracts types
pub use contracts::{PairId, PriceCallback, PriceSource, PriceUpdate};
