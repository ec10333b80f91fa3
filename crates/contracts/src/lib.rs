//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Identity Model
//! - A currency pair is a cheap-to-clone [`PairId`]; the engine keys conflation on it
//! - A subscriber is an `Arc<dyn PriceSubscriber>`; its [`SubscriberId`] is derived
//!   from the `Arc`'s data pointer, so identity is handle equality

mod config;
mod error;
mod pair_id;
mod price_source;
mod subscriber;
mod update;

pub use config::*;
pub use error::*;
pub use pair_id::PairId;
pub use price_source::{PriceCallback, PriceSource};
pub use subscriber::{PriceSubscriber, SharedSubscriber, SubscriberId};
pub use update::PriceUpdate;
