//! Phase 1: The Cartographer (Rate Snapshots)
//!
//! Turns quotes and feed files into dense per-tick snapshots.

mod feed;
mod rates;
mod store;

pub use feed::{load_snapshots, replay, save_snapshots, FeedStats, SyntheticMarket};
pub use rates::{check_shape, RateMatrix, TickSnapshot, Token};
pub use store::PriceStore;
