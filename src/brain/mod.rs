//! Phase 2: The Brain
//!
//! Responsible for:
//! - Mapping rates to additive -ln weights
//! - Finding a negative cycle (arbitrage opportunity) using Bellman-Ford
//! - Normalizing the recovered cycle into a closed trade route

mod bellman_ford;
mod cycle;
mod weights;

pub use bellman_ford::{NegativeCycle, NegativeCycleDetector};
pub use cycle::{format_route, normalize, Cycle};
pub use weights::WeightMatrix;
