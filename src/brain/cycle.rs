//! Cycle Normalization
//!
//! Step 2.3: The Route
//!
//! The detector hands back a closed predecessor walk, listed backwards.
//! Normalizing turns it into the trade order: start at the anchor token,
//! hop forward through each leg, return to the anchor.

use alloy_primitives::Address;
use tracing::debug;

use super::{NegativeCycle, WeightMatrix};
use crate::tokens::TokenNames;

/// A closed trade route over token indices
#[derive(Debug, Clone, PartialEq)]
pub struct Cycle {
    /// Token indices, first == last
    pub path: Vec<usize>,
    /// Sum of -ln(rate) over every hop
    pub total_weight: f64,
}

impl Cycle {
    /// Token the route starts and ends at
    pub fn anchor(&self) -> usize {
        self.path[0]
    }

    pub fn hop_count(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Product of the rates along the route
    pub fn expected_return(&self) -> f64 {
        (-self.total_weight).exp()
    }

    pub fn profit_percentage(&self) -> f64 {
        (self.expected_return() - 1.0) * 100.0
    }

    /// Check the route against this tick's weights:
    /// - closed, with at least one intermediate token
    /// - every hop is a quoted pair
    /// - intermediate tokens are distinct and never the anchor
    /// - total weight strictly negative
    pub fn is_valid(&self, weights: &WeightMatrix) -> bool {
        if self.path.len() < 3 || self.path.first() != self.path.last() {
            return false;
        }

        let Some(total) = weights.path_weight(&self.path) else {
            debug!("Cycle crosses an unquoted pair - invalid");
            return false;
        };

        let intermediate = &self.path[1..self.path.len() - 1];
        let mut seen = intermediate.to_vec();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != intermediate.len() || intermediate.contains(&self.anchor()) {
            debug!("Cycle revisits a token - invalid");
            return false;
        }

        total < 0.0
    }
}

/// Turn a raw predecessor walk into a forward trade route.
///
/// The anchor is `src` when the cycle passes through it, otherwise the
/// vertex the detector landed on. The walk is rotated to end at the anchor,
/// the anchor is stripped to leave the raw legs, the legs are reversed into
/// trade order, and the anchor is added at both ends. The result is always
/// `legs + 2` long and uses exactly the edges the detector found.
pub fn normalize(raw: &NegativeCycle, src: usize, weights: &WeightMatrix) -> Cycle {
    let anchor = if raw.contains(src) { src } else { raw.cycle_node() };

    let vertices = raw.vertices();
    let start = vertices.iter().position(|&v| v == anchor).unwrap_or(0);

    // Backwards from the anchor: anchor <- legs[0] <- legs[1] <- ... <- anchor
    let legs: Vec<usize> = vertices[start..]
        .iter()
        .chain(&vertices[..start])
        .skip(1)
        .copied()
        .collect();

    let mut path = Vec::with_capacity(legs.len() + 2);
    path.push(anchor);
    path.extend(legs.iter().rev());
    path.push(anchor);

    let total_weight = weights.path_weight(&path).unwrap_or(f64::INFINITY);

    Cycle { path, total_weight }
}

/// "USDC → WETH → DAI → USDC"
pub fn format_route(path: &[usize], addresses: &[Address], names: &dyn TokenNames) -> String {
    path.iter()
        .map(|&i| match addresses.get(i) {
            Some(address) => names.display_name(address),
            None => format!("#{}", i),
        })
        .collect::<Vec<_>>()
        .join(" → ")
}
