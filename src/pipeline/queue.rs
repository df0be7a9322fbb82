//! Opportunity Queue
//!
//! Append-only, insertion-ordered, no dedup. Drained once per tick.

use alloy_primitives::Address;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::warn;

use crate::brain::Cycle;
use crate::cartographer::Token;

/// A detected cycle, frozen at the tick it was found in.
///
/// Token indices only mean something inside that tick, so the addresses
/// along the route are captured too.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub timestamp: u64,
    /// Token indices, first == last
    pub path: Vec<usize>,
    /// Addresses along `path`
    pub route: Vec<Address>,
    pub total_weight: f64,
}

impl Opportunity {
    pub fn new(timestamp: u64, cycle: &Cycle, tokens: &[Token]) -> Self {
        Self {
            timestamp,
            path: cycle.path.clone(),
            route: cycle.path.iter().map(|&i| tokens[i].address).collect(),
            total_weight: cycle.total_weight,
        }
    }

    pub fn len(&self) -> usize {
        self.path.len()
    }

    pub fn expected_return(&self) -> f64 {
        (-self.total_weight).exp()
    }

    pub fn profit_percentage(&self) -> f64 {
        (self.expected_return() - 1.0) * 100.0
    }
}

#[derive(Debug, Default)]
pub struct OpportunityQueue {
    items: VecDeque<Opportunity>,
    /// Tick of the batch being built; cleared on every drain
    batch_tick: Option<u64>,
}

impl OpportunityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, opportunity: Opportunity) {
        self.batch_tick = Some(opportunity.timestamp);
        self.items.push_back(opportunity);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Take everything queued, oldest first.
    ///
    /// A flush for a tick older than the batch currently held is stale: it
    /// returns `None` and leaves the queue alone. Once drained there is no
    /// batch, so the next tick drains whatever its timestamp.
    pub fn process(&mut self, timestamp: u64) -> Option<Vec<Opportunity>> {
        if let Some(batch) = self.batch_tick {
            if timestamp < batch {
                warn!(
                    "Stale flush for tick {} (batch {}), {} opportunities held",
                    timestamp,
                    batch,
                    self.items.len()
                );
                return None;
            }
        }
        self.batch_tick = None;
        Some(self.items.drain(..).collect())
    }
}
