//! Price Store
//!
//! Step 1.1: The Quote Book
//!
//! Collects directed quotes per venue and turns them into a dense tick
//! snapshot: tokens ordered by address, best rate per pair, 1.0 on the
//! diagonal and +inf wherever nobody quotes.
//!
//! Now with SANITY CHECKS so a broken quote never reaches the matrix.

use alloy_primitives::Address;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

use super::{RateMatrix, TickSnapshot, Token};
use crate::error::TickError;
use crate::pipeline::{TickReport, TickSink};

// Prices outside this band are almost always a decimals bug
const MAX_REASONABLE_RATE: f64 = 1e12;
const MIN_REASONABLE_RATE: f64 = 1e-12;

/// Directed quotes keyed by (from, to), then by venue
#[derive(Debug, Default)]
pub struct PriceStore {
    quotes: HashMap<(Address, Address), HashMap<String, f64>>,
    tokens: BTreeSet<Address>,
}

impl PriceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert one directed quote. Returns false if the rate is rejected.
    pub fn insert(&mut self, from: Address, to: Address, venue: &str, rate: f64) -> bool {
        if from == to {
            return false;
        }

        // 1. Rate must be positive and finite
        if rate <= 0.0 || !rate.is_finite() {
            warn!("Rejected {} quote {:?} -> {:?}: rate {}", venue, from, to, rate);
            return false;
        }

        // 2. Rate should be "reasonable"
        if !(MIN_REASONABLE_RATE..=MAX_REASONABLE_RATE).contains(&rate) {
            warn!(
                "Rate {:.2e} on {} for {:?} -> {:?} - likely decimal bug!",
                rate, venue, from, to
            );
            return false;
        }

        self.tokens.insert(from);
        self.tokens.insert(to);
        self.quotes
            .entry((from, to))
            .or_default()
            .insert(venue.to_string(), rate);
        true
    }

    /// Forget both directions of a pair on every venue
    pub fn remove_pair(&mut self, a: Address, b: Address) {
        self.quotes.remove(&(a, b));
        self.quotes.remove(&(b, a));
    }

    /// Best rate from `from` to `to` across venues
    pub fn rate(&self, from: Address, to: Address) -> f64 {
        if from == to {
            return 1.0;
        }
        self.quotes
            .get(&(from, to))
            .and_then(|venues| venues.values().copied().reduce(f64::max))
            .unwrap_or(f64::INFINITY)
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    /// Picture of the book as one tick
    pub fn snapshot(&self, timestamp: u64) -> TickSnapshot {
        let addresses: Vec<Address> = self.tokens.iter().copied().collect();
        let size = addresses.len();

        let mut rates = RateMatrix::unquoted(size);
        for (row, &from) in addresses.iter().enumerate() {
            for (col, &to) in addresses.iter().enumerate() {
                if row != col {
                    rates.set(row, col, self.rate(from, to));
                }
            }
        }

        debug!(
            "Snapshot at {}: {} tokens, {} quoted pairs",
            timestamp,
            size,
            rates.quoted_pairs()
        );

        TickSnapshot {
            timestamp,
            tokens: Token::from_addresses(&addresses),
            rates,
        }
    }

    /// Snapshot the book and hand it to a sink as one tick
    pub fn dispatch(&self, sink: &mut dyn TickSink, timestamp: u64) -> Result<TickReport, TickError> {
        let snapshot = self.snapshot(timestamp);
        sink.on_tick(&snapshot.rates, &snapshot.tokens, snapshot.size(), timestamp)
    }
}
