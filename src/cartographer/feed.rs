//! Rate Feeds
//!
//! Step 1.2: The Wire
//!
//! Where ticks come from when no live server is attached:
//! - JSON-lines snapshot files, one tick per line
//! - a seeded synthetic market
//!
//! Each feed replays as its own task against a shared pipeline.

use alloy_primitives::Address;
use eyre::{eyre, Result, WrapErr};
use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{RateMatrix, TickSnapshot, Token};
use crate::pipeline::{SharedPipeline, TickSink};

/// On-disk form of one tick. `null` rates mean "no quote".
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotLine {
    timestamp: u64,
    tokens: Vec<Address>,
    rates: Vec<Vec<Option<f64>>>,
}

impl SnapshotLine {
    fn into_snapshot(self) -> Result<TickSnapshot> {
        let rows = self
            .rates
            .into_iter()
            .map(|row| row.into_iter().map(|r| r.unwrap_or(f64::INFINITY)).collect())
            .collect();
        let rates = RateMatrix::from_rows(rows)?;
        if rates.size() != self.tokens.len() {
            return Err(eyre!(
                "{} tokens but a {}x{} rate matrix",
                self.tokens.len(),
                rates.size(),
                rates.size()
            ));
        }

        Ok(TickSnapshot {
            timestamp: self.timestamp,
            tokens: Token::from_addresses(&self.tokens),
            rates,
        })
    }

    fn from_snapshot(snapshot: &TickSnapshot) -> Self {
        let size = snapshot.rates.size();
        let rates = (0..size)
            .map(|i| {
                (0..size)
                    .map(|j| Some(snapshot.rates.get(i, j)).filter(|r| r.is_finite()))
                    .collect()
            })
            .collect();

        Self {
            timestamp: snapshot.timestamp,
            tokens: snapshot.addresses(),
            rates,
        }
    }
}

pub fn parse_snapshot(line: &str) -> Result<TickSnapshot> {
    let parsed: SnapshotLine = serde_json::from_str(line)?;
    parsed.into_snapshot()
}

pub fn snapshot_to_line(snapshot: &TickSnapshot) -> Result<String> {
    Ok(serde_json::to_string(&SnapshotLine::from_snapshot(snapshot))?)
}

/// Load every tick from a JSON-lines file. Blank lines are skipped.
pub fn load_snapshots<P: AsRef<Path>>(path: P) -> Result<Vec<TickSnapshot>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("reading feed {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            parse_snapshot(line).wrap_err_with(|| format!("{}:{}", path.display(), n + 1))
        })
        .collect()
}

/// Write ticks as JSON lines, creating the parent directory if needed
pub fn save_snapshots<P: AsRef<Path>>(path: P, snapshots: &[TickSnapshot]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut content = String::new();
    for snapshot in snapshots {
        content.push_str(&snapshot_to_line(snapshot)?);
        content.push('\n');
    }
    fs::write(path, content).wrap_err_with(|| format!("writing feed {}", path.display()))?;
    Ok(())
}

/// Seeded random market with near-reciprocal quotes
pub struct SyntheticMarket {
    rng: StdRng,
    addresses: Vec<Address>,
    /// Max relative deviation of a reverse quote from the exact reciprocal
    variation: f64,
    /// Chance that a pair is left unquoted
    sparsity: f64,
    /// Chance per tick of planting a profitable triangle
    injection: f64,
}

impl SyntheticMarket {
    pub fn new(size: usize, seed: u64) -> Self {
        let addresses = (0..size).map(synthetic_address).collect();
        Self {
            rng: StdRng::seed_from_u64(seed),
            addresses,
            variation: 0.05,
            sparsity: 0.0,
            injection: 0.0,
        }
    }

    pub fn with_variation(mut self, variation: f64) -> Self {
        self.variation = variation;
        self
    }

    pub fn with_sparsity(mut self, sparsity: f64) -> Self {
        self.sparsity = sparsity;
        self
    }

    pub fn with_injection(mut self, injection: f64) -> Self {
        self.injection = injection;
        self
    }

    /// Next tick: a fresh random rate for every pair
    pub fn tick(&mut self, timestamp: u64) -> TickSnapshot {
        let size = self.addresses.len();
        let mut rates = RateMatrix::unquoted(size);

        for i in 0..size {
            for j in (i + 1)..size {
                if self.sparsity > 0.0 && self.rng.gen_bool(self.sparsity) {
                    continue;
                }
                let rate = self.rng.gen_range(0.1..10.0);
                let skew = if self.variation > 0.0 {
                    1.0 + self.rng.gen_range(-self.variation..self.variation)
                } else {
                    1.0
                };
                rates.set(i, j, rate);
                rates.set(j, i, skew / rate);
            }
        }

        if size >= 3 && self.injection > 0.0 && self.rng.gen_bool(self.injection) {
            self.inject_triangle(&mut rates);
        }

        TickSnapshot {
            timestamp,
            tokens: Token::from_addresses(&self.addresses),
            rates,
        }
    }
}

impl SyntheticMarket {
    /// Quote a random triangle a -> b -> c -> a so it returns INJECTED_MARGIN
    fn inject_triangle(&mut self, rates: &mut RateMatrix) {
        let size = self.addresses.len();
        let a = self.rng.gen_range(0..size);
        let b = (a + self.rng.gen_range(1..size)) % size;
        let c = (0..size).find(|&c| c != a && c != b).unwrap_or(a);

        let ab = self.rng.gen_range(0.1..10.0);
        let bc = self.rng.gen_range(0.1..10.0);
        rates.set(a, b, ab);
        rates.set(b, c, bc);
        rates.set(c, a, (1.0 + INJECTED_MARGIN) / (ab * bc));
        debug!("Injected triangle {} -> {} -> {} -> {}", a, b, c, a);
    }
}

const INJECTED_MARGIN: f64 = 0.02;

fn synthetic_address(index: usize) -> Address {
    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&(index as u64 + 1).to_be_bytes());
    Address::from(bytes)
}

/// Per-feed replay tally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedStats {
    pub ticks: usize,
    pub detected: usize,
    pub drained: usize,
    pub faults: usize,
}

/// Push snapshots into the pipeline, one per interval.
///
/// A faulted tick is counted and skipped; it never stops the feed.
pub async fn replay(
    name: String,
    snapshots: Vec<TickSnapshot>,
    mut pipeline: SharedPipeline,
    interval: Duration,
    progress: Option<ProgressBar>,
) -> FeedStats {
    let mut stats = FeedStats::default();
    let mut ticker = tokio::time::interval(interval);

    info!("Feed {}: replaying {} ticks", name, snapshots.len());

    for snapshot in &snapshots {
        ticker.tick().await;
        stats.ticks += 1;

        match pipeline.on_tick(
            &snapshot.rates,
            &snapshot.tokens,
            snapshot.size(),
            snapshot.timestamp,
        ) {
            Ok(report) => {
                if report.detected() {
                    stats.detected += 1;
                }
                stats.drained += report.drained;
            }
            Err(e) if e.is_data_fault() => {
                stats.faults += 1;
                debug!("Feed {}: tick {} faulted: {}", name, snapshot.timestamp, e);
            }
            Err(e) => {
                stats.faults += 1;
                warn!("Feed {}: tick {} rejected: {}", name, snapshot.timestamp, e);
            }
        }

        if let Some(bar) = &progress {
            bar.inc(1);
        }
    }

    if stats.faults > 0 {
        warn!("Feed {}: {} of {} ticks faulted", name, stats.faults, stats.ticks);
    }
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Opportunity, OpportunitySink, TickPipeline};
    use crate::tokens::SymbolTable;

    const LINE: &str = r#"{"timestamp":3,"tokens":["0x0101010101010101010101010101010101010101","0x0202020202020202020202020202020202020202","0x0303030303030303030303030303030303030303"],"rates":[[1.0,2.0,null],[null,1.0,2.0],[0.5,null,1.0]]}"#;

    struct CountingSink(usize);

    impl OpportunitySink for CountingSink {
        fn record(&mut self, _opportunity: &Opportunity) {
            self.0 += 1;
        }

        fn flush(&mut self, _timestamp: u64) {}
    }

    #[test]
    fn test_parse_snapshot_maps_null_to_no_edge() {
        let snap = parse_snapshot(LINE).unwrap();
        assert_eq!(snap.timestamp, 3);
        assert_eq!(snap.size(), 3);
        assert_eq!(snap.tokens[1], Token::new(1, Address::repeat_byte(2)));
        assert_eq!(snap.rates.get(0, 1), 2.0);
        assert!(snap.rates.get(0, 2).is_infinite());
    }

    #[test]
    fn test_snapshot_line_round_trip() {
        let snap = parse_snapshot(LINE).unwrap();
        let line = snapshot_to_line(&snap).unwrap();
        assert_eq!(parse_snapshot(&line).unwrap(), snap);
    }

    #[test]
    fn test_recorded_feed_loads_back() {
        let path = std::env::temp_dir()
            .join(format!("arbiter-feed-{}", std::process::id()))
            .join("recorded.jsonl");
        let mut market = SyntheticMarket::new(4, 3).with_sparsity(0.3);
        let ticks: Vec<TickSnapshot> = (1..=3).map(|t| market.tick(t)).collect();

        save_snapshots(&path, &ticks).unwrap();
        let loaded = load_snapshots(&path).unwrap();
        assert_eq!(loaded, ticks);

        if let Some(dir) = path.parent() {
            let _ = fs::remove_dir_all(dir);
        }
    }

    #[test]
    fn test_parse_rejects_mismatched_tokens() {
        let bad = r#"{"timestamp":1,"tokens":["0x0101010101010101010101010101010101010101"],"rates":[[1.0,2.0],[0.5,1.0]]}"#;
        assert!(parse_snapshot(bad).is_err());

        let ragged = r#"{"timestamp":1,"tokens":[],"rates":[[1.0,2.0],[0.5]]}"#;
        assert!(parse_snapshot(ragged).is_err());
    }

    #[test]
    fn test_synthetic_market_is_seeded() {
        let a = SyntheticMarket::new(6, 42).tick(1);
        let b = SyntheticMarket::new(6, 42).tick(1);
        assert_eq!(a, b);

        for i in 0..6 {
            assert_eq!(a.rates.get(i, i), 1.0);
        }
        assert_eq!(a.rates.quoted_pairs(), 30);
    }

    #[test]
    fn test_exact_reciprocals_never_profit_much() {
        let mut market = SyntheticMarket::new(5, 1).with_variation(0.0).with_sparsity(0.2);
        let snap = market.tick(0);
        for i in 0..5 {
            for j in 0..5 {
                let (ab, ba) = (snap.rates.get(i, j), snap.rates.get(j, i));
                if ab.is_finite() {
                    assert!((ab * ba - 1.0).abs() < 1e-12);
                }
            }
        }
    }

    #[test]
    fn test_injected_triangle_is_profitable() {
        let mut market = SyntheticMarket::new(3, 7).with_variation(0.0).with_injection(1.0);
        let snap = market.tick(0);

        let orientations = [[0, 1, 2], [0, 2, 1]];
        let planted = orientations.iter().any(|&[a, b, c]| {
            let product = snap.rates.get(a, b) * snap.rates.get(b, c) * snap.rates.get(c, a);
            (product - 1.02).abs() < 1e-9
        });
        assert!(planted);
    }

    #[test]
    fn test_replay_counts_faults_and_detections() {
        let good = parse_snapshot(LINE).unwrap();
        let mut faulty = good.clone();
        faulty.timestamp = 4;
        faulty.rates.set(1, 2, 0.0);
        let mut later = good.clone();
        later.timestamp = 5;

        let pipeline = SharedPipeline::new(TickPipeline::new(
            CountingSink(0),
            Box::new(SymbolTable::new()),
        ));

        let stats = tokio_test::block_on(replay(
            "test".to_string(),
            vec![good, faulty, later],
            pipeline,
            Duration::from_millis(1),
            None,
        ));

        assert_eq!(
            stats,
            FeedStats { ticks: 3, detected: 2, drained: 2, faults: 1 }
        );
    }
}
