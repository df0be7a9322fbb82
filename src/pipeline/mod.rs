//! Phase 3: The Pipeline
//!
//! One tick in, opportunities out:
//! weights -> Bellman-Ford -> normalize -> enqueue -> drain to the sink.
//!
//! The pipeline is synchronous and owns its queue. Several feeds can share
//! one pipeline through `SharedPipeline`, which runs each tick under a
//! single lock.

mod queue;

pub use queue::{Opportunity, OpportunityQueue};

use alloy_primitives::Address;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::brain::{format_route, normalize, NegativeCycleDetector, WeightMatrix};
use crate::cartographer::{check_shape, RateMatrix, Token};
use crate::error::TickError;
use crate::tokens::TokenNames;

/// Receives one rate snapshot per market update
pub trait TickSink {
    fn on_tick(
        &mut self,
        rates: &RateMatrix,
        tokens: &[Token],
        size: usize,
        timestamp: u64,
    ) -> Result<TickReport, TickError>;
}

/// Downstream consumer of drained opportunities
pub trait OpportunitySink {
    /// Called once per drained opportunity, oldest first
    fn record(&mut self, opportunity: &Opportunity);

    /// Everything recorded before this call is ready for `timestamp`
    fn flush(&mut self, timestamp: u64);
}

/// Which token cycles are searched from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseToken {
    /// Fixed matrix position
    Index(usize),
    /// Looked up in each tick's token list
    Address(Address),
}

impl Default for BaseToken {
    fn default() -> Self {
        BaseToken::Index(0)
    }
}

impl BaseToken {
    fn resolve(&self, tokens: &[Token]) -> Result<usize, TickError> {
        match *self {
            BaseToken::Index(index) if index < tokens.len() => Ok(index),
            BaseToken::Index(index) => Err(TickError::InvalidSource {
                src: index,
                size: tokens.len(),
            }),
            BaseToken::Address(address) => tokens
                .iter()
                .find(|t| t.address == address)
                .map(|t| t.index)
                .ok_or(TickError::UnknownBaseToken(address)),
        }
    }
}

/// What one tick produced
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A cycle was found and enqueued
    Detected { path: Vec<usize>, expected_return: f64 },
    NoOpportunity,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub timestamp: u64,
    pub outcome: TickOutcome,
    /// Opportunities handed to the sink during this tick
    pub drained: usize,
}

impl TickReport {
    pub fn detected(&self) -> bool {
        matches!(self.outcome, TickOutcome::Detected { .. })
    }
}

/// Per-tick orchestration around an owned opportunity queue
pub struct TickPipeline<S: OpportunitySink> {
    base: BaseToken,
    max_tokens: usize,
    queue: OpportunityQueue,
    sink: S,
    names: Box<dyn TokenNames + Send>,
}

impl<S: OpportunitySink> TickPipeline<S> {
    pub fn new(sink: S, names: Box<dyn TokenNames + Send>) -> Self {
        Self {
            base: BaseToken::default(),
            max_tokens: usize::MAX,
            queue: OpportunityQueue::new(),
            sink,
            names,
        }
    }

    pub fn with_base(mut self, base: BaseToken) -> Self {
        self.base = base;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn queue(&self) -> &OpportunityQueue {
        &self.queue
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Detect and enqueue. Nothing is enqueued unless the whole tick succeeds.
    fn detect(
        &mut self,
        rates: &RateMatrix,
        tokens: &[Token],
        size: usize,
        timestamp: u64,
    ) -> Result<TickOutcome, TickError> {
        check_shape(rates, tokens, size)?;
        if size > self.max_tokens {
            return Err(TickError::UniverseTooLarge {
                size,
                max: self.max_tokens,
            });
        }
        if size == 0 {
            debug!("Tick {}: empty universe", timestamp);
            return Ok(TickOutcome::NoOpportunity);
        }

        let src = self.base.resolve(tokens)?;
        let weights = WeightMatrix::from_rates(rates)?;

        let Some(raw) = NegativeCycleDetector::new(&weights, src)?.detect()? else {
            debug!("Tick {}: no opportunity", timestamp);
            return Ok(TickOutcome::NoOpportunity);
        };

        debug!("Tick {}: raw walk {:?} ({} entries)", timestamp, raw.walk(), raw.len());

        let cycle = normalize(&raw, src, &weights);
        if !cycle.is_valid(&weights) {
            warn!("Tick {}: discarded malformed cycle {:?}", timestamp, cycle.path);
            return Ok(TickOutcome::NoOpportunity);
        }

        let opportunity = Opportunity::new(timestamp, &cycle, tokens);
        let addresses: Vec<Address> = tokens.iter().map(|t| t.address).collect();
        info!(
            "Arbitrage opportunity at tick {}: {} ({} hops, {:+.4}%)",
            timestamp,
            format_route(&cycle.path, &addresses, self.names.as_ref()),
            cycle.hop_count(),
            cycle.profit_percentage()
        );

        let outcome = TickOutcome::Detected {
            path: cycle.path.clone(),
            expected_return: cycle.expected_return(),
        };
        self.queue.push(opportunity);
        Ok(outcome)
    }

    /// Hand every queued opportunity to the sink, then flush it.
    /// The sink is flushed once per successful tick, drained or not.
    fn process(&mut self, timestamp: u64) -> usize {
        let batch = self.queue.process(timestamp).unwrap_or_default();
        for opportunity in &batch {
            self.sink.record(opportunity);
        }
        self.sink.flush(timestamp);
        batch.len()
    }
}

impl<S: OpportunitySink> TickSink for TickPipeline<S> {
    fn on_tick(
        &mut self,
        rates: &RateMatrix,
        tokens: &[Token],
        size: usize,
        timestamp: u64,
    ) -> Result<TickReport, TickError> {
        let outcome = self.detect(rates, tokens, size, timestamp).map_err(|e| {
            warn!("Tick {} aborted: {}", timestamp, e);
            e
        })?;
        let drained = self.process(timestamp);

        Ok(TickReport {
            timestamp,
            outcome,
            drained,
        })
    }
}

/// A tick sink shared by several feeds. Each tick runs start to finish
/// under one lock.
#[derive(Clone)]
pub struct SharedPipeline {
    inner: Arc<Mutex<dyn TickSink + Send>>,
}

impl SharedPipeline {
    pub fn new<T: TickSink + Send + 'static>(sink: T) -> Self {
        Self::from_arc(Arc::new(Mutex::new(sink)))
    }

    /// Share a sink the caller keeps a handle to, e.g. to read its totals
    /// once the feeds are done
    pub fn from_arc<T: TickSink + Send + 'static>(sink: Arc<Mutex<T>>) -> Self {
        Self { inner: sink }
    }
}

impl TickSink for SharedPipeline {
    fn on_tick(
        &mut self,
        rates: &RateMatrix,
        tokens: &[Token],
        size: usize,
        timestamp: u64,
    ) -> Result<TickReport, TickError> {
        let mut sink = self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        sink.on_tick(rates, tokens, size, timestamp)
    }
}
