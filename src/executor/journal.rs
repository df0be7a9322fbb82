//! Opportunity Journal
//!
//! Appends every drained opportunity to a JSON-lines file and logs each
//! tick's batch. Write failures are logged, never raised: the opportunity
//! has already left the queue.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::pipeline::{Opportunity, OpportunitySink};
use crate::tokens::{SymbolTable, TokenNames};

/// One journal line
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    pub recorded_at: DateTime<Utc>,
    pub tick: u64,
    pub path: Vec<usize>,
    pub route: Vec<Address>,
    pub symbols: Vec<String>,
    pub expected_return: f64,
    pub profit_pct: f64,
}

impl JournalEntry {
    pub fn new(opportunity: &Opportunity, names: &dyn TokenNames) -> Self {
        Self {
            recorded_at: Utc::now(),
            tick: opportunity.timestamp,
            path: opportunity.path.clone(),
            route: opportunity.route.clone(),
            symbols: opportunity.route.iter().map(|a| names.display_name(a)).collect(),
            expected_return: opportunity.expected_return(),
            profit_pct: opportunity.profit_percentage(),
        }
    }

    /// Append this entry to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

/// Reporting sink: logs routes, optionally journals them to disk
pub struct OpportunityJournal {
    names: SymbolTable,
    path: Option<PathBuf>,
    pending: usize,
    total: usize,
    write_failures: usize,
}

impl OpportunityJournal {
    pub fn new(names: SymbolTable, path: Option<PathBuf>) -> Self {
        Self {
            names,
            path,
            pending: 0,
            total: 0,
            write_failures: 0,
        }
    }

    /// Opportunities recorded since startup
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn write_failures(&self) -> usize {
        self.write_failures
    }
}

impl OpportunitySink for OpportunityJournal {
    fn record(&mut self, opportunity: &Opportunity) {
        let entry = JournalEntry::new(opportunity, &self.names);
        self.pending += 1;
        self.total += 1;

        debug!(
            "Recording tick {} route {} ({} hops)",
            entry.tick,
            entry.symbols.join(" → "),
            opportunity.len() - 1
        );

        if let Some(path) = &self.path {
            if let Err(e) = entry.append_to_file(path) {
                self.write_failures += 1;
                warn!("Failed to journal opportunity to {}: {}", path.display(), e);
            }
        }
    }

    fn flush(&mut self, timestamp: u64) {
        if self.pending > 0 {
            info!(
                "📝 Tick {}: {} opportunities ready ({} total)",
                timestamp, self.pending, self.total
            );
        }
        self.pending = 0;
    }
}
