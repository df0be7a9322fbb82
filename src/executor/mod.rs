//! Phase 4: The Executor (reporting only)
//!
//! Drained opportunities end up here. Nothing is traded: each opportunity
//! is logged with resolved symbols and journaled for downstream tooling.

mod journal;

pub use journal::{JournalEntry, OpportunityJournal};
