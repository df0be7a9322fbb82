//! Tick-level error taxonomy
//!
//! Every variant aborts exactly one tick. Nothing here is fatal to the
//! process: the caller logs the fault and keeps feeding ticks.

use alloy_primitives::Address;
use thiserror::Error;

/// Faults that abort a single tick's detection
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TickError {
    /// A rate entry is zero, negative or NaN
    #[error("data fault: rate[{row}][{col}] = {rate} is not a positive rate")]
    DataFault { row: usize, col: usize, rate: f64 },

    /// Declared size, token count and matrix entries disagree
    #[error("shape mismatch: size {size}, {tokens} tokens, {entries} rate entries")]
    ShapeMismatch {
        size: usize,
        tokens: usize,
        entries: usize,
    },

    /// A token's index does not match its position in the tick
    #[error("token at position {position} carries index {index}")]
    TokenOrder { position: usize, index: usize },

    /// Token universe larger than the configured bound
    #[error("{size} tokens exceeds the configured maximum of {max}")]
    UniverseTooLarge { size: usize, max: usize },

    /// Source vertex outside the matrix
    #[error("source vertex {src} out of range for {size} tokens")]
    InvalidSource { src: usize, size: usize },

    /// Configured base token is not part of this tick's snapshot
    #[error("base token {0} not present in this tick")]
    UnknownBaseToken(Address),

    /// Predecessor walk hit an undefined link or never closed
    #[error("predecessor chain broken at vertex {vertex}")]
    BrokenPredecessorChain { vertex: usize },
}

impl TickError {
    /// Data faults come from the feed; everything else is a caller bug
    pub fn is_data_fault(&self) -> bool {
        matches!(self, TickError::DataFault { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_fault_message() {
        let err = TickError::DataFault { row: 1, col: 2, rate: 0.0 };
        assert_eq!(err.to_string(), "data fault: rate[1][2] = 0 is not a positive rate");
        assert!(err.is_data_fault());
        assert!(!TickError::InvalidSource { src: 4, size: 3 }.is_data_fault());
    }
}
