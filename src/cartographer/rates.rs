//! Tick snapshot types
//!
//! A tick delivers a dense token list and a row-major N×N rate matrix.
//! Indices are only meaningful inside that one tick.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::TickError;

/// A token as seen by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    /// Dense position in this tick's matrix
    pub index: usize,
    /// Opaque identity, only used for name lookup
    pub address: Address,
}

impl Token {
    pub fn new(index: usize, address: Address) -> Self {
        Self { index, address }
    }

    /// Index a list of addresses in order
    pub fn from_addresses(addresses: &[Address]) -> Vec<Token> {
        addresses
            .iter()
            .enumerate()
            .map(|(index, &address)| Token::new(index, address))
            .collect()
    }
}

/// Row-major N×N exchange rates. Entry (i, j) is units of j per unit of i.
///
/// `f64::INFINITY` marks a pair with no quote.
#[derive(Debug, Clone, PartialEq)]
pub struct RateMatrix {
    size: usize,
    entries: Vec<f64>,
}

impl RateMatrix {
    /// Wrap a flat row-major buffer. Only the shape is checked here;
    /// entry values are checked by the weight transform.
    pub fn new(size: usize, entries: Vec<f64>) -> Result<Self, TickError> {
        if entries.len() != size * size {
            return Err(TickError::ShapeMismatch {
                size,
                tokens: size,
                entries: entries.len(),
            });
        }
        Ok(Self { size, entries })
    }

    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, TickError> {
        let size = rows.len();
        let mut entries = Vec::with_capacity(size * size);
        for row in rows {
            if row.len() != size {
                return Err(TickError::ShapeMismatch {
                    size,
                    tokens: size,
                    entries: row.len(),
                });
            }
            entries.extend(row);
        }
        Self::new(size, entries)
    }

    /// Identity rates on the diagonal, no edge anywhere else
    pub fn unquoted(size: usize) -> Self {
        let mut entries = vec![f64::INFINITY; size * size];
        for i in 0..size {
            entries[i * size + i] = 1.0;
        }
        Self { size, entries }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.entries[row * self.size + col]
    }

    pub fn set(&mut self, row: usize, col: usize, rate: f64) {
        self.entries[row * self.size + col] = rate;
    }

    pub fn entries(&self) -> &[f64] {
        &self.entries
    }

    /// Number of quoted off-diagonal pairs
    pub fn quoted_pairs(&self) -> usize {
        self.entries
            .iter()
            .enumerate()
            .filter(|(k, rate)| k / self.size != k % self.size && rate.is_finite())
            .count()
    }
}

/// One tick's worth of market data, owned by whoever delivers it
#[derive(Debug, Clone, PartialEq)]
pub struct TickSnapshot {
    pub timestamp: u64,
    pub tokens: Vec<Token>,
    pub rates: RateMatrix,
}

impl TickSnapshot {
    pub fn size(&self) -> usize {
        self.tokens.len()
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.tokens.iter().map(|t| t.address).collect()
    }
}

/// Check the tick contract: `size` tokens, `size`² rates, tokens in index order
pub fn check_shape(rates: &RateMatrix, tokens: &[Token], size: usize) -> Result<(), TickError> {
    if rates.size() != size || tokens.len() != size {
        return Err(TickError::ShapeMismatch {
            size,
            tokens: tokens.len(),
            entries: rates.entries().len(),
        });
    }

    if let Some((position, token)) = tokens
        .iter()
        .enumerate()
        .find(|(position, token)| token.index != *position)
    {
        return Err(TickError::TokenOrder {
            position,
            index: token.index,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(n: u8) -> Vec<Token> {
        let addresses: Vec<Address> = (0..n).map(Address::repeat_byte).collect();
        Token::from_addresses(&addresses)
    }

    #[test]
    fn test_new_rejects_wrong_entry_count() {
        let err = RateMatrix::new(3, vec![1.0; 8]).unwrap_err();
        assert_eq!(
            err,
            TickError::ShapeMismatch { size: 3, tokens: 3, entries: 8 }
        );
    }

    #[test]
    fn test_from_rows_is_row_major() {
        let m = RateMatrix::from_rows(vec![vec![1.0, 2.0], vec![0.5, 1.0]]).unwrap();
        assert_eq!(m.size(), 2);
        assert_eq!(m.get(0, 1), 2.0);
        assert_eq!(m.get(1, 0), 0.5);
        assert_eq!(m.entries(), &[1.0, 2.0, 0.5, 1.0]);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        assert!(RateMatrix::from_rows(vec![vec![1.0, 2.0], vec![1.0]]).is_err());
    }

    #[test]
    fn test_unquoted_has_identity_diagonal() {
        let m = RateMatrix::unquoted(3);
        assert_eq!(m.get(1, 1), 1.0);
        assert!(m.get(0, 2).is_infinite());
        assert_eq!(m.quoted_pairs(), 0);
    }

    #[test]
    fn test_check_shape() {
        let m = RateMatrix::unquoted(3);
        assert!(check_shape(&m, &tokens(3), 3).is_ok());

        let err = check_shape(&m, &tokens(2), 3).unwrap_err();
        assert!(matches!(err, TickError::ShapeMismatch { tokens: 2, .. }));

        let err = check_shape(&m, &tokens(3), 2).unwrap_err();
        assert!(matches!(err, TickError::ShapeMismatch { size: 2, .. }));

        let mut shuffled = tokens(3);
        shuffled.swap(0, 1);
        let err = check_shape(&m, &shuffled, 3).unwrap_err();
        assert_eq!(err, TickError::TokenOrder { position: 0, index: 1 });
    }
}
