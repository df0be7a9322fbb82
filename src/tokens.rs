//! Token name resolution
//!
//! Addresses are opaque to the detector. Names are only looked up when an
//! opportunity is reported, and a miss never blocks reporting: it falls
//! back to a shortened address.

use alloy_primitives::{address, Address};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// A well-known token
#[derive(Debug, Clone, Copy)]
pub struct KnownToken {
    pub symbol: &'static str,
    pub address: Address,
}

lazy_static! {
    /// Mainnet base tokens plus a few blue chips
    static ref KNOWN_TOKENS: Vec<KnownToken> = vec![
        KnownToken { symbol: "WETH", address: address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2") },
        KnownToken { symbol: "USDC", address: address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48") },
        KnownToken { symbol: "USDT", address: address!("dAC17F958D2ee523a2206206994597C13D831ec7") },
        KnownToken { symbol: "DAI", address: address!("6B175474E89094C44Da98b954EedcdeCB5BE3830") },
        KnownToken { symbol: "WBTC", address: address!("2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599") },
        KnownToken { symbol: "wstETH", address: address!("7f39C581F595B53c5cb19bD0b3f8dA6c935E2Ca0") },
        KnownToken { symbol: "LINK", address: address!("514910771AF9Ca656af840dff83E8264EcF986CA") },
        KnownToken { symbol: "UNI", address: address!("1f9840a85d5aF5bf1D1762F925BDADdC4201F984") },
        KnownToken { symbol: "AAVE", address: address!("7Fc66500c84A76Ad7e9c93437bFc5Ac33E2DDaE9") },
        KnownToken { symbol: "MKR", address: address!("9f8F72aA9304c8B593d555F12eF6589cC3A579A2") },
    ];

    static ref KNOWN_SYMBOLS: HashMap<Address, &'static str> = KNOWN_TOKENS
        .iter()
        .map(|t| (t.address, t.symbol))
        .collect();
}

pub fn known_tokens() -> &'static [KnownToken] {
    &KNOWN_TOKENS
}

/// Address → display name lookup, supplied by the host
pub trait TokenNames {
    /// `None` is a resolution miss
    fn resolve(&self, address: &Address) -> Option<String>;

    /// Resolved name, or a shortened address on a miss
    fn display_name(&self, address: &Address) -> String {
        self.resolve(address).unwrap_or_else(|| short_address(address))
    }
}

/// `0x1a2b3c…` marker for tokens without a name
pub fn short_address(address: &Address) -> String {
    format!("0x{}…", hex::encode(&address[..3]))
}

/// Known symbols plus user-supplied overrides
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    overrides: HashMap<Address, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a symbol
    pub fn insert(&mut self, address: Address, symbol: impl Into<String>) {
        self.overrides.insert(address, symbol.into());
    }

    pub fn with_overrides<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (Address, S)>,
        S: Into<String>,
    {
        let mut table = Self::new();
        for (address, symbol) in entries {
            table.insert(address, symbol);
        }
        table
    }

    pub fn len(&self) -> usize {
        KNOWN_SYMBOLS.len() + self.overrides.len()
    }
}

impl TokenNames for SymbolTable {
    fn resolve(&self, address: &Address) -> Option<String> {
        self.overrides
            .get(address)
            .cloned()
            .or_else(|| KNOWN_SYMBOLS.get(address).map(|s| s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_symbols_resolve() {
        let table = SymbolTable::new();
        let weth = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
        assert_eq!(table.resolve(&weth).as_deref(), Some("WETH"));
        assert_eq!(table.display_name(&weth), "WETH");
    }

    #[test]
    fn test_miss_falls_back_to_short_address() {
        let table = SymbolTable::new();
        let unknown = Address::repeat_byte(0xab);
        assert!(table.resolve(&unknown).is_none());
        assert_eq!(table.display_name(&unknown), "0xababab…");
    }

    #[test]
    fn test_overrides_win() {
        let usdc = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
        let table = SymbolTable::with_overrides([(usdc, "USDC.e"), (Address::ZERO, "ZERO")]);
        assert_eq!(table.display_name(&usdc), "USDC.e");
        assert_eq!(table.display_name(&Address::ZERO), "ZERO");
        assert_eq!(table.len(), known_tokens().len() + 2);
    }
}
