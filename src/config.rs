//! Configuration for the Arbiter
//!
//! Everything the detector and its reporting sink need, loaded from the
//! environment (and `.env`) or from a TOML file.

use alloy_primitives::Address;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::pipeline::BaseToken;
use crate::tokens::SymbolTable;

/// Main configuration struct for the Arbiter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Detection ==========
    /// Token cycles are searched from, by address. Wins over `base_index`.
    pub base_token: Option<String>,

    /// Matrix position of the base token when no address is given
    pub base_index: usize,

    /// Largest token universe a tick may carry
    pub max_tokens: usize,

    // ========== Reporting ==========
    /// Append opportunities to `journal_path`
    pub journal_enabled: bool,

    pub journal_path: String,

    // ========== Feeds ==========
    /// Replay pace per feed
    pub tick_interval_ms: u64,

    // ========== Names ==========
    /// Extra address -> symbol names for log output
    pub token_symbols: BTreeMap<String, String>,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Detection
            base_token: env::var("BASE_TOKEN").ok().filter(|s| !s.trim().is_empty()),
            base_index: env::var("BASE_INDEX")
                .unwrap_or_else(|_| "0".to_string())
                .parse()
                .unwrap_or(0),
            max_tokens: env::var("MAX_TOKENS")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .unwrap_or(256),

            // Reporting
            journal_enabled: env::var("JOURNAL_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            journal_path: env::var("JOURNAL_PATH")
                .unwrap_or_else(|_| "./logs/opportunities.jsonl".to_string()),
            token_symbols: env::var("TOKEN_SYMBOLS")
                .map(|s| Self::parse_token_symbols(&s))
                .unwrap_or_default(),

            // Feeds
            tick_interval_ms: env::var("TICK_INTERVAL_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .unwrap_or(500),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("reading config {}", path.display()))?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// `0xaddr=SYM,0xaddr=SYM`; malformed entries are dropped
    fn parse_token_symbols(raw: &str) -> BTreeMap<String, String> {
        raw.split(',')
            .filter_map(|entry| {
                let (address, symbol) = entry.split_once('=')?;
                let (address, symbol) = (address.trim(), symbol.trim());
                if address.is_empty() || symbol.is_empty() {
                    return None;
                }
                Some((address.to_string(), symbol.to_string()))
            })
            .collect()
    }

    /// Validate configuration before starting any feed
    pub fn validate(&self) -> Result<()> {
        if self.max_tokens < 2 {
            return Err(eyre!(
                "MAX_TOKENS must be at least 2 (currently {})",
                self.max_tokens
            ));
        }
        if self.base_index >= self.max_tokens {
            return Err(eyre!(
                "BASE_INDEX {} is outside a {}-token universe",
                self.base_index,
                self.max_tokens
            ));
        }
        if self.tick_interval_ms == 0 {
            return Err(eyre!("TICK_INTERVAL_MS must be positive"));
        }

        self.base_token()?;
        self.symbol_table()?;

        if self.journal_enabled && self.journal_path.trim().is_empty() {
            return Err(eyre!("JOURNAL_ENABLED requires a JOURNAL_PATH"));
        }

        Ok(())
    }

    /// Base token as the pipeline wants it
    pub fn base_token(&self) -> Result<BaseToken> {
        match &self.base_token {
            Some(raw) => Address::from_str(raw.trim())
                .map(BaseToken::Address)
                .map_err(|e| eyre!("Invalid BASE_TOKEN {}: {}", raw, e)),
            None => Ok(BaseToken::Index(self.base_index)),
        }
    }

    /// Known symbols plus the configured overrides
    pub fn symbol_table(&self) -> Result<SymbolTable> {
        let entries = self
            .token_symbols
            .iter()
            .map(|(raw, symbol)| {
                Address::from_str(raw.trim())
                    .map(|address| (address, symbol.clone()))
                    .map_err(|e| eyre!("Invalid TOKEN_SYMBOLS address {}: {}", raw, e))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SymbolTable::with_overrides(entries))
    }

    /// Where the journal goes, if anywhere
    pub fn journal_path(&self) -> Option<PathBuf> {
        self.journal_enabled.then(|| PathBuf::from(&self.journal_path))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let base = match &self.base_token {
            Some(address) => address.clone(),
            None => format!("index {}", self.base_index),
        };

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║              THE ARBITER - CONFIGURATION                   ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ DETECTION                                                  ║");
        println!("║ • Base Token:      {:^40} ║", truncate(&base, 40));
        println!("║ • Max Tokens:      {:^40} ║", self.max_tokens);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ REPORTING                                                  ║");
        println!("║ • Journal:         {:^40} ║",
            if self.journal_enabled { "✓ Enabled" } else { "✗ Log only" }
        );
        println!("║ • Journal Path:    {:^40} ║", truncate(&self.journal_path, 40));
        println!("║ • Symbol Overrides:{:^40} ║", self.token_symbols.len());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ FEEDS                                                      ║");
        println!("║ • Tick Interval:   {:>37} ms ║", self.tick_interval_ms);
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let head: String = s.chars().take(width - 1).collect();
        format!("{}…", head)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_token: None,
            base_index: 0,
            max_tokens: 256,
            journal_enabled: true,
            journal_path: "./logs/opportunities.jsonl".to_string(),
            token_symbols: BTreeMap::new(),
            tick_interval_ms: 500,
        }
    }
}

// ============================================
// TESTS
// ============================================
