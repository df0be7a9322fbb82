//! Diagnostic tool - Check the effective configuration
//!
//! Run with: cargo run --bin diagnose

use std::env;
use std::path::Path;

fn main() {
    println!("🔍 ARBITER DIAGNOSTIC CHECK\n");

    // Load .env
    let dotenv = dotenvy::dotenv().ok();

    println!("═══════════════════════════════════════════════════");
    println!("                  CONFIGURATION                     ");
    println!("═══════════════════════════════════════════════════\n");

    match &dotenv {
        Some(path) => println!("  .env: {}\n", path.display()),
        None => println!("  .env: not found (environment only)\n"),
    }

    // Key settings
    let checks = [
        ("BASE_TOKEN", "", "Base token address (wins over BASE_INDEX)"),
        ("BASE_INDEX", "0", "Matrix position of the base token"),
        ("MAX_TOKENS", "256", "Largest token universe per tick"),
        ("TICK_INTERVAL_MS", "500", "Replay pace per feed"),
        ("JOURNAL_ENABLED", "true", "Journal opportunities to disk?"),
        ("JOURNAL_PATH", "./logs/opportunities.jsonl", "Where the journal goes"),
        ("TOKEN_SYMBOLS", "", "Extra 0xaddr=SYM names"),
    ];

    for (key, default, desc) in checks {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        let is_default = env::var(key).is_err();
        let marker = if is_default { "(default)" } else { "(from env)" };
        let shown = if value.is_empty() { "<unset>" } else { value.as_str() };
        println!("  {}: {} {}", key, shown, marker);
        println!("    └─ {}\n", desc);
    }

    println!("═══════════════════════════════════════════════════");
    println!("                     CHECKS                         ");
    println!("═══════════════════════════════════════════════════\n");

    let mut problems = 0;

    if let Ok(base) = env::var("BASE_TOKEN") {
        let valid = base.trim().len() == 42
            && base.trim().starts_with("0x")
            && hex::decode(&base.trim()[2..]).is_ok();
        println!("  BASE_TOKEN format:  {}", if valid { "✅ OK" } else { "❌ Not a 20-byte hex address" });
        if !valid {
            problems += 1;
        }
    }

    let max_tokens: usize = env::var("MAX_TOKENS")
        .unwrap_or_else(|_| "256".to_string())
        .parse()
        .unwrap_or(0);
    let ok = max_tokens >= 2;
    println!("  MAX_TOKENS >= 2:    {}", if ok { "✅ OK" } else { "❌ Too small or unparsable" });
    if !ok {
        problems += 1;
    }

    let interval: u64 = env::var("TICK_INTERVAL_MS")
        .unwrap_or_else(|_| "500".to_string())
        .parse()
        .unwrap_or(0);
    let ok = interval > 0;
    println!("  TICK_INTERVAL_MS:   {}", if ok { "✅ OK" } else { "❌ Must be positive" });
    if !ok {
        problems += 1;
    }

    if let Ok(symbols) = env::var("TOKEN_SYMBOLS") {
        let entries = symbols.split(',').filter(|e| !e.trim().is_empty()).count();
        let parsed = symbols
            .split(',')
            .filter_map(|e| e.split_once('='))
            .filter(|(a, s)| !a.trim().is_empty() && !s.trim().is_empty())
            .count();
        println!("  TOKEN_SYMBOLS:      {} of {} entries usable", parsed, entries);
    }

    let journal = env::var("JOURNAL_ENABLED")
        .unwrap_or_else(|_| "true".to_string())
        .parse()
        .unwrap_or(true);
    if journal {
        let path = env::var("JOURNAL_PATH")
            .unwrap_or_else(|_| "./logs/opportunities.jsonl".to_string());
        let parent = Path::new(&path).parent().filter(|p| !p.as_os_str().is_empty());
        match parent {
            Some(dir) if !dir.exists() => {
                println!("  Journal directory:  ⚠️  {} will be created", dir.display())
            }
            _ => println!("  Journal directory:  ✅ OK"),
        }
        if Path::new(&path).exists() {
            println!("  Existing journal:   {}", path);
        }
    } else {
        println!("  Journal:            📋 log only");
    }

    if problems == 0 {
        println!("\n✅ Diagnostic complete!\n");
    } else {
        println!("\n❌ {} problem(s) found - the arbiter will refuse to start\n", problems);
    }
}
