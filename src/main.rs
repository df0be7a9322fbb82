//! The Arbiter - Negative-Cycle Arbitrage Detector
//!
//! Run with: cargo run -- --synthetic 8 --ticks 50
//!
//! Replays rate feeds through one shared pipeline: every tick is turned
//! into -ln(rate) weights, searched with Bellman-Ford from the base token,
//! and any profitable cycle is queued and journaled.

use alloy_primitives::Address;
use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use futures::future::join_all;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod brain;
mod cartographer;
mod config;
mod error;
mod executor;
mod pipeline;
mod tokens;

use cartographer::{
    load_snapshots, replay, save_snapshots, FeedStats, PriceStore, SyntheticMarket, TickSnapshot,
};
use config::Config;
use error::TickError;
use executor::OpportunityJournal;
use pipeline::{SharedPipeline, TickOutcome, TickPipeline, TickReport};
use tokens::known_tokens;

#[derive(Parser, Debug)]
#[command(name = "arbiter")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file (default: environment)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON-lines snapshot file to replay (repeatable)
    #[arg(short, long)]
    feed: Vec<PathBuf>,

    /// Also replay a synthetic market with this many tokens
    #[arg(long)]
    synthetic: Option<usize>,

    /// Ticks to generate for the synthetic market
    #[arg(long, default_value_t = 20)]
    ticks: u64,

    /// Seed for the synthetic market
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Chance per synthetic tick of a planted profitable triangle
    #[arg(long, default_value_t = 0.25)]
    inject: f64,

    /// Max deviation of a synthetic reverse quote from the reciprocal
    #[arg(long, default_value_t = 0.05)]
    variation: f64,

    /// Chance that a synthetic pair is left unquoted
    #[arg(long, default_value_t = 0.0)]
    sparsity: f64,

    /// Write the synthetic ticks to this JSON-lines file
    #[arg(long)]
    record: Option<PathBuf>,

    /// Write the effective configuration to this TOML file
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Override the base token address
    #[arg(long)]
    base_token: Option<String>,
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" ⚖️  THE ARBITER - Negative-Cycle Arbitrage Detector").cyan().bold()
    );
    println!(
        "{}",
        style("    -ln(rate) weights | Bellman-Ford | Per-tick queue").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

/// A small quote book over well-known tokens with one stale WETH/DAI quote
fn demo_store() -> Option<(PriceStore, Address, Address)> {
    let symbol = |s: &str| {
        known_tokens()
            .iter()
            .find(|t| t.symbol == s)
            .map(|t| t.address)
    };

    let (weth, usdc, dai) = (symbol("WETH")?, symbol("USDC")?, symbol("DAI")?);
    let mut store = PriceStore::new();
    store.insert(weth, usdc, "uniswap", 3500.0);
    store.insert(usdc, weth, "uniswap", 1.0 / 3510.0);
    store.insert(usdc, dai, "curve", 0.9998);
    store.insert(dai, usdc, "curve", 0.9997);
    store.insert(weth, dai, "sushiswap", 3480.0);
    store.insert(dai, weth, "sushiswap", 1.0 / 3400.0);
    Some((store, weth, dai))
}

fn print_outcome(label: &str, report: Result<TickReport, TickError>) {
    match report {
        Ok(report) => match report.outcome {
            TickOutcome::Detected { path, expected_return } => println!(
                "{} {}: cycle {:?} returns {:.4}x",
                style("💰").green(),
                label,
                path,
                expected_return
            ),
            TickOutcome::NoOpportunity => {
                println!("{} {}: quote book is consistent", style("○").yellow(), label)
            }
        },
        Err(e) => println!("{} {}: quote book rejected: {}", style("✗").red(), label, e),
    }
}

fn feed_bar(multi: &MultiProgress, name: &str, len: usize) -> Result<ProgressBar> {
    let bar = multi.add(ProgressBar::new(len as u64));
    bar.set_style(
        ProgressStyle::default_bar()
            .template("  {prefix:>12.cyan} [{bar:30.cyan/blue}] {pos}/{len} ticks")?
            .progress_chars("=> "),
    );
    bar.set_prefix(name.to_string());
    Ok(bar)
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("arbiter=info".parse()?),
        )
        .init();

    let args = Args::parse();

    print_banner();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(base) = &args.base_token {
        config.base_token = Some(base.clone());
    }
    let chances = [
        ("--inject", args.inject),
        ("--variation", args.variation),
        ("--sparsity", args.sparsity),
    ];
    for (flag, chance) in chances {
        if !(0.0..=1.0).contains(&chance) {
            return Err(eyre!("{} must be between 0 and 1, got {}", flag, chance));
        }
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file or --config");
        return Err(e);
    }

    // Print configuration summary
    config.print_summary();
    println!();

    if let Some(path) = &args.save_config {
        config.save_to_file(path)?;
        println!("{} Configuration saved to {}", style("✓").green(), path.display());
    }

    // =============================================
    // PHASE 1: THE CARTOGRAPHER
    // =============================================
    println!(
        "{}",
        style("═══ PHASE 1: THE CARTOGRAPHER ═══").blue().bold()
    );
    println!();

    let mut feeds: Vec<(String, Vec<TickSnapshot>)> = Vec::new();

    for path in &args.feed {
        let snapshots = load_snapshots(path)?;
        println!(
            "{} Loaded {} ticks from {}",
            style("✓").green(),
            snapshots.len(),
            path.display()
        );
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        feeds.push((name, snapshots));
    }

    if let Some(size) = args.synthetic {
        let mut market = SyntheticMarket::new(size, args.seed)
            .with_variation(args.variation)
            .with_sparsity(args.sparsity)
            .with_injection(args.inject);
        let snapshots: Vec<TickSnapshot> = (1..=args.ticks).map(|t| market.tick(t)).collect();
        println!(
            "{} Generated {} synthetic ticks over {} tokens (seed {})",
            style("✓").green(),
            snapshots.len(),
            size,
            args.seed
        );
        if let Some(path) = &args.record {
            save_snapshots(path, &snapshots)?;
            println!("{} Recorded synthetic ticks to {}", style("✓").green(), path.display());
        }
        feeds.push(("synthetic".to_string(), snapshots));
    }

    // =============================================
    // PHASE 2: THE PIPELINE
    // =============================================
    println!();
    println!(
        "{}",
        style("═══ PHASE 2: THE PIPELINE ═══").magenta().bold()
    );
    println!();

    let journal = OpportunityJournal::new(config.symbol_table()?, config.journal_path());
    let names = config.symbol_table()?;
    info!("{} token names known", names.len());
    let engine = Arc::new(Mutex::new(
        TickPipeline::new(journal, Box::new(names))
            .with_base(config.base_token()?)
            .with_max_tokens(config.max_tokens),
    ));
    let mut pipeline = SharedPipeline::from_arc(engine.clone());

    if feeds.is_empty() {
        println!(
            "{}",
            style("No feeds given (--feed / --synthetic): checking the built-in quote book").yellow()
        );
        let Some((mut store, weth, dai)) = demo_store() else {
            return Err(eyre!("built-in token table is missing WETH, USDC or DAI"));
        };
        println!("  {} tokens quoted", store.token_count());
        print_outcome("With the stale WETH/DAI quote", store.dispatch(&mut pipeline, 0));

        store.remove_pair(weth, dai);
        print_outcome("Without it", store.dispatch(&mut pipeline, 1));
        return Ok(());
    }

    println!(
        "{}",
        style(format!("Replaying {} feeds every {:?}...", feeds.len(), config.tick_interval())).magenta()
    );
    let start = Instant::now();

    let multi = MultiProgress::new();
    let mut handles = Vec::with_capacity(feeds.len());
    let mut names = Vec::with_capacity(feeds.len());
    for (name, snapshots) in feeds {
        let bar = feed_bar(&multi, &name, snapshots.len())?;
        names.push(name.clone());
        handles.push(tokio::spawn(replay(
            name,
            snapshots,
            pipeline.clone(),
            config.tick_interval(),
            Some(bar),
        )));
    }

    let mut total = FeedStats::default();
    for (name, result) in names.iter().zip(join_all(handles).await) {
        match result {
            Ok(stats) => {
                info!(
                    "Feed {} done: {} ticks, {} detected, {} faults",
                    name, stats.ticks, stats.detected, stats.faults
                );
                total.ticks += stats.ticks;
                total.detected += stats.detected;
                total.drained += stats.drained;
                total.faults += stats.faults;
            }
            Err(e) => warn!("Feed {} task failed: {}", name, e),
        }
    }

    // =============================================
    // SUMMARY
    // =============================================
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!("{}", style(" ✅ REPLAY COMPLETE").green().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!();
    println!("Summary:");
    println!("  • Feeds: {} in {:?}", names.len(), start.elapsed());
    println!("  • Ticks processed: {}", total.ticks);
    println!("  • Ticks with a cycle: {}", total.detected);
    println!("  • Opportunities drained: {}", total.drained);
    println!("  • Faulted ticks: {}", total.faults);
    {
        let engine = engine.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !engine.queue().is_empty() {
            warn!("{} opportunities still queued", engine.queue().len());
        }
        let journal = engine.sink();
        println!("  • Opportunities journaled: {}", journal.total());
        if journal.write_failures() > 0 {
            println!(
                "  • {}",
                style(format!("Journal write failures: {}", journal.write_failures())).red()
            );
        }
    }
    if let Some(path) = config.journal_path() {
        println!();
        println!(
            "{} Opportunities journaled to: {}",
            style("📝").cyan(),
            path.display()
        );
    }
    println!();

    Ok(())
}
