//! Scan command - one stage-1 universe pass, or an offline batch scan
//! over downloaded CSV files

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use stock_screener::config::ScreenerConfig;
use stock_screener::filters::{StageOneOutcome, StageTwoOutcome};
use stock_screener::scanner::{scan_offline_with_progress, OfflineResult, Scanner};

use super::{load_config, resolve_symbols};

pub fn run(
    config_path: Option<String>,
    data_dir: Option<String>,
    symbols: Option<String>,
) -> Result<()> {
    let config = load_config(config_path)?;

    match data_dir {
        Some(dir) => run_offline(&config, &dir, symbols),
        None => run_online(config),
    }
}

fn run_online(config: ScreenerConfig) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let scanner = Scanner::new(config)?;
    let summary = runtime.block_on(scanner.run_stage_one())?;

    println!("\n{}", "=".repeat(60));
    println!("STAGE 1 SCAN COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Scanned:        {}", summary.scanned);
    println!("  Passed filters: {}", summary.passed);
    println!("  Signals:        {}", summary.signals);
    println!("  Queued:         {}", summary.queued);
    println!("  Skipped:        {}", summary.skipped);
    println!("  Errors:         {}", summary.errors);
    println!("  Duration:       {:.1}s", summary.duration_secs);
    println!("{}", "=".repeat(60));

    Ok(())
}

fn run_offline(config: &ScreenerConfig, data_dir: &str, symbols: Option<String>) -> Result<()> {
    let symbols = resolve_symbols(config, symbols)?;

    println!("\n{}", "=".repeat(60));
    println!("OFFLINE SCAN");
    println!("{}", "=".repeat(60));
    println!("  Data dir: {}", data_dir);
    println!("  Symbols:  {}", symbols.len());
    println!("{}\n", "=".repeat(60));

    let pb = ProgressBar::new(symbols.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("🔍 {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}]")
            .unwrap()
            .progress_chars("█░ "),
    );

    let results = scan_offline_with_progress(config, data_dir, &symbols, pb)?;

    let signals = results
        .iter()
        .filter(|r| matches!(r.stage_one, StageOneOutcome::Signal(_)))
        .count();
    let confirmed = results
        .iter()
        .filter(|r| matches!(r.stage_two, StageTwoOutcome::Confirmed { .. }))
        .count();

    println!("\n{}", "=".repeat(60));
    println!("OFFLINE SCAN RESULTS");
    println!("{}", "=".repeat(60));
    for result in &results {
        println!(
            "  {:<8} {:>5} bars | stage 1: {:<28} | stage 2: {}",
            result.symbol.as_str(),
            result.bars,
            describe_stage_one(result),
            describe_stage_two(result),
        );
    }
    println!("{}", "-".repeat(60));
    println!(
        "  {} symbols scanned, {} stage-1 signals, {} WaveTrend confirmations",
        results.len(),
        signals,
        confirmed
    );
    println!("{}", "=".repeat(60));

    Ok(())
}

fn describe_stage_one(result: &OfflineResult) -> String {
    match &result.stage_one {
        StageOneOutcome::Signal(snapshot) => format!(
            "SIGNAL (D={:.3} MFI={:.1})",
            snapshot.stoch_d, snapshot.mfi
        ),
        StageOneOutcome::NoSignal => "passed, no signal".to_string(),
        StageOneOutcome::Rejected(reason) => format!("rejected: {}", reason),
    }
}

fn describe_stage_two(result: &OfflineResult) -> String {
    match &result.stage_two {
        StageTwoOutcome::Confirmed { wt1, wt2 } => {
            format!("CONFIRMED (WT1={:.1} WT2={:.1})", wt1, wt2)
        }
        StageTwoOutcome::NoSignal => "no cross".to_string(),
        StageTwoOutcome::WeeklyOverbought { weekly_wt1 } => {
            format!("weekly veto (WT1={:.1})", weekly_wt1)
        }
    }
}
