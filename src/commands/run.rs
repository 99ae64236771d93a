//! Run command - continuous two-stage scan loop
//!
//! Stage 1 runs once per calendar day; stage 2 re-checks the candidate
//! queue on every cycle. Ctrl+C stops the loop, including mid-cycle:
//! queued candidates and recorded alerts are persisted per symbol, so an
//! interrupted pass loses nothing.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info};

use stock_screener::scanner::Scanner;

use super::load_config;

pub fn run(config_path: Option<String>, interval_secs: u64) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    runtime.block_on(run_async(config_path, interval_secs))
}

async fn run_async(config_path: Option<String>, interval_secs: u64) -> Result<()> {
    let config = load_config(config_path)?;

    let universe_desc = match &config.universe.symbols_file {
        Some(path) => path.clone(),
        None => "built-in default universe".to_string(),
    };
    let alerts_desc = if config.telegram.is_configured() {
        "Telegram"
    } else {
        "disabled (log only)"
    };

    info!("════════════════════════════════════════════════");
    info!(" STOCK SCREENER - continuous mode");
    info!(" Universe:       {}", universe_desc);
    info!(" Cycle interval: {}s", interval_secs);
    info!(" Daily limit:    {} alerts", config.alerts.daily_limit);
    info!(" Alerts:         {}", alerts_desc);
    info!("════════════════════════════════════════════════");

    let scanner = Scanner::new(config)?;

    let shutdown_flag = Arc::new(AtomicBool::new(false));
    let shutdown_flag_clone = shutdown_flag.clone();
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, stopping after the current symbol...");
                shutdown_flag_clone.store(true, Ordering::SeqCst);
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => {
                error!("Error setting up signal handler: {}", e);
            }
        }
    });

    let mut cycle_interval = interval(Duration::from_secs(interval_secs));
    let mut cycle: u32 = 0;
    let mut last_stage_one: Option<NaiveDate> = None;

    info!("Starting scan loop...");

    loop {
        tokio::select! {
            _ = cycle_interval.tick() => {
                if shutdown_flag.load(Ordering::SeqCst) {
                    break;
                }

                cycle += 1;
                info!("━━━ Scan cycle {} ━━━", cycle);

                // Racing the cycle against shutdown cancels between
                // symbols; per-symbol state is already persisted
                tokio::select! {
                    _ = run_cycle(&scanner, &mut last_stage_one) => {}
                    _ = shutdown_rx.recv() => {
                        info!("Interrupted mid-cycle, partial progress is saved");
                        break;
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    info!("Scan loop ended after {} cycles", cycle);
    Ok(())
}

async fn run_cycle(scanner: &Scanner, last_stage_one: &mut Option<NaiveDate>) {
    let today = Utc::now().date_naive();

    if *last_stage_one != Some(today) {
        match scanner.run_stage_one().await {
            Ok(_) => *last_stage_one = Some(today),
            Err(e) => error!("Stage 1 scan failed: {:#}", e),
        }
    } else {
        info!("Stage 1 already ran today, skipping to confirmation");
    }

    if let Err(e) = scanner.run_stage_two().await {
        error!("Stage 2 pass failed: {:#}", e);
    }
}
