//! Confirm command - one stage-2 pass over queued candidates

use anyhow::{Context, Result};

use stock_screener::scanner::Scanner;

use super::load_config;

pub fn run(config_path: Option<String>) -> Result<()> {
    let config = load_config(config_path)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    let scanner = Scanner::new(config)?;
    let summary = runtime.block_on(scanner.run_stage_two())?;

    println!("\n{}", "=".repeat(60));
    println!("STAGE 2 CONFIRMATION COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Candidates checked: {}", summary.checked);
    println!("  Confirmed:          {}", summary.confirmed);
    println!("  Alerts sent:        {}", summary.alerts_sent);
    println!("  Blocked:            {}", summary.blocked);
    println!("  Errors:             {}", summary.errors);
    println!("  Duration:           {:.1}s", summary.duration_secs);
    println!("{}", "=".repeat(60));

    Ok(())
}
