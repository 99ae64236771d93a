//! Download command - save daily and weekly history to CSV files for
//! offline scanning

use anyhow::Result;
use std::path::Path;

use stock_screener::data::{save_to_csv, INTERVALS};
use stock_screener::yahoo::{ClientConfig, YahooClient};

use super::{load_config, resolve_symbols};

pub fn run(config_path: Option<String>, symbols: Option<String>, output: String) -> Result<()> {
    let config = load_config(config_path)?;
    let symbols = resolve_symbols(&config, symbols)?;

    let client_config = ClientConfig::default()
        .with_max_retries(config.data.max_retries)
        .with_timeout(std::time::Duration::from_secs(config.data.timeout_secs))
        .with_requests_per_second(config.data.requests_per_second);
    let yahoo = YahooClient::with_config(client_config)?;

    let rt = tokio::runtime::Runtime::new()?;

    println!("\n{}", "=".repeat(60));
    println!("DOWNLOADING HISTORICAL DATA");
    println!("{}", "=".repeat(60));
    println!("  Symbols:   {}", symbols.len());
    println!("  Intervals: {}", INTERVALS.join(", "));
    println!("  Output:    {}", output);
    println!("{}\n", "=".repeat(60));

    let mut total_candles = 0;
    let mut success_count = 0;
    let mut total_downloads = 0;

    for symbol in &symbols {
        println!("\n{}:", symbol);

        for interval in INTERVALS {
            total_downloads += 1;
            print!("  Downloading {} {}... ", symbol, interval);

            let fetched = match *interval {
                "1wk" => rt.block_on(
                    yahoo.weekly_history(symbol, config.data.weekly_history_weeks),
                ),
                _ => rt.block_on(yahoo.daily_history(symbol, config.data.daily_history_days)),
            };

            match fetched {
                Ok(Some(candles)) => {
                    let path =
                        Path::new(&output).join(format!("{}_{}.csv", symbol.as_str(), interval));
                    match save_to_csv(&candles, &path) {
                        Ok(_) => {
                            total_candles += candles.len();
                            success_count += 1;
                            println!("✓ {} candles", candles.len());
                        }
                        Err(e) => println!("✗ Error: {}", e),
                    }
                }
                Ok(None) => println!("✗ No data"),
                Err(e) => println!("✗ Error: {}", e),
            }
        }
    }

    println!("\n{}", "=".repeat(60));
    println!("DOWNLOAD COMPLETE");
    println!("{}", "=".repeat(60));
    println!("  Successful: {}/{}", success_count, total_downloads);
    println!("  Total candles: {}", total_candles);
    println!("{}", "=".repeat(60));

    Ok(())
}
