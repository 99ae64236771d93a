//! Report command - print the weekly analytics report, optionally
//! delivering it to Telegram

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use stock_screener::analytics::ScanAnalytics;
use stock_screener::state::create_store;
use stock_screener::telegram::{message, TelegramClient};

use super::load_config;

pub fn run(config_path: Option<String>, send: bool) -> Result<()> {
    let config = load_config(config_path)?;

    let store = Arc::new(create_store(&config.state.state_dir, false)?);
    let analytics = ScanAnalytics::new(store);
    let report = analytics.weekly_report()?;

    println!("{}", report);

    if send {
        let (bot_token, chat_id) = config.telegram.credentials()?;
        let telegram = TelegramClient::new(bot_token, chat_id)?;

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(telegram.send_message(&message::code_block(&report)))?;
        analytics.mark_report_sent()?;
        info!("Weekly report sent to Telegram");
    }

    Ok(())
}
