//! Alert message formatting
//!
//! Builds the Markdown notifications delivered through Telegram. The
//! confirmed-signal layout is stable; dashboards and muted chats key off
//! the header line.

use chrono::NaiveDate;

use crate::tracker::SignalStats;
use crate::types::{SignalSnapshot, Symbol};

const DIVIDER: &str = "━━━━━━━━━━━━━━━━━━━━━━";

/// Render the two-stage buy confirmation alert.
///
/// Stochastic RSI lines are carried on the 0-1 scale and shown as
/// percentages. `history` adds the win-rate section once the symbol has
/// at least one evaluated alert.
pub fn confirmed_alert(
    symbol: &Symbol,
    snapshot: &SignalSnapshot,
    history: Option<&SignalStats>,
    date: NaiveDate,
) -> String {
    let tradingview_link = format!("https://www.tradingview.com/chart/?symbol={}", symbol);

    let mut lines = vec![
        "🚨🚨🚨 **BUY SIGNAL CONFIRMED!** 🚨🚨🚨".to_string(),
        DIVIDER.to_string(),
        String::new(),
        format!("**📈 SYMBOL: `{}`**", symbol),
        format!("💰 **Price:** ${:.2}", snapshot.price),
        format!("📊 [View on TradingView]({})", tradingview_link),
        String::new(),
        "**✅ TWO-STAGE FILTER PASSED:**".to_string(),
        String::new(),
        "**🔵 Stage 1:** Stochastic RSI + MFI".to_string(),
        format!(
            "   • Stoch RSI: K={:.2}% | D={:.2}%",
            snapshot.stoch_k * 100.0,
            snapshot.stoch_d * 100.0
        ),
        format!("   • MFI: {:.2} (3-day uptrend ✓)", snapshot.mfi),
        String::new(),
        "**🟢 Stage 2:** WaveTrend Confirmation".to_string(),
        format!("   • WT1: {}", format_reading(snapshot.wt1)),
        format!("   • WT2: {}", format_reading(snapshot.wt2)),
        "   • **Oversold zone cross detected** 🎯".to_string(),
    ];

    if let Some(stats) = history.filter(|s| s.evaluated > 0) {
        lines.push(String::new());
        lines.push(format!("📊 **Historical Performance ({}):**", symbol));
        lines.push(format!(
            "   • Win Rate: {:.1}% | Avg Return: {:.2}%",
            stats.win_rate.unwrap_or(0.0),
            stats.avg_return.unwrap_or(0.0)
        ));
        lines.push(String::new());
    }

    lines.extend([
        DIVIDER.to_string(),
        format!("📅 **Date:** {}", date.format("%Y-%m-%d")),
        "🚀 **ACTION: STRONG BUY CANDIDATE**".to_string(),
        DIVIDER.to_string(),
    ]);

    lines.join("\n")
}

fn format_reading(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "n/a".to_string(),
    }
}

/// Wrap preformatted text in a Markdown code fence. Keeps fixed-width
/// report tables aligned in the chat.
pub fn code_block(text: &str) -> String {
    format!("```\n{}\n```", text)
}
