//! Stock Screener
//!
//! A two-stage screener for oversold reversals in large-cap stocks. Stage
//! 1 scans the universe daily through a market-cap, Stochastic RSI,
//! Bollinger and MFI gate sequence; stage 2 confirms queued candidates
//! with a WaveTrend cross before alerting over Telegram, subject to a
//! daily limit, per-symbol cooldowns and a watchlist grace period.

pub mod analytics;
pub mod cache;
pub mod common;
pub mod config;
pub mod data;
pub mod filters;
pub mod indicators;
pub mod scanner;
pub mod signals;
pub mod state;
pub mod telegram;
pub mod tracker;
pub mod types;
pub mod universe;
pub mod watchlist;
pub mod yahoo;

pub use config::ScreenerConfig;
pub use types::*;
