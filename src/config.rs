//! Configuration management
//!
//! Handles loading and parsing of JSON configuration files. Telegram
//! credentials come from the environment (or a .env file) and override
//! anything in the config file, so tokens never need to live on disk.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main configuration structure
///
/// Every section has working defaults; a config file only needs the keys
/// it wants to change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenerConfig {
    #[serde(default)]
    pub universe: UniverseConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub watchlist: WatchlistConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub state: StateConfig,
}

impl ScreenerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents =
            fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let mut config: ScreenerConfig =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment credentials, for running without a file.
    pub fn from_env() -> Self {
        let mut config = ScreenerConfig::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bot_token) = std::env::var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(bot_token);
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            self.telegram.chat_id = Some(chat_id);
        }
    }
}

/// Symbol universe configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Universe file, one ticker per line. Falls back to the built-in
    /// mega-cap list when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbols_file: Option<String>,
}

/// Market data configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub daily_history_days: usize,
    pub weekly_history_weeks: usize,
    pub cache_ttl_hours: i64,
    pub requests_per_second: usize,
    pub max_retries: u32,
    pub timeout_secs: u64,
    /// Directory of CSV files for offline scans and downloads
    pub data_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig {
            daily_history_days: 100,
            weekly_history_weeks: 52,
            cache_ttl_hours: 24,
            requests_per_second: 2,
            max_retries: 3,
            timeout_secs: 10,
            data_dir: "data".to_string(),
        }
    }
}

/// Filter pipeline and detector thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Minimum market capitalization in dollars
    pub min_market_cap: f64,
    /// Minimum daily bars before any indicator runs
    pub min_data_points: usize,
    pub rsi_period: usize,
    pub stoch_period: usize,
    pub stoch_k_smooth: usize,
    pub stoch_d_smooth: usize,
    /// Stochastic RSI oversold level on the 0-1 scale
    pub stoch_oversold: f64,
    pub mfi_period: usize,
    pub mfi_threshold: f64,
    pub mfi_uptrend_days: usize,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
    /// Bars to look back for a recent detector cross
    pub signal_lookback_days: usize,
    pub wt_channel_length: usize,
    pub wt_average_length: usize,
    pub wt_oversold: f64,
    pub wt_overbought: f64,
    /// Minimum weekly bars before the weekly veto applies
    pub weekly_min_bars: usize,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        FiltersConfig {
            min_market_cap: 50e9, // $50B
            min_data_points: 30,
            rsi_period: 14,
            stoch_period: 14,
            stoch_k_smooth: 3,
            stoch_d_smooth: 3,
            stoch_oversold: 0.2,
            mfi_period: 14,
            mfi_threshold: 40.0,
            mfi_uptrend_days: 3,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            signal_lookback_days: 5,
            wt_channel_length: 10,
            wt_average_length: 21,
            wt_oversold: -53.0,
            wt_overbought: 60.0,
            weekly_min_bars: 14,
        }
    }
}

/// Alert admission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Calendar-day alert quota across all symbols
    pub daily_limit: u32,
    /// Full days a symbol stays muted after an alert
    pub cooldown_days: i64,
    /// Days before an alert's return gets evaluated
    pub performance_days: i64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        AlertsConfig {
            daily_limit: 5,
            cooldown_days: 7,
            performance_days: 7,
        }
    }
}

/// Watchlist grace-period configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchlistConfig {
    /// Business days a symbol is blocked from re-entering
    pub grace_period_days: i64,
    /// Business days before an idle entry is pruned
    pub retention_days: i64,
}

impl Default for WatchlistConfig {
    fn default() -> Self {
        WatchlistConfig {
            grace_period_days: 5,
            retention_days: 30,
        }
    }
}

/// Telegram notifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.chat_id.is_some()
    }

    /// Token and chat id, or an error naming what is missing.
    pub fn credentials(&self) -> Result<(&str, &str)> {
        let bot_token = self
            .bot_token
            .as_deref()
            .context("Telegram bot token not configured (set TELEGRAM_BOT_TOKEN)")?;
        let chat_id = self
            .chat_id
            .as_deref()
            .context("Telegram chat id not configured (set TELEGRAM_CHAT_ID)")?;
        Ok((bot_token, chat_id))
    }
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub state_dir: String,
    /// Export a JSON backup after every mutating store call
    pub auto_backup: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        StateConfig {
            state_dir: "state".to_string(),
            auto_backup: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = ScreenerConfig::default();
        assert_eq!(config.filters.min_market_cap, 50e9);
        assert_eq!(config.filters.min_data_points, 30);
        assert_eq!(config.alerts.daily_limit, 5);
        assert_eq!(config.alerts.cooldown_days, 7);
        assert_eq!(config.watchlist.grace_period_days, 5);
        assert_eq!(config.watchlist.retention_days, 30);
        assert_eq!(config.data.cache_ttl_hours, 24);
        assert!(!config.telegram.is_configured());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "filters": {{
                    "min_market_cap": 10e9,
                    "min_data_points": 30,
                    "rsi_period": 14,
                    "stoch_period": 14,
                    "stoch_k_smooth": 3,
                    "stoch_d_smooth": 3,
                    "stoch_oversold": 0.25,
                    "mfi_period": 14,
                    "mfi_threshold": 40.0,
                    "mfi_uptrend_days": 3,
                    "bollinger_period": 20,
                    "bollinger_std_dev": 2.0,
                    "signal_lookback_days": 5,
                    "wt_channel_length": 10,
                    "wt_average_length": 21,
                    "wt_oversold": -53.0,
                    "wt_overbought": 60.0,
                    "weekly_min_bars": 14
                }}
            }}"#
        )
        .unwrap();

        let config = ScreenerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.filters.min_market_cap, 10e9);
        assert_eq!(config.filters.stoch_oversold, 0.25);
        // untouched sections fall back to defaults
        assert_eq!(config.alerts.daily_limit, 5);
        assert_eq!(config.data.daily_history_days, 100);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(ScreenerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_missing_credentials_error_names_the_variable() {
        let config = TelegramConfig::default();
        let err = config.credentials().unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }
}
