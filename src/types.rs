//! Core data types used across the screener

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV daily bar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (for trusted sources or tests)
    pub fn new_unchecked(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    /// Check if the candle is valid without returning detailed error
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Typical price (H+L+C)/3, the base series for MFI and WaveTrend
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Calendar date of the bar
    pub fn date(&self) -> NaiveDate {
        self.datetime.date_naive()
    }
}

/// Ticker symbol using Arc<str> for cheap cloning
///
/// Symbols are cloned into every scan outcome, signal event, and store call.
/// Arc<str> keeps those clones at O(1) instead of a heap copy each time.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(#[serde(with = "arc_str_serde")] std::sync::Arc<str>);

/// Custom serde for Arc<str>
mod arc_str_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::sync::Arc;

    pub fn serialize<S>(value: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Arc::from(s.as_str()))
    }
}

impl Symbol {
    pub fn new(s: impl AsRef<str>) -> Self {
        Symbol(std::sync::Arc::from(s.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which detector produced a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Stage 1: Stochastic RSI bullish cross in oversold plus MFI momentum
    StochRsiBuy,
    /// Stage 2: WaveTrend bullish cross below the oversold level
    WavetrendBuy,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::StochRsiBuy => write!(f, "stoch_rsi_buy"),
            SignalKind::WavetrendBuy => write!(f, "wavetrend_buy"),
        }
    }
}

/// Indicator readings captured at detection time, carried into alerts
/// and the signal history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub price: f64,
    pub market_cap: f64,
    /// Stochastic RSI lines on the 0-1 scale
    pub stoch_k: f64,
    pub stoch_d: f64,
    pub bb_lower: f64,
    pub mfi: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wt1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wt2: Option<f64>,
}

/// Immutable record of a detected signal
///
/// Created at detection time, never mutated. The admission tracker decides
/// whether it becomes a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: Symbol,
    pub detected_at: NaiveDate,
    pub kind: SignalKind,
    pub snapshot: SignalSnapshot,
}

impl SignalEvent {
    pub fn new(symbol: Symbol, detected_at: NaiveDate, kind: SignalKind, snapshot: SignalSnapshot) -> Self {
        Self {
            symbol,
            detected_at,
            kind,
            snapshot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        format!("{}T00:00:00Z", s).parse().unwrap()
    }

    #[test]
    fn test_valid_candle() {
        let c = Candle::new(utc("2024-06-03"), 100.0, 105.0, 98.0, 103.0, 1_000_000.0);
        assert!(c.is_ok());
    }

    #[test]
    fn test_high_less_than_low_rejected() {
        let c = Candle::new(utc("2024-06-03"), 100.0, 95.0, 98.0, 96.0, 1000.0);
        assert!(matches!(
            c,
            Err(CandleValidationError::HighLessThanLow { .. })
        ));
    }

    #[test]
    fn test_negative_volume_rejected() {
        let c = Candle::new(utc("2024-06-03"), 100.0, 105.0, 98.0, 103.0, -5.0);
        assert!(matches!(c, Err(CandleValidationError::NegativeVolume(_))));
    }

    #[test]
    fn test_close_out_of_range_rejected() {
        let c = Candle::new(utc("2024-06-03"), 100.0, 105.0, 98.0, 110.0, 1000.0);
        assert!(matches!(
            c,
            Err(CandleValidationError::CloseOutOfRange { .. })
        ));
    }

    #[test]
    fn test_typical_price() {
        let c = Candle::new_unchecked(utc("2024-06-03"), 10.0, 12.0, 9.0, 11.0, 100.0);
        assert!((c.typical_price() - 32.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_symbol_display_and_clone() {
        let s = Symbol::new("AAPL");
        let t = s.clone();
        assert_eq!(s, t);
        assert_eq!(format!("{}", s), "AAPL");
        assert_eq!(s.as_str(), "AAPL");
    }

    #[test]
    fn test_symbol_serde_transparent() {
        let s = Symbol::new("MSFT");
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, "\"MSFT\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn test_signal_event_serde() {
        let event = SignalEvent::new(
            Symbol::new("NVDA"),
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            SignalKind::StochRsiBuy,
            SignalSnapshot {
                price: 120.5,
                market_cap: 3.0e12,
                stoch_k: 0.15,
                stoch_d: 0.12,
                bb_lower: 121.0,
                mfi: 32.0,
                wt1: None,
                wt2: None,
            },
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: SignalEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.symbol, event.symbol);
        assert_eq!(back.kind, SignalKind::StochRsiBuy);
        assert!(back.snapshot.wt1.is_none());
    }
}
