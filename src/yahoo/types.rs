//! Yahoo Finance API response types
//!
//! Wire shapes for the v8 chart endpoint and the v7 quote endpoint, plus
//! the conversion from a chart payload into validated candles. The chart
//! arrays carry nulls for halted sessions; those rows are dropped.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::types::Candle;

// =============================================================================
// Chart endpoint
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartOuter,
}

#[derive(Debug, Deserialize)]
pub struct ChartOuter {
    pub result: Option<Vec<ChartResult>>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Indicators,
}

#[derive(Debug, Deserialize)]
pub struct Indicators {
    pub quote: Vec<QuoteBlock>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteBlock {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    pub code: String,
    pub description: String,
}

impl ChartResult {
    /// Zip the parallel arrays into candles, dropping rows with missing
    /// values or inconsistent prices.
    pub fn to_candles(&self) -> Vec<Candle> {
        let quote = match self.indicators.quote.first() {
            Some(quote) => quote,
            None => return Vec::new(),
        };

        let mut candles = Vec::with_capacity(self.timestamp.len());
        for (i, &ts) in self.timestamp.iter().enumerate() {
            let row = (
                quote.open.get(i).copied().flatten(),
                quote.high.get(i).copied().flatten(),
                quote.low.get(i).copied().flatten(),
                quote.close.get(i).copied().flatten(),
                quote.volume.get(i).copied().flatten(),
            );
            let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = row else {
                continue;
            };
            let Some(datetime) = DateTime::<Utc>::from_timestamp(ts, 0) else {
                continue;
            };

            match Candle::new(datetime, open, high, low, close, volume) {
                Ok(candle) => candles.push(candle),
                Err(e) => debug!("Dropping inconsistent bar at {}: {}", datetime, e),
            }
        }
        candles
    }
}

// =============================================================================
// Quote endpoint
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    pub quote_response: QuoteOuter,
}

#[derive(Debug, Deserialize)]
pub struct QuoteOuter {
    #[serde(default)]
    pub result: Vec<QuoteData>,
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct QuoteData {
    pub symbol: String,
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    #[serde(rename = "regularMarketPrice")]
    pub regular_market_price: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART_JSON: &str = r#"{
        "chart": {
            "result": [{
                "timestamp": [1717372800, 1717459200, 1717545600],
                "indicators": {
                    "quote": [{
                        "open":   [100.0, 101.0, null],
                        "high":   [102.0, 103.0, 104.0],
                        "low":    [ 99.0, 100.0, 101.0],
                        "close":  [101.0, 102.0, 103.0],
                        "volume": [1000.0, 1100.0, 1200.0]
                    }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_chart_rows_with_nulls_dropped() {
        let parsed: ChartResponse = serde_json::from_str(CHART_JSON).unwrap();
        let result = &parsed.chart.result.unwrap()[0];
        let candles = result.to_candles();

        // third row has a null open and is dropped
        assert_eq!(candles.len(), 2);
        assert!((candles[0].close - 101.0).abs() < 1e-9);
        assert!((candles[1].close - 102.0).abs() < 1e-9);
    }

    #[test]
    fn test_chart_error_payload() {
        let raw = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let parsed: ChartResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.chart.result.is_none());
        assert_eq!(parsed.chart.error.unwrap().code, "Not Found");
    }

    #[test]
    fn test_quote_market_cap() {
        let raw = r#"{"quoteResponse": {"result": [{"symbol": "AAPL", "marketCap": 3100000000000, "regularMarketPrice": 196.5}], "error": null}}"#;
        let parsed: QuoteEnvelope = serde_json::from_str(raw).unwrap();
        let quote = &parsed.quote_response.result[0];
        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.market_cap, Some(3.1e12));
        assert_eq!(quote.regular_market_price, Some(196.5));
    }
}
