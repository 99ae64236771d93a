//! Yahoo Finance market data client
//!
//! Fetches daily and weekly OHLCV history from the v8 chart endpoint and
//! market capitalization from the v7 quote endpoint. All requests go
//! through a shared rate limiter and circuit breaker, with exponential
//! backoff on retry.
//!
//! "No data" is a normal outcome, not an error: delisted symbols and
//! series shorter than the indicator warm-up come back as `Ok(None)` so
//! the scanner can skip them without tripping the breaker.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::common::{CircuitBreaker, RateLimiter};
use crate::data::normalize_series;
use crate::types::{Candle, Symbol};
use crate::yahoo::types::{ChartResponse, QuoteData, QuoteEnvelope};

const CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const QUOTE_BASE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";

/// Yahoo rejects the default reqwest user agent with 429s.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Series shorter than this cannot warm up the indicators.
const MIN_HISTORY_ROWS: usize = 14;

/// Extra calendar days requested beyond the target window so weekends,
/// holidays and dropped rows still leave enough bars after trimming.
const DAILY_FETCH_BUFFER_DAYS: i64 = 30;
const WEEKLY_FETCH_BUFFER_DAYS: i64 = 60;

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub max_retries: u32,
    pub timeout: Duration,
    pub requests_per_second: usize,
    pub failure_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            timeout: Duration::from_secs(10),
            requests_per_second: 2,
            failure_threshold: 5,
            breaker_cooldown: Duration::from_secs(60),
        }
    }
}

impl ClientConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_requests_per_second(mut self, requests_per_second: usize) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }
}

/// Yahoo Finance HTTP client with retry logic and rate limiting.
/// Clones share the rate limiter and circuit breaker.
#[derive(Clone)]
pub struct YahooClient {
    http_client: Client,
    rate_limiter: RateLimiter,
    circuit_breaker: Arc<Mutex<CircuitBreaker>>,
    max_retries: u32,
}

impl YahooClient {
    pub fn new() -> Result<Self> {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            rate_limiter: RateLimiter::new(config.requests_per_second),
            circuit_breaker: Arc::new(Mutex::new(CircuitBreaker::new(
                config.failure_threshold,
                config.breaker_cooldown,
            ))),
            max_retries: config.max_retries,
        })
    }

    /// Execute an operation with circuit breaker, rate limiting and
    /// exponential backoff (1s, 2s, 4s between attempts).
    async fn execute_with_retry<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        {
            let mut breaker = self.circuit_breaker.lock().await;
            if !breaker.can_attempt() {
                return Err(anyhow!("Circuit breaker is open, request rejected"));
            }
        }

        self.rate_limiter.acquire().await;

        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = Duration::from_secs(2u64.pow(attempt - 1));
                debug!("Retry attempt {} after {:?}", attempt, backoff);
                sleep(backoff).await;
            }

            match operation().await {
                Ok(value) => {
                    self.circuit_breaker.lock().await.record_success();
                    return Ok(value);
                }
                Err(e) => {
                    warn!("Request attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                }
            }
        }

        self.circuit_breaker.lock().await.record_failure();
        Err(last_error.unwrap_or_else(|| anyhow!("Request failed after retries")))
    }

    async fn fetch_chart(
        &self,
        symbol: &Symbol,
        interval: &str,
        period1: i64,
        period2: i64,
    ) -> Result<ChartResponse> {
        let url = format!(
            "{}/{}?period1={}&period2={}&interval={}",
            CHART_BASE_URL,
            symbol.as_str(),
            period1,
            period2,
            interval
        );
        let client = self.http_client.clone();

        self.execute_with_retry(|| {
            let client = client.clone();
            let url = url.clone();
            async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .context("Failed to send chart request")?;

                let status = response.status();
                // A 404 still carries a well-formed error payload for
                // unknown or delisted symbols.
                if !status.is_success() && status.as_u16() != 404 {
                    bail!("Chart request failed with status {}", status);
                }

                response
                    .json::<ChartResponse>()
                    .await
                    .context("Failed to decode chart response")
            }
        })
        .await
    }

    async fn fetch_quote(&self, symbol: &Symbol) -> Result<QuoteEnvelope> {
        let url = format!("{}?symbols={}", QUOTE_BASE_URL, symbol.as_str());
        let client = self.http_client.clone();

        self.execute_with_retry(|| {
            let client = client.clone();
            let url = url.clone();
            async move {
                let response = client
                    .get(&url)
                    .send()
                    .await
                    .context("Failed to send quote request")?;

                let status = response.status();
                if !status.is_success() {
                    bail!("Quote request failed with status {}", status);
                }

                response
                    .json::<QuoteEnvelope>()
                    .await
                    .context("Failed to decode quote response")
            }
        })
        .await
    }

    /// Fetch roughly `days` daily bars for a symbol.
    ///
    /// Returns `Ok(None)` when the symbol has no usable history.
    pub async fn daily_history(
        &self,
        symbol: &Symbol,
        days: usize,
    ) -> Result<Option<Vec<Candle>>> {
        let now = Utc::now();
        let period1 = (now - chrono::Duration::days(days as i64 + DAILY_FETCH_BUFFER_DAYS))
            .timestamp();
        let response = self
            .fetch_chart(symbol, "1d", period1, now.timestamp())
            .await?;
        Ok(interpret_chart(symbol, response, days))
    }

    /// Fetch roughly `weeks` weekly bars for a symbol.
    ///
    /// Returns `Ok(None)` when the symbol has no usable history.
    pub async fn weekly_history(
        &self,
        symbol: &Symbol,
        weeks: usize,
    ) -> Result<Option<Vec<Candle>>> {
        let now = Utc::now();
        let period1 = (now
            - chrono::Duration::days(weeks as i64 * 7 + WEEKLY_FETCH_BUFFER_DAYS))
        .timestamp();
        let response = self
            .fetch_chart(symbol, "1wk", period1, now.timestamp())
            .await?;
        Ok(interpret_chart(symbol, response, weeks))
    }

    /// Fetch the current quote for a symbol.
    pub async fn quote(&self, symbol: &Symbol) -> Result<Option<QuoteData>> {
        let envelope = self.fetch_quote(symbol).await?;

        if let Some(err) = envelope.quote_response.error {
            debug!("No quote for {}: {} ({})", symbol, err.description, err.code);
            return Ok(None);
        }

        Ok(envelope
            .quote_response
            .result
            .into_iter()
            .find(|q| q.symbol.eq_ignore_ascii_case(symbol.as_str())))
    }

    /// Fetch the market capitalization for a symbol in dollars.
    ///
    /// A missing or zero cap (funds, fresh listings) comes back as `None`.
    pub async fn market_cap(&self, symbol: &Symbol) -> Result<Option<f64>> {
        let cap = self
            .quote(symbol)
            .await?
            .and_then(|q| q.market_cap)
            .filter(|cap| *cap > 0.0);
        Ok(cap)
    }
}

/// Turn a chart payload into a trimmed, validated series.
///
/// Returns `None` for error payloads, empty results and series below the
/// indicator warm-up length.
fn interpret_chart(
    symbol: &Symbol,
    response: ChartResponse,
    keep: usize,
) -> Option<Vec<Candle>> {
    if let Some(err) = response.chart.error {
        debug!("No chart data for {}: {} ({})", symbol, err.description, err.code);
        return None;
    }

    let result = response.chart.result?.into_iter().next()?;
    let mut candles = normalize_series(result.to_candles());

    if candles.len() > keep {
        candles.drain(..candles.len() - keep);
    }

    if candles.len() < MIN_HISTORY_ROWS {
        debug!(
            "Insufficient history for {}: {} rows (need {})",
            symbol,
            candles.len(),
            MIN_HISTORY_ROWS
        );
        return None;
    }

    Some(candles)
}
