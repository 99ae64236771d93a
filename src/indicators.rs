//! Technical indicators over daily price series
//!
//! All rolling indicators return `Vec<Option<f64>>` aligned 1:1 with the
//! input series; entries are `None` until the rolling window fills.
//!
//! Available indicators:
//! - Moving Averages: SMA, EMA (recursive, seeded from the first value)
//! - Momentum: RSI (rolling-mean variant), Stochastic RSI
//! - Volatility: Bollinger Bands (population standard deviation)
//! - Volume: MFI
//! - Oscillators: WaveTrend (LazyBear formulation)

/// Substituted for a zero denominator in RSI, MFI, and WaveTrend
const ZERO_DIV_GUARD: f64 = 1e-10;

/// Substituted for a flat RSI window in Stochastic RSI
const FLAT_WINDOW_GUARD: f64 = 1e-9;

// =============================================================================
// Output Frames
// =============================================================================

/// Bollinger Bands series, aligned with the input
#[derive(Debug, Clone)]
pub struct BollingerBandsOutput {
    pub upper: Vec<Option<f64>>,
    pub middle: Vec<Option<f64>>,
    pub lower: Vec<Option<f64>>,
}

/// Stochastic RSI series on the 0-1 scale, aligned with the input
#[derive(Debug, Clone)]
pub struct StochRsiOutput {
    pub rsi: Vec<Option<f64>>,
    pub k: Vec<Option<f64>>,
    pub d: Vec<Option<f64>>,
}

/// WaveTrend oscillator series, aligned with the input
#[derive(Debug, Clone)]
pub struct WaveTrendOutput {
    pub wt1: Vec<Option<f64>>,
    pub wt2: Vec<Option<f64>>,
}

// =============================================================================
// Moving Averages
// =============================================================================

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut result = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i + 1 < period {
            result.push(None);
        } else {
            let sum: f64 = values[i + 1 - period..=i].iter().sum();
            result.push(Some(sum / period as f64));
        }
    }

    result
}

/// Simple Moving Average over a series that may contain gaps.
/// A window containing any `None` yields `None`.
fn sma_options(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut result = vec![None; values.len()];

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        if window.iter().any(|v| v.is_none()) {
            continue;
        }
        let sum: f64 = window.iter().flatten().sum();
        result[i] = Some(sum / period as f64);
    }

    result
}

/// Calculate Exponential Moving Average using recursive smoothing.
///
/// Seeded from the first value (no-adjustment convention), so every bar has
/// a value. Smoothing factor is 2/(period+1).
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len());
    let mut prev = values[0];
    result.push(prev);

    for &value in &values[1..] {
        prev = alpha * value + (1.0 - alpha) * prev;
        result.push(prev);
    }

    result
}

// =============================================================================
// Momentum Indicators
// =============================================================================

/// Calculate RSI (Relative Strength Index) with rolling-mean smoothing.
///
/// Per-bar deltas are split into gains and losses, each averaged over a
/// simple rolling window (not Wilder smoothing). A zero average loss is
/// replaced by a tiny epsilon so a pure uptrend reads near 100 instead of
/// dividing by zero.
pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let n = values.len();
    let mut result = vec![None; n];

    let mut gains = vec![0.0; n];
    let mut losses = vec![0.0; n];
    for i in 1..n {
        let delta = values[i] - values[i - 1];
        gains[i] = delta.max(0.0);
        losses[i] = (-delta).max(0.0);
    }

    for i in period..n {
        let avg_gain: f64 = gains[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
        let avg_loss: f64 = losses[i + 1 - period..=i].iter().sum::<f64>() / period as f64;

        let avg_loss = if avg_loss == 0.0 {
            ZERO_DIV_GUARD
        } else {
            avg_loss
        };
        let rs = avg_gain / avg_loss;
        result[i] = Some(100.0 - 100.0 / (1.0 + rs));
    }

    result
}

/// Calculate Stochastic RSI.
///
/// RSI is rescaled against its own rolling min/max window, then smoothed
/// twice: `k = SMA(stoch, k_smooth)`, `d = SMA(k, d_smooth)`. Output is on
/// the 0-1 scale; callers compare against 0.2, not 20.
pub fn stochastic_rsi(
    values: &[f64],
    rsi_period: usize,
    stoch_period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> StochRsiOutput {
    if values.is_empty() || rsi_period == 0 || stoch_period == 0 {
        return StochRsiOutput {
            rsi: vec![],
            k: vec![],
            d: vec![],
        };
    }

    let rsi_vals = rsi(values, rsi_period);
    let n = values.len();
    let mut stoch = vec![None; n];

    for i in (stoch_period - 1)..n {
        let window = &rsi_vals[i + 1 - stoch_period..=i];
        if window.iter().any(|v| v.is_none()) {
            continue;
        }

        let lo = window.iter().flatten().fold(f64::MAX, |a, &b| a.min(b));
        let hi = window.iter().flatten().fold(f64::MIN, |a, &b| a.max(b));

        if let Some(current) = rsi_vals[i] {
            let range = hi - lo;
            let range = if range == 0.0 { FLAT_WINDOW_GUARD } else { range };
            stoch[i] = Some((current - lo) / range);
        }
    }

    let k = sma_options(&stoch, k_smooth);
    let d = sma_options(&k, d_smooth);

    StochRsiOutput {
        rsi: rsi_vals,
        k,
        d,
    }
}

// =============================================================================
// Volatility Indicators
// =============================================================================

/// Calculate Bollinger Bands with population standard deviation.
pub fn bollinger_bands(values: &[f64], period: usize, num_std: f64) -> BollingerBandsOutput {
    if values.is_empty() || period == 0 {
        return BollingerBandsOutput {
            upper: vec![],
            middle: vec![],
            lower: vec![],
        };
    }

    let mut upper = Vec::with_capacity(values.len());
    let mut middle = Vec::with_capacity(values.len());
    let mut lower = Vec::with_capacity(values.len());

    for i in 0..values.len() {
        if i + 1 < period {
            upper.push(None);
            middle.push(None);
            lower.push(None);
        } else {
            let window = &values[i + 1 - period..=i];
            let mean: f64 = window.iter().sum::<f64>() / period as f64;
            let variance: f64 =
                window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / period as f64;
            let sd = variance.sqrt();

            upper.push(Some(mean + num_std * sd));
            middle.push(Some(mean));
            lower.push(Some(mean - num_std * sd));
        }
    }

    BollingerBandsOutput {
        upper,
        middle,
        lower,
    }
}

// =============================================================================
// Volume Indicators
// =============================================================================

/// Calculate Money Flow Index (MFI), the volume-weighted analog of RSI.
///
/// Money flow (typical price x volume) is assigned to the positive or
/// negative bucket on a strict typical-price change versus the previous bar;
/// an unchanged typical price contributes to neither bucket.
pub fn mfi(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    volume: &[f64],
    period: usize,
) -> Vec<Option<f64>> {
    if high.is_empty()
        || period == 0
        || high.len() != low.len()
        || high.len() != close.len()
        || high.len() != volume.len()
    {
        return vec![];
    }

    let n = close.len();
    let mut result = vec![None; n];

    let tp: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();

    let mut positive_flow = vec![0.0; n];
    let mut negative_flow = vec![0.0; n];
    for i in 1..n {
        let flow = tp[i] * volume[i];
        if tp[i] > tp[i - 1] {
            positive_flow[i] = flow;
        } else if tp[i] < tp[i - 1] {
            negative_flow[i] = flow;
        }
    }

    for i in period..n {
        let pos: f64 = positive_flow[i + 1 - period..=i].iter().sum();
        let neg: f64 = negative_flow[i + 1 - period..=i].iter().sum();

        let neg = if neg == 0.0 { ZERO_DIV_GUARD } else { neg };
        let ratio = pos / neg;
        result[i] = Some(100.0 - 100.0 / (1.0 + ratio));
    }

    result
}

// =============================================================================
// Oscillators
// =============================================================================

/// Calculate the WaveTrend oscillator (LazyBear formulation).
///
/// ap = (H+L+C)/3; esa = EMA(ap, channel); d = EMA(|ap - esa|, channel);
/// ci = (ap - esa) / (0.015 * d); wt1 = EMA(ci, average); wt2 = SMA(wt1, 4).
/// A zero mean absolute deviation is epsilon-guarded so a flat series yields
/// 0.0 rather than infinity.
pub fn wavetrend(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    channel_length: usize,
    average_length: usize,
) -> WaveTrendOutput {
    if high.is_empty()
        || channel_length == 0
        || average_length == 0
        || high.len() != low.len()
        || high.len() != close.len()
    {
        return WaveTrendOutput {
            wt1: vec![],
            wt2: vec![],
        };
    }

    let n = close.len();
    let ap: Vec<f64> = (0..n).map(|i| (high[i] + low[i] + close[i]) / 3.0).collect();

    let esa = ema(&ap, channel_length);
    let deviation: Vec<f64> = (0..n).map(|i| (ap[i] - esa[i]).abs()).collect();
    let d = ema(&deviation, channel_length);

    let ci: Vec<f64> = (0..n)
        .map(|i| {
            let dev = if d[i] == 0.0 { ZERO_DIV_GUARD } else { d[i] };
            (ap[i] - esa[i]) / (0.015 * dev)
        })
        .collect();

    let wt1_raw = ema(&ci, average_length);
    let wt2 = sma(&wt1_raw, 4);
    let wt1 = wt1_raw.into_iter().map(Some).collect();

    WaveTrendOutput { wt1, wt2 }
}

// =============================================================================
// Tests
// =============================================================================
