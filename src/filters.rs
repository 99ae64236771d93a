//! Market filter pipeline
//!
//! Stage 1 runs every universe symbol through an ordered gate sequence
//! (market cap, Stochastic RSI D oversold, close below the lower Bollinger
//! band, MFI) and only then evaluates the buy detectors. Stage 2 confirms
//! queued candidates with the WaveTrend cross and an optional weekly
//! overbought veto. Gates short-circuit on the first failure and report a
//! reason string for scan statistics.

use tracing::debug;

use crate::config::FiltersConfig;
use crate::indicators;
use crate::signals;
use crate::types::{Candle, SignalSnapshot, Symbol};

/// Result of running one symbol through the Stage-1 pipeline
#[derive(Debug, Clone)]
pub enum StageOneOutcome {
    /// All gates passed and both Stage-1 detectors fired
    Signal(SignalSnapshot),
    /// Gates passed but no buy signal this cycle
    NoSignal,
    /// A gate rejected the symbol
    Rejected(&'static str),
}

/// Result of Stage-2 WaveTrend confirmation
#[derive(Debug, Clone)]
pub enum StageTwoOutcome {
    /// Daily WaveTrend buy confirmed, weekly veto clear
    Confirmed { wt1: f64, wt2: f64 },
    /// No daily WaveTrend cross in the lookback window
    NoSignal,
    /// Daily cross present but the weekly WT1 is overbought
    WeeklyOverbought { weekly_wt1: f64 },
}

fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Run one symbol through the Stage-1 gates and detectors.
///
/// `market_cap` is the cache-resolved value; an unavailable cap fails the
/// first gate. Fewer than `min_data_points` bars rejects without touching
/// the indicators.
pub fn evaluate_stage_one(
    symbol: &Symbol,
    candles: &[Candle],
    market_cap: Option<f64>,
    cfg: &FiltersConfig,
) -> StageOneOutcome {
    if candles.len() < cfg.min_data_points {
        debug!(
            "{}: insufficient data ({} bars, need {})",
            symbol,
            candles.len(),
            cfg.min_data_points
        );
        return StageOneOutcome::Rejected("insufficient_data");
    }

    // Gate 1: market cap
    let cap = match market_cap {
        Some(cap) if cap >= cfg.min_market_cap => cap,
        _ => {
            debug!("{}: rejected, market cap {:?} below floor", symbol, market_cap);
            return StageOneOutcome::Rejected("market_cap_too_low");
        }
    };

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();
    let price = closes[closes.len() - 1];

    // Gate 2: Stochastic RSI D oversold (0-1 scale)
    let stoch = indicators::stochastic_rsi(
        &closes,
        cfg.rsi_period,
        cfg.stoch_period,
        cfg.stoch_k_smooth,
        cfg.stoch_d_smooth,
    );
    let stoch_d = match last_value(&stoch.d) {
        Some(d) if d < cfg.stoch_oversold => d,
        _ => {
            debug!("{}: rejected, stoch D not oversold", symbol);
            return StageOneOutcome::Rejected("stoch_d_not_oversold");
        }
    };

    // Gate 3: close strictly below the lower Bollinger band
    let bb = indicators::bollinger_bands(&closes, cfg.bollinger_period, cfg.bollinger_std_dev);
    let bb_lower = match last_value(&bb.lower) {
        Some(lower) if price < lower => lower,
        _ => {
            debug!("{}: rejected, price {:.2} not below lower band", symbol, price);
            return StageOneOutcome::Rejected("price_not_below_bb");
        }
    };

    // Gate 4: MFI at or below the oversold threshold
    let mfi_values = indicators::mfi(&highs, &lows, &closes, &volumes, cfg.mfi_period);
    let mfi_last = match last_value(&mfi_values) {
        Some(m) if m <= cfg.mfi_threshold => m,
        _ => {
            debug!("{}: rejected, MFI too high", symbol);
            return StageOneOutcome::Rejected("mfi_too_high");
        }
    };

    // All gates passed; require the cross and the MFI uptick together
    let cross = signals::stoch_rsi_buy(&stoch, cfg.signal_lookback_days);
    let uptrend = signals::mfi_uptrend(&mfi_values, cfg.mfi_uptrend_days);
    if !(cross && uptrend) {
        return StageOneOutcome::NoSignal;
    }

    let stoch_k = last_value(&stoch.k).unwrap_or(0.0);
    debug!(
        "{}: stage 1 signal (K={:.3} D={:.3} MFI={:.1})",
        symbol, stoch_k, stoch_d, mfi_last
    );

    StageOneOutcome::Signal(SignalSnapshot {
        price,
        market_cap: cap,
        stoch_k,
        stoch_d,
        bb_lower,
        mfi: mfi_last,
        wt1: None,
        wt2: None,
    })
}

/// Confirm a Stage-1 candidate with the daily WaveTrend cross.
///
/// When weekly bars are supplied and number at least `weekly_min_bars`, a
/// weekly WT1 above the overbought level vetoes the confirmation. Fewer
/// weekly bars skip the veto; the daily signal stands.
pub fn evaluate_stage_two(
    symbol: &Symbol,
    daily: &[Candle],
    weekly: Option<&[Candle]>,
    cfg: &FiltersConfig,
) -> StageTwoOutcome {
    if daily.len() < cfg.min_data_points {
        debug!("{}: insufficient daily data for stage 2 ({} bars)", symbol, daily.len());
        return StageTwoOutcome::NoSignal;
    }

    let highs: Vec<f64> = daily.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = daily.iter().map(|c| c.low).collect();
    let closes: Vec<f64> = daily.iter().map(|c| c.close).collect();

    let wt = indicators::wavetrend(
        &highs,
        &lows,
        &closes,
        cfg.wt_channel_length,
        cfg.wt_average_length,
    );
    if !signals::wavetrend_buy(&wt, cfg.signal_lookback_days, cfg.wt_oversold) {
        return StageTwoOutcome::NoSignal;
    }

    if let Some(weekly) = weekly {
        if weekly.len() >= cfg.weekly_min_bars {
            let w_highs: Vec<f64> = weekly.iter().map(|c| c.high).collect();
            let w_lows: Vec<f64> = weekly.iter().map(|c| c.low).collect();
            let w_closes: Vec<f64> = weekly.iter().map(|c| c.close).collect();

            let weekly_wt = indicators::wavetrend(
                &w_highs,
                &w_lows,
                &w_closes,
                cfg.wt_channel_length,
                cfg.wt_average_length,
            );
            if let Some(weekly_wt1) = last_value(&weekly_wt.wt1) {
                if weekly_wt1 > cfg.wt_overbought {
                    debug!("{}: weekly WT1 {:.1} overbought, vetoing", symbol, weekly_wt1);
                    return StageTwoOutcome::WeeklyOverbought { weekly_wt1 };
                }
            }
        } else {
            debug!(
                "{}: weekly series too short ({} bars), skipping weekly check",
                symbol,
                weekly.len()
            );
        }
    }

    let wt1 = last_value(&wt.wt1).unwrap_or(0.0);
    let wt2 = last_value(&wt.wt2).unwrap_or(0.0);
    debug!("{}: stage 2 confirmed (WT1={:.1} WT2={:.1})", symbol, wt1, wt2);

    StageTwoOutcome::Confirmed { wt1, wt2 }
}
