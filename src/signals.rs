//! Buy-signal detectors over computed indicator frames
//!
//! Each detector scans a short lookback window of adjacent bar pairs,
//! most recent first, and returns a plain bool. Insufficient data always
//! means "no signal", never an error; re-fire suppression is the alert
//! tracker's job, not the detectors'.

use crate::indicators::{StochRsiOutput, WaveTrendOutput};

/// Oversold threshold for Stochastic RSI on the 0-1 scale
pub const STOCH_RSI_OVERSOLD: f64 = 0.2;

/// Detect a bullish Stochastic RSI cross in oversold territory.
///
/// Scans the last `lookback_days` adjacent pairs. A pair fires when K
/// crosses above D (prev K <= prev D, curr K > curr D) and any of the four
/// values sits below 0.2. A pair with missing K/D ends the scan: the frame
/// is still warming up and older pairs are no more reliable.
///
/// Requires `lookback_days + 2` rows; shorter frames return false.
pub fn stoch_rsi_buy(frame: &StochRsiOutput, lookback_days: usize) -> bool {
    let n = frame.k.len();
    if lookback_days == 0 || frame.d.len() != n || n < lookback_days + 2 {
        return false;
    }

    for offset in 0..lookback_days {
        let curr = n - 1 - offset;
        let prev = curr - 1;

        let (pk, pd, ck, cd) = match (frame.k[prev], frame.d[prev], frame.k[curr], frame.d[curr])
        {
            (Some(pk), Some(pd), Some(ck), Some(cd)) => (pk, pd, ck, cd),
            _ => return false,
        };

        let cross_up = pk <= pd && ck > cd;
        let oversold = ck < STOCH_RSI_OVERSOLD
            || cd < STOCH_RSI_OVERSOLD
            || pk < STOCH_RSI_OVERSOLD
            || pd < STOCH_RSI_OVERSOLD;

        if cross_up && oversold {
            return true;
        }
    }

    false
}

/// Detect a bullish WaveTrend cross below the oversold level.
///
/// Same pair scan as `stoch_rsi_buy` over WT1/WT2, except pairs with
/// missing values are skipped rather than ending the scan (WT2 carries a
/// short SMA warmup that K/D frames do not).
///
/// Requires `lookback_days + 1` rows; shorter frames return false.
pub fn wavetrend_buy(frame: &WaveTrendOutput, lookback_days: usize, oversold_level: f64) -> bool {
    let n = frame.wt1.len();
    if lookback_days == 0 || frame.wt2.len() != n || n < lookback_days + 1 {
        return false;
    }

    for offset in 0..lookback_days {
        let curr = n - 1 - offset;
        let prev = curr - 1;

        let (p1, p2, c1, c2) =
            match (frame.wt1[prev], frame.wt2[prev], frame.wt1[curr], frame.wt2[curr]) {
                (Some(p1), Some(p2), Some(c1), Some(c2)) => (p1, p2, c1, c2),
                _ => continue,
            };

        let cross_up = p1 <= p2 && c1 > c2;
        let oversold = c1 < oversold_level
            || c2 < oversold_level
            || p1 < oversold_level
            || p2 < oversold_level;

        if cross_up && oversold {
            return true;
        }
    }

    false
}

/// Check whether MFI is rising against its recent history.
///
/// True iff the latest value exceeds both of the two preceding values.
/// `days` only sets the minimum series length; the comparison itself is
/// always against the last two bars.
pub fn mfi_uptrend(mfi_values: &[Option<f64>], days: usize) -> bool {
    let n = mfi_values.len();
    if days == 0 || n < days + 1 || n < 3 {
        return false;
    }

    match (mfi_values[n - 1], mfi_values[n - 2], mfi_values[n - 3]) {
        (Some(p1), Some(p2), Some(p3)) => p1 > p2 && p1 > p3,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some_vec(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().map(|&v| Some(v)).collect()
    }

    fn stoch_frame(k: &[f64], d: &[f64]) -> StochRsiOutput {
        StochRsiOutput {
            rsi: vec![None; k.len()],
            k: some_vec(k),
            d: some_vec(d),
        }
    }

    fn wt_frame(wt1: &[f64], wt2: &[f64]) -> WaveTrendOutput {
        WaveTrendOutput {
            wt1: some_vec(wt1),
            wt2: some_vec(wt2),
        }
    }

    #[test]
    fn test_stoch_rsi_buy_cross_in_oversold() {
        // K crosses above D between the 3rd and 4th bars, all lines under 0.2
        let frame = stoch_frame(
            &[0.12, 0.14, 0.16, 0.18, 0.19],
            &[0.17, 0.17, 0.17, 0.17, 0.16],
        );
        assert!(stoch_rsi_buy(&frame, 3));
    }

    #[test]
    fn test_stoch_rsi_buy_minimum_rows() {
        // lookback + 1 rows is one short of the minimum
        let frame = stoch_frame(
            &[0.12, 0.14, 0.16, 0.18, 0.19, 0.21],
            &[0.17, 0.17, 0.17, 0.17, 0.16, 0.15],
        );
        assert!(!stoch_rsi_buy(&frame, 5));
    }

    #[test]
    fn test_stoch_rsi_buy_no_cross_down_false_positive() {
        // K falls through D from above; oversold throughout but no cross-up
        let frame = stoch_frame(
            &[0.19, 0.18, 0.16, 0.14, 0.12],
            &[0.16, 0.17, 0.17, 0.17, 0.17],
        );
        assert!(!stoch_rsi_buy(&frame, 3));
    }

    #[test]
    fn test_stoch_rsi_buy_not_oversold() {
        // Valid cross-up but every value stays above 0.2
        let frame = stoch_frame(
            &[0.30, 0.32, 0.40, 0.45, 0.50],
            &[0.35, 0.36, 0.38, 0.40, 0.42],
        );
        assert!(!stoch_rsi_buy(&frame, 3));
    }

    #[test]
    fn test_stoch_rsi_buy_missing_value_ends_scan() {
        // A cross sits in an older pair, but the most recent pair has a gap
        let mut frame = stoch_frame(
            &[0.12, 0.14, 0.16, 0.18, 0.19],
            &[0.17, 0.17, 0.17, 0.17, 0.16],
        );
        frame.k[4] = None;
        assert!(!stoch_rsi_buy(&frame, 3));
    }

    #[test]
    fn test_stoch_rsi_buy_empty_frame() {
        let frame = StochRsiOutput {
            rsi: vec![],
            k: vec![],
            d: vec![],
        };
        assert!(!stoch_rsi_buy(&frame, 5));
    }

    #[test]
    fn test_wavetrend_buy_cross_below_oversold() {
        let frame = wt_frame(&[-60.0, -58.0, -54.0, -50.0], &[-55.0, -56.0, -55.0, -52.0]);
        assert!(wavetrend_buy(&frame, 3, -53.0));
    }

    #[test]
    fn test_wavetrend_buy_not_oversold() {
        // Cross-up present but all values above the oversold level
        let frame = wt_frame(&[-40.0, -45.0, -30.0], &[-42.0, -42.0, -42.0]);
        assert!(!wavetrend_buy(&frame, 2, -53.0));
    }

    #[test]
    fn test_wavetrend_buy_skips_missing_pairs() {
        // Most recent pair has a warmup gap; the older cross still counts
        let mut frame = wt_frame(
            &[-60.0, -58.0, -54.0, -50.0, -49.0],
            &[-55.0, -56.0, -55.0, -52.0, -51.0],
        );
        frame.wt2[4] = None;
        assert!(wavetrend_buy(&frame, 4, -53.0));
    }

    #[test]
    fn test_wavetrend_buy_minimum_rows() {
        let frame = wt_frame(&[-60.0, -50.0], &[-55.0, -52.0]);
        // Needs lookback + 1 = 3 rows
        assert!(!wavetrend_buy(&frame, 2, -53.0));
    }

    #[test]
    fn test_mfi_uptrend_rising() {
        let values = some_vec(&[30.0, 40.0, 35.0, 45.0]);
        assert!(mfi_uptrend(&values, 3));
    }

    #[test]
    fn test_mfi_uptrend_flat_or_falling() {
        let falling = some_vec(&[50.0, 45.0, 42.0, 40.0]);
        assert!(!mfi_uptrend(&falling, 3));

        // Equality with the previous value does not count
        let flat = some_vec(&[30.0, 40.0, 45.0, 45.0]);
        assert!(!mfi_uptrend(&flat, 3));
    }

    #[test]
    fn test_mfi_uptrend_insufficient_or_missing() {
        let short = some_vec(&[40.0, 45.0, 50.0]);
        assert!(!mfi_uptrend(&short, 3));

        let mut gapped = some_vec(&[30.0, 40.0, 35.0, 45.0]);
        gapped[2] = None;
        assert!(!mfi_uptrend(&gapped, 3));
    }
}
