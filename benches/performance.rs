//! Performance benchmarks for the indicator math and the stage-1 gates
//!
//! Run with: `cargo bench`
//! View results: `open target/criterion/report/index.html`

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use stock_screener::config::FiltersConfig;
use stock_screener::filters::evaluate_stage_one;
use stock_screener::indicators;
use stock_screener::{Candle, Symbol};

/// A year of pseudo-random daily bars, deterministic across runs.
fn price_series(len: usize) -> Vec<f64> {
    let mut seed = 0x2545F4914F6CDD1Du64;
    let mut price = 100.0;
    (0..len)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let step = (seed % 400) as f64 / 100.0 - 2.0;
            price = (price + step).max(5.0);
            price
        })
        .collect()
}

fn candle_series(len: usize) -> Vec<Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    price_series(len)
        .into_iter()
        .enumerate()
        .map(|(i, close)| {
            Candle::new_unchecked(
                start + Duration::days(i as i64),
                close,
                close + 1.0,
                close - 1.0,
                close,
                1_000_000.0,
            )
        })
        .collect()
}

fn benchmark_indicators(c: &mut Criterion) {
    let closes = price_series(252);
    let highs: Vec<f64> = closes.iter().map(|p| p + 1.0).collect();
    let lows: Vec<f64> = closes.iter().map(|p| p - 1.0).collect();
    let volumes = vec![1_000_000.0; closes.len()];

    c.bench_function("stochastic_rsi_252", |b| {
        b.iter(|| indicators::stochastic_rsi(black_box(&closes), 14, 14, 3, 3))
    });
    c.bench_function("bollinger_bands_252", |b| {
        b.iter(|| indicators::bollinger_bands(black_box(&closes), 20, 2.0))
    });
    c.bench_function("mfi_252", |b| {
        b.iter(|| {
            indicators::mfi(
                black_box(&highs),
                black_box(&lows),
                black_box(&closes),
                black_box(&volumes),
                14,
            )
        })
    });
    c.bench_function("wavetrend_252", |b| {
        b.iter(|| {
            indicators::wavetrend(
                black_box(&highs),
                black_box(&lows),
                black_box(&closes),
                10,
                21,
            )
        })
    });
}

fn benchmark_stage_one(c: &mut Criterion) {
    let symbol = Symbol::new("BENCH");
    let candles = candle_series(252);
    let cfg = FiltersConfig::default();

    // One full gate pass per symbol per scan cycle; this is the hot path
    // when the universe grows into the hundreds
    c.bench_function("evaluate_stage_one_252", |b| {
        b.iter(|| {
            evaluate_stage_one(
                black_box(&symbol),
                black_box(&candles),
                black_box(Some(100e9)),
                &cfg,
            )
        })
    });
}

criterion_group!(benches, benchmark_indicators, benchmark_stage_one);
criterion_main!(benches);
