//! Integration tests for the grid backtester
//!
//! These tests drive the public API end to end: CSV archives on disk, the
//! configuration file, simulation, sweeps and the JSON report.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Duration, FixedOffset, NaiveDate};

use grid_backtester::simulator::simulate;
use grid_backtester::{
    data, BaseParameters, CandleBar, CandleSource, Config, CsvCandleSource, GridError,
    IntervalSpec, PerformanceSummarizer, ReportConstants, ReportParams, RunParameters,
    SimulationReport, SortKey, SweepEntry, SweepRunner, Symbol,
};

// =============================================================================
// Test Utilities
// =============================================================================

const MINUTE: i64 = 60_000;
const BARS_PER_DAY: i64 = 1440;
/// 2023-03-01 00:00:00 UTC
const MARCH_FIRST: i64 = 1_677_628_800_000;

fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, day).unwrap()
}

/// Build a bar whose open and close are joined by a small wick on both sides
fn bar_between(start_time: i64, open: f64, close: f64, wick: f64) -> CandleBar {
    CandleBar {
        start_time,
        open,
        high: open.max(close) + wick,
        low: open.min(close) - wick,
        close,
        volume: 1.0,
        end_time: start_time + MINUTE - 1,
        quote_volume: close,
    }
}

/// Minute candles oscillating around `base_price` with a four hour period
fn generate_oscillating_candles(days: i64, base_price: f64, amplitude: f64) -> Vec<CandleBar> {
    let mid = |i: i64| {
        base_price + amplitude * (i as f64 * 2.0 * std::f64::consts::PI / 240.0).sin()
    };
    (0..days * BARS_PER_DAY)
        .map(|i| bar_between(MARCH_FIRST + i * MINUTE, mid(i), mid(i + 1), 0.3))
        .collect()
}

/// Minute candles falling by `step` every bar
fn generate_crash_candles(count: i64, base_price: f64, step: f64) -> Vec<CandleBar> {
    let mid = |i: i64| base_price - i as f64 * step;
    (0..count)
        .map(|i| bar_between(MARCH_FIRST + i * MINUTE, mid(i), mid(i + 1), 0.1))
        .collect()
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "grid_backtester_it_{}_{}",
        name,
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write candles as vendor-style daily archives, one file per UTC day
fn write_daily_archives(dir: &Path, symbol: &Symbol, candles: &[CandleBar]) {
    for day in candles.chunks(BARS_PER_DAY as usize) {
        let date = day[0].datetime().unwrap().date_naive();
        let rows: String = day
            .iter()
            .map(|c| {
                format!(
                    "{},{},{},{},{},{},{},{},12,0.5,800.0,0\n",
                    c.start_time, c.open, c.high, c.low, c.close, c.volume, c.end_time,
                    c.quote_volume
                )
            })
            .collect();
        fs::write(data::day_path(dir, symbol, date), rows).unwrap();
    }
}

fn base(candles: &[CandleBar], floor_price: f64, duration: i64) -> BaseParameters {
    BaseParameters::derive(candles, 1000.0, floor_price, duration, &ReportConstants::default())
        .unwrap()
}

// =============================================================================
// Worked Examples
// =============================================================================

#[test]
fn test_single_bar_gives_one_open_position() {
    let candles = vec![CandleBar {
        start_time: MARCH_FIRST,
        open: 100.0,
        high: 105.0,
        low: 95.0,
        close: 102.0,
        volume: 1.0,
        end_time: MARCH_FIRST + MINUTE - 1,
        quote_volume: 102.0,
    }];
    let params = RunParameters {
        start_price: 100.0,
        floor_price: 90.0,
        deficit: 10.0,
        interval: 5.0,
        total_asset: 200.0,
        position_count: 2,
        position_amount: 100.0,
        progress: 1.0,
        strict: true,
        duration: 1,
        principal: 100.0,
    };

    let positions = simulate(&candles, params).unwrap();
    assert_eq!(positions.len(), 1);
    assert!(positions[0].is_open());
    assert_eq!(positions[0].buy.price, 100.0);
    assert_eq!(positions[0].meta.profit, 2.0);
}

#[test]
fn test_strict_and_non_strict_reenter_at_different_prices() {
    // first open 101 anchors the grid at 100
    let candles = vec![
        CandleBar::new(MARCH_FIRST, 101.0, 101.5, 99.0, 100.0, 1.0, MARCH_FIRST + MINUTE - 1, 1.0)
            .unwrap(),
        CandleBar::new(
            MARCH_FIRST + MINUTE,
            100.0,
            106.0,
            100.0,
            104.0,
            1.0,
            MARCH_FIRST + 2 * MINUTE - 1,
            1.0,
        )
        .unwrap(),
        CandleBar::new(
            MARCH_FIRST + 2 * MINUTE,
            97.0,
            98.0,
            94.0,
            96.0,
            1.0,
            MARCH_FIRST + 3 * MINUTE - 1,
            1.0,
        )
        .unwrap(),
    ];
    let strict = base(&candles, 50.0, 1).with_progress(0.5);
    let non_strict = strict.with_strict(false);
    assert_eq!(strict.start_price, 100.0);

    let runner = SweepRunner::default();
    let a = runner.run_point(&candles, &strict, 10.0).unwrap();
    let b = runner.run_point(&candles, &non_strict, 10.0).unwrap();

    assert_eq!(a.transactions[0].sell.as_ref().unwrap().price, 105.0);
    assert_eq!(b.transactions[0].sell.as_ref().unwrap().price, 105.0);
    assert_eq!(a.transactions[1].buy.price, 90.0);
    assert_eq!(b.transactions[1].buy.price, 95.0);
    assert_ne!(a.summary, b.summary);
}

#[test]
fn test_sweep_over_three_intervals() {
    let candles = generate_oscillating_candles(1, 1605.01, 20.0);
    let base = base(&candles, 1500.0, 1);

    let entries = SweepRunner::default()
        .run(&candles, &base, IntervalSpec::range(4.0, 6.0))
        .unwrap();

    assert_eq!(entries.len(), 3);
    assert!(entries
        .iter()
        .all(|e| matches!(e, SweepEntry::SummaryOnly(_)) && e.transactions().is_none()));
    let counts: Vec<usize> = entries.iter().filter_map(|e| e.position_count()).collect();
    assert!(counts.windows(2).all(|w| w[0] >= w[1]));
    // deficit 104
    assert_eq!(counts, vec![26, 20, 17]);
}

#[test]
fn test_zero_duration_is_invalid_configuration() {
    let candles = generate_oscillating_candles(1, 1605.01, 20.0);
    let base = base(&candles, 1500.0, 0);

    for spec in [IntervalSpec::Single(10.0), IntervalSpec::range(4.0, 6.0)] {
        assert!(matches!(
            SweepRunner::default().run(&candles, &base, spec),
            Err(GridError::InvalidConfiguration(_))
        ));
    }

    let params = RunParameters::new(&base, 10.0).unwrap();
    assert!(matches!(
        PerformanceSummarizer::default().summarize(&[], &params),
        Err(GridError::InvalidConfiguration(_))
    ));
}

// =============================================================================
// Pipeline Tests
// =============================================================================

#[test]
fn test_csv_archives_round_trip_through_source() {
    let dir = scratch_dir("source");
    let symbol = Symbol::new("ethbusd");
    let candles = generate_oscillating_candles(2, 1605.01, 20.0);
    write_daily_archives(&dir, &symbol, &candles);

    let loaded = CsvCandleSource::new(&dir)
        .get_candles(&symbol, march(1), march(2))
        .unwrap();
    assert_eq!(loaded.len(), 2 * BARS_PER_DAY as usize);
    assert_eq!(loaded, candles);
}

#[test]
fn test_missing_day_aborts_load() {
    let dir = scratch_dir("missing");
    let symbol = Symbol::new("ETHBUSD");
    write_daily_archives(&dir, &symbol, &generate_oscillating_candles(2, 1605.01, 20.0));

    let err = CsvCandleSource::new(&dir)
        .get_candles(&symbol, march(1), march(3))
        .unwrap_err();
    assert!(matches!(err, GridError::DataUnavailable { date, .. } if date == march(3)));
    assert_eq!(
        data::find_missing_days(&dir, &symbol, march(1), march(3)),
        vec![march(3)]
    );
}

#[test]
fn test_config_driven_single_interval_report() {
    let dir = scratch_dir("pipeline");
    let data_dir = dir.join("data");
    let results_dir = dir.join("results");
    fs::create_dir_all(&data_dir).unwrap();

    let symbol = Symbol::new("ETHBUSD");
    let candles = generate_oscillating_candles(2, 1605.01, 20.0);
    write_daily_archives(&data_dir, &symbol, &candles);

    let config_path = dir.join("config.json");
    let config_json = serde_json::json!({
        "market": { "symbol": "ETHBUSD", "data_dir": data_dir, "utc_offset_hours": 8 },
        "window": { "start": "2023-03-01", "end": "2023-03-02" },
        "grid": { "principal": 1000, "floor_price": 1500, "interval": 10 },
        "report": { "results_dir": results_dir }
    });
    fs::write(&config_path, config_json.to_string()).unwrap();

    let config = Config::from_file(&config_path).unwrap();
    let (start, end) = config.window().unwrap();
    let duration = config.duration().unwrap();
    let spec = config.interval_spec().unwrap();
    let offset = config.display_offset().unwrap();
    assert_eq!(duration, 2);
    assert_eq!(spec, IntervalSpec::Single(10.0));

    let loaded = CsvCandleSource::new(&config.market.data_dir)
        .get_candles(&config.symbol(), start, end)
        .unwrap();
    let base = BaseParameters::derive(
        &loaded,
        config.grid.principal,
        config.grid.floor_price,
        duration,
        &config.report_constants(),
    )
    .unwrap();

    let entries = SweepRunner::new(config.report_constants())
        .with_display_offset(offset)
        .run(&loaded, &base, spec)
        .unwrap();
    let report = SimulationReport::new(
        ReportParams::new(config.symbol(), &loaded, &base, spec, offset).unwrap(),
        entries,
    );

    let p = &report.params;
    assert_eq!(p.start, "2023-03-01 08:00:00");
    assert_eq!(p.end, "2023-03-03 07:59:59");
    assert_eq!(p.start_price, 1604.0);
    assert_eq!(p.deficit, 104.0);
    assert_eq!(p.total_asset, 3000.0);
    assert_eq!(p.close_price, loaded.last().unwrap().close);

    let result = match &report.summaries[..] {
        [SweepEntry::Detailed(result)] => result,
        other => panic!("expected one detailed entry, got {:?}", other),
    };
    assert_eq!(result.position_count, 10);
    assert_eq!(result.position_amount, 300.0);

    let s = &result.summary;
    assert!(s.count > 0);
    assert!(s.completed_count > 0);
    assert_eq!(s.count, result.transactions.len());
    assert_eq!(s.completed_count + s.uncompleted_count, s.count);
    assert_eq!(s.count_per_day, s.count / 2);
    // the series rises first; the first level fills on the way down
    assert!(result.transactions[0].buy.time.starts_with("2023-03-01 1"));

    let path = report.write_json(&config.report.results_dir).unwrap();
    assert_eq!(
        path.file_name().unwrap().to_str().unwrap(),
        "grid_ethbusd_2023-03-01_2023-03-03.json"
    );
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(written["summaries"][0]["kind"], "detailed");
    assert_eq!(
        written["summaries"][0]["transactions"].as_array().unwrap().len(),
        s.count
    );
}

#[test]
fn test_range_sweep_skips_unsizable_intervals_in_report() {
    let candles = generate_oscillating_candles(1, 1605.01, 20.0);
    let base = base(&candles, 1590.0, 1); // deficit 14
    let offset = FixedOffset::east_opt(0).unwrap();
    let spec = IntervalSpec::range(10.0, 16.0);

    let entries = SweepRunner::default()
        .with_parallel(true)
        .run(&candles, &base, spec)
        .unwrap();
    let report = SimulationReport::new(
        ReportParams::new(Symbol::new("ETHBUSD"), &candles, &base, spec, offset).unwrap(),
        entries,
    );

    let skipped: Vec<f64> = report
        .summaries
        .iter()
        .filter(|e| e.is_skipped())
        .map(|e| e.interval())
        .collect();
    assert_eq!(skipped, vec![15.0, 16.0]);

    let by_risk = report.sorted_entries(SortKey::Risk);
    assert_eq!(by_risk.len(), 7);
    assert!(by_risk[5].is_skipped() && by_risk[6].is_skipped());
}

// =============================================================================
// Risk Tests
// =============================================================================

#[test]
fn test_crash_below_floor_is_reported_not_halted() {
    let candles = generate_crash_candles(BARS_PER_DAY, 1605.01, 0.6);
    let base = base(&candles, 1500.0, 1);

    let result = SweepRunner::default()
        .run_point(&candles, &base, 10.0)
        .unwrap();

    // every level filled on the way down and none could be sold
    assert_eq!(result.transactions.len(), 10);
    assert_eq!(result.summary.completed_count, 0);
    assert!(result.summary.uncompleted_profit < 0.0);
    assert!(result.summary.risk_rate < 1.0);
    assert!(result.summary.is_liquidated());
}

#[test]
fn test_report_constants_change_money_figures_only() {
    let candles = generate_oscillating_candles(1, 1605.01, 20.0);
    let base = base(&candles, 1500.0, 1);

    let default = SweepRunner::default().run_point(&candles, &base, 10.0).unwrap();
    let usd = SweepRunner::new(ReportConstants {
        conversion_rate: 1.0,
        leverage: 2.0,
    })
    .run_point(&candles, &base, 10.0)
    .unwrap();

    assert_eq!(default.transactions, usd.transactions);
    assert_eq!(default.summary.count, usd.summary.count);
    assert_eq!(default.summary.fee_count, usd.summary.fee_count);
    assert_ne!(default.summary.completed_profit, usd.summary.completed_profit);
}

#[test]
fn test_window_days_cover_generated_archives() {
    let days: Vec<NaiveDate> = data::days_in_window(march(1), march(1) + Duration::days(6)).collect();
    assert_eq!(days.len(), 7);
    assert_eq!(days[6], march(7));
}
