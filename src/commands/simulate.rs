//! Simulate command implementation with progress tracking for range sweeps

use anyhow::Result;
use clap::Args;
use grid_backtester::{
    BaseParameters, CandleSource, Config, CsvCandleSource, IntervalSpec, ReportParams,
    SimulationReport, SortKey, SweepEntry, SweepRunner,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

/// Overrides applied on top of the configuration file
#[derive(Args, Debug, Default, Clone)]
pub struct GridOverrides {
    /// Trading pair (e.g. ETHBUSD)
    #[arg(long)]
    pub symbol: Option<String>,

    /// Directory holding the daily kline CSV files
    #[arg(long)]
    pub data_dir: Option<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// End date (YYYY-MM-DD), inclusive
    #[arg(long)]
    pub end: Option<String>,

    /// Own capital
    #[arg(long)]
    pub principal: Option<f64>,

    /// Worst-case price the grid must cover
    #[arg(long)]
    pub floor_price: Option<f64>,

    /// Single grid interval (wins over a range)
    #[arg(long)]
    pub interval: Option<f64>,

    /// First interval of a sweep
    #[arg(long)]
    pub start_interval: Option<f64>,

    /// Last interval of a sweep, inclusive
    #[arg(long)]
    pub end_interval: Option<f64>,

    /// Sweep step
    #[arg(long)]
    pub interval_step: Option<f64>,

    /// Fraction of the interval taken on exit, in (0, 1]
    #[arg(long)]
    pub progress: Option<f64>,

    /// Re-open sold levels one interval under the sell price
    #[arg(long)]
    pub non_strict: bool,
}

impl GridOverrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(symbol) = &self.symbol {
            info!("Overriding symbol to: {}", symbol);
            config.market.symbol = symbol.clone();
        }
        if let Some(dir) = &self.data_dir {
            info!("Overriding data directory to: {}", dir);
            config.market.data_dir = dir.clone();
        }
        if let Some(start) = &self.start {
            info!("Overriding start date to: {}", start);
            config.window.start = start.clone();
        }
        if let Some(end) = &self.end {
            info!("Overriding end date to: {}", end);
            config.window.end = end.clone();
        }
        if let Some(principal) = self.principal {
            info!("Overriding principal to: {:.2}", principal);
            config.grid.principal = principal;
        }
        if let Some(floor_price) = self.floor_price {
            info!("Overriding floor price to: {:.2}", floor_price);
            config.grid.floor_price = floor_price;
        }
        if self.start_interval.is_some() || self.end_interval.is_some() {
            // A range on the command line replaces whatever the file had
            config.grid.interval = None;
            if let Some(start) = self.start_interval {
                config.grid.start_interval = Some(start);
            }
            if let Some(end) = self.end_interval {
                config.grid.end_interval = Some(end);
            }
        }
        if let Some(interval) = self.interval {
            info!("Overriding interval to: {}", interval);
            config.grid.interval = Some(interval);
        }
        if let Some(step) = self.interval_step {
            config.grid.interval_step = step;
        }
        if let Some(progress) = self.progress {
            info!("Overriding progress to: {}", progress);
            config.grid.progress = progress;
        }
        if self.non_strict {
            config.grid.strict = false;
        }
    }
}

/// Whether the run will sweep a range and draw a progress bar. Decided before
/// logging starts, so any config problem just answers `false` here and is
/// reported properly by `run`.
pub fn shows_progress(config_path: &str, overrides: &GridOverrides) -> bool {
    match Config::from_file(config_path) {
        Ok(mut config) => {
            overrides.apply(&mut config);
            matches!(config.interval_spec(), Ok(IntervalSpec::Range { .. }))
        }
        Err(_) => false,
    }
}

pub fn run(
    config_path: String,
    overrides: GridOverrides,
    output: bool,
    sort_by: String,
    top: usize,
    sequential: bool,
) -> Result<()> {
    info!("Starting grid simulation");

    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);
    overrides.apply(&mut config);
    if sequential {
        config.sweep.parallel = false;
    }

    let sort_key: SortKey = sort_by.parse().map_err(anyhow::Error::msg)?;
    let symbol = config.symbol();
    let (start, end) = config.window()?;
    let duration = config.duration()?;
    let spec = config.interval_spec()?;
    let offset = config.display_offset()?;
    let constants = config.report_constants();
    debug!("Resolved interval spec: {:?}", spec);

    info!("Loading data from: {}", config.market.data_dir);
    let source = CsvCandleSource::new(&config.market.data_dir);
    let candles = source.get_candles(&symbol, start, end)?;

    let base = BaseParameters::derive(
        &candles,
        config.grid.principal,
        config.grid.floor_price,
        duration,
        &constants,
    )?
    .with_progress(config.grid.progress)
    .with_strict(config.grid.strict);
    info!(
        "Start price {:.2}, floor price {:.2}, deficit {:.2}, total asset {:.2}",
        base.start_price,
        base.floor_price,
        base.deficit(),
        base.total_asset
    );

    let runner = SweepRunner::new(constants)
        .with_display_offset(offset)
        .with_parallel(config.sweep.parallel);

    let entries = match spec {
        IntervalSpec::Single(_) => runner.run(&candles, &base, spec)?,
        IntervalSpec::Range { .. } => {
            let total = spec.values()?.len();
            println!("\n{}", "=".repeat(70));
            println!("INTERVAL SWEEP");
            println!("{}", "=".repeat(70));
            println!("  Symbol:     {}", symbol);
            println!("  Window:     {} ~ {} ({} days)", start, end, duration);
            println!("  Intervals:  {} ({} runs)", spec, total);
            println!(
                "  Mode:       {}",
                if config.sweep.parallel { "parallel" } else { "sequential" }
            );
            println!("{}\n", "=".repeat(70));

            let pb = ProgressBar::new(total as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("⚡ {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed}<{eta}, {per_sec:.2}]")?
                    .progress_chars("█░ "),
            );
            let entries = runner.run_with_progress(&candles, &base, spec, Some(&pb))?;
            pb.finish();
            println!();
            entries
        }
    };

    let params = ReportParams::new(symbol, &candles, &base, spec, offset)?;
    let report = SimulationReport::new(params, entries);
    print_report(&report, sort_key, top);

    if output {
        let path = report.write_json(&config.report.results_dir)?;
        println!("Report saved to: {}", path.display());
    }

    info!("Simulation completed successfully");

    Ok(())
}

fn print_report(report: &SimulationReport, sort_key: SortKey, top: usize) {
    let p = &report.params;

    println!("\n{}", "=".repeat(60));
    println!("GRID SIMULATION: {}", p.symbol);
    println!("{}", "=".repeat(60));
    println!("Window:             {} ~ {}", p.start, p.end);
    println!("Duration:           {} days", p.duration);
    println!("Principal:          {:.2}", p.principal);
    println!("Total Asset:        {:.2}", p.total_asset);
    println!("Start Price:        {:.2}", p.start_price);
    println!("Close Price:        {:.2}", p.close_price);
    println!("Floor Price:        {:.2}", p.floor_price);
    println!("Deficit:            {:.2}", p.deficit);
    println!("Interval:           {}", p.interval);
    println!(
        "Exit:               {} of interval, {}",
        p.progress,
        if p.strict { "strict" } else { "non-strict" }
    );
    println!("{}", "=".repeat(60));

    if let [SweepEntry::Detailed(result)] = report.summaries.as_slice() {
        let s = &result.summary;
        println!("Levels:             {} x {:.2}", result.position_count, result.position_amount);
        println!("Fills:              {}", s.count);
        println!("Completed:          {}", s.completed_count);
        println!("Uncompleted:        {}", s.uncompleted_count);
        println!("Fills per Day:      {}", s.count_per_day);
        println!("Fee Count:          {}", s.fee_count);
        println!("Completed Profit:   {:.2}", s.completed_profit);
        println!("Uncompleted Profit: {:.2}", s.uncompleted_profit);
        println!("Total Profit:       {:.2}", s.total_profit);
        println!("Average Profit:     {:.2}", s.average_profit);
        println!("Total Profit Rate:  {:.2}%", s.total_profit_rate);
        println!("Average Rate:       {:.2}%", s.average_profit_rate);
        println!("Risk Rate:          {:.2}", s.risk_rate);
        println!("{}", "=".repeat(60));
        return;
    }

    let sorted = report.sorted_entries(sort_key);
    let display_count = top.min(sorted.len());
    println!("\n{}", "=".repeat(110));
    println!("TOP {} INTERVALS (sorted by {:?})", display_count, sort_key);
    println!("{}", "=".repeat(110));
    println!(
        "{:<4} {:>9} {:>6} {:>9} {:>6} {:>6} {:>5} {:>11} {:>11} {:>11} {:>8} {:>6}",
        "Rank", "Interval", "Levels", "Amount", "Fills", "Done", "Fee", "Realized", "Unrealized",
        "Total", "Rate%", "Risk"
    );
    println!("{}", "-".repeat(110));

    for (i, entry) in sorted.iter().take(top).enumerate() {
        match entry {
            SweepEntry::SummaryOnly(r) => {
                let s = &r.summary;
                println!(
                    "{:<4} {:>9} {:>6} {:>9.2} {:>6} {:>6} {:>5} {:>11.2} {:>11.2} {:>11.2} {:>8.2} {:>6.2}",
                    i + 1,
                    r.interval,
                    r.position_count,
                    r.position_amount,
                    s.count,
                    s.completed_count,
                    s.fee_count,
                    s.completed_profit,
                    s.uncompleted_profit,
                    s.total_profit,
                    s.total_profit_rate,
                    s.risk_rate
                );
            }
            SweepEntry::Detailed(r) => {
                println!(
                    "{:<4} {:>9} {:>6} {:>9.2} {:>6} (detailed)",
                    i + 1,
                    r.interval,
                    r.position_count,
                    r.position_amount,
                    r.summary.count
                );
            }
            SweepEntry::Skipped { interval, reason } => {
                println!("{:<4} {:>9} skipped: {}", i + 1, interval, reason);
            }
        }
    }
    println!("{}", "=".repeat(110));
}
