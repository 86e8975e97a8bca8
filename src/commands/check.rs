//! Check command implementation: lists the days a window is missing

use anyhow::Result;
use grid_backtester::{data, Config};
use tracing::{info, warn};

pub fn run(config_path: String, start: Option<String>, end: Option<String>) -> Result<()> {
    let mut config = Config::from_file(&config_path)?;
    info!("Loaded configuration from: {}", config_path);

    if let Some(start) = start {
        config.window.start = start;
    }
    if let Some(end) = end {
        config.window.end = end;
    }

    let symbol = config.symbol();
    let (start, end) = config.window()?;
    let missing = data::find_missing_days(&config.market.data_dir, &symbol, start, end);
    let total = data::days_in_window(start, end).count();

    println!("\n{}", "=".repeat(60));
    println!("DATA CHECK: {} {} ~ {}", symbol, start, end);
    println!("{}", "=".repeat(60));
    println!("Data directory:     {}", config.market.data_dir);
    println!("Days in window:     {}", total);
    println!("Days available:     {}", total - missing.len());
    println!("Days missing:       {}", missing.len());

    if missing.is_empty() {
        println!("{}", "=".repeat(60));
        info!("All {} days present for {}", total, symbol);
        return Ok(());
    }

    for date in &missing {
        println!(
            "  {}",
            data::day_path(&config.market.data_dir, &symbol, *date).display()
        );
    }
    println!("{}", "=".repeat(60));
    warn!("{} of {} days missing for {}", missing.len(), total, symbol);

    anyhow::bail!("{} day(s) of candle data missing", missing.len())
}
