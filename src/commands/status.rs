use crate::services::data_store::{by_year, DataStore};
use crate::utils::format_date;
use std::path::PathBuf;

pub async fn run(data_file: PathBuf) {
    println!("📊 SOL Dataset Status\n");

    if let Err(e) = show_status(data_file).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

async fn show_status(data_file: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    println!("📁 File: {}\n", data_file.display());

    let store = DataStore::new(data_file);
    let snapshot = store.snapshot().await?;
    let stats = store.stats().await?;

    if stats.records == 0 {
        println!("⚠️  The dataset has no usable candles.");
        return Ok(());
    }

    println!("📈 Daily candles: {}", format_number(stats.records));
    if let (Some(first), Some(last)) = (stats.first_date, stats.last_date) {
        println!("🗓️  Range:         {} → {}", format_date(&first), format_date(&last));
    }
    if let (Some(high), Some(low)) = (stats.max_high, stats.min_low) {
        println!("💲 All-time high: ${:.2}", high);
        println!("💲 All-time low:  ${:.2}", low);
    }

    println!("\n═══════════════════════════════════════════════════════════\n");

    for year in &stats.years {
        let candles = by_year(&snapshot, *year);
        let (Some(first), Some(last)) = (candles.first(), candles.last()) else {
            continue;
        };
        println!(
            "🔹 {}: {:>4} candles  ({} → {})  close ${:.2} → ${:.2}",
            year,
            candles.len(),
            format_date(&first.time),
            format_date(&last.time),
            first.close,
            last.close
        );
    }

    Ok(())
}

fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, c);
    }
    result
}
