use crate::server;
use crate::services::DataStore;
use crate::utils::format_date;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run(port: u16, data_file: PathBuf) {
    println!("🚀 Starting solquery server on port {}", port);
    println!("📁 Dataset: {}", data_file.display());

    let shared_data_store = Arc::new(DataStore::new(data_file));

    // Warm the cache so the first question does not pay for the CSV parse
    println!("📊 Loading candles into memory...");
    match shared_data_store.stats().await {
        Ok(stats) => {
            println!("✅ Data loaded successfully:");
            println!("   📅 Daily candles: {}", stats.records);
            if let (Some(first), Some(last)) = (stats.first_date, stats.last_date) {
                println!("   🗓️  Range:         {} → {}", format_date(&first), format_date(&last));
            }
        }
        Err(e) => {
            eprintln!("⚠️  Warning: Failed to load dataset: {}", e);
            eprintln!("   Server will start anyway; queries will answer DATA_LOAD_ERROR until the file is readable.");
        }
    }

    println!("🌐 Starting HTTP server...");
    if let Err(e) = server::serve(shared_data_store, port).await {
        eprintln!("❌ Server error: {}", e);
        std::process::exit(1);
    }
}
