use crate::server::analysis::QueryOrchestrator;
use crate::services::DataStore;
use std::path::PathBuf;
use std::sync::Arc;

/// Answer one question from the command line and print the JSON envelope
pub async fn run(prompt: String, data_file: PathBuf) {
    let orchestrator = QueryOrchestrator::new(Arc::new(DataStore::new(data_file)));
    let envelope = orchestrator.handle(Some(&prompt), None).await;

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("❌ Failed to render response: {}", e);
            std::process::exit(1);
        }
    }

    if !envelope.is_success() {
        std::process::exit(1);
    }
}
