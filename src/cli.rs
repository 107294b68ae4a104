use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands;
use crate::constants::{DEFAULT_DATA_FILE, DEFAULT_PORT};

#[derive(Parser)]
#[command(name = "solquery")]
#[command(about = "Ask questions about SOL daily price history", long_about = None)]
pub struct Cli {
    /// Path to the daily candle CSV
    #[arg(long, global = true, env = "DATA_FILE", default_value = DEFAULT_DATA_FILE)]
    pub data_file: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
    },
    /// Answer one question and print the JSON response
    Ask {
        /// The question, e.g. "RSI últimos 14 días"
        prompt: String,
    },
    /// Show dataset coverage
    Status,
}

pub async fn run() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            commands::serve::run(port, cli.data_file).await;
        }
        Commands::Ask { prompt } => {
            commands::ask::run(prompt, cli.data_file).await;
        }
        Commands::Status => {
            commands::status::run(cli.data_file).await;
        }
    }
}
