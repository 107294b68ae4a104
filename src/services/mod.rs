pub mod api_logging;
pub mod csv_parser;
pub mod data_store;
pub mod intent_parser;

pub use api_logging::{determine_data_source, write_api_log_entry, ApiPerformanceMetrics, ApiStatus};
pub use csv_parser::{parse_candles, parse_candles_from_path, ParseReport};
pub use data_store::{CandleSource, Clock, CsvFileSource, DataStore, DatasetStats, SharedDataStore, SystemClock};
pub use intent_parser::IntentParser;
