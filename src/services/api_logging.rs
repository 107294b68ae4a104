use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// Per-request performance record for the query API
#[derive(Debug, Clone)]
pub struct ApiPerformanceMetrics {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub status: ApiStatus,
    pub endpoint: String,
    pub intent: String,
    pub records_analyzed: usize,
    pub response_size_bytes: usize,
    pub data_source: DataSource,
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Success,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    /// Served from the in-memory snapshot
    Cache,
    /// Snapshot rebuilt from the dataset file
    Disk,
}

impl ApiPerformanceMetrics {
    pub fn new(start_time: DateTime<Utc>, endpoint: &str) -> Self {
        Self {
            start_time,
            end_time: start_time,
            duration_ms: 0,
            status: ApiStatus::Success,
            endpoint: endpoint.to_string(),
            intent: String::new(),
            records_analyzed: 0,
            response_size_bytes: 0,
            data_source: DataSource::Cache,
            error_code: None,
        }
    }

    pub fn complete(&mut self) {
        self.complete_at(Utc::now());
    }

    pub fn complete_at(&mut self, end_time: DateTime<Utc>) {
        self.end_time = end_time;
        self.duration_ms = (self.end_time - self.start_time).num_milliseconds().max(0) as u64;
    }

    /// Mark the request failed with a wire error code
    pub fn fail(&mut self, code: impl Into<String>) {
        self.status = ApiStatus::Fail;
        self.error_code = Some(code.into());
    }
}

fn format_duration(duration_ms: u64) -> String {
    if duration_ms >= 1000 {
        format!("{}.{:01}s", duration_ms / 1000, (duration_ms % 1000) / 100)
    } else {
        format!("{}ms", duration_ms)
    }
}

fn format_size(bytes: usize) -> String {
    if bytes >= 1024 {
        format!("{}kb", bytes / 1024)
    } else {
        format!("{}b", bytes)
    }
}

/// Compact one-line summary of a request
pub fn format_api_log_line(metrics: &ApiPerformanceMetrics) -> String {
    let status_str = match metrics.status {
        ApiStatus::Success => "OK",
        ApiStatus::Fail => "FAIL",
    };
    let data_source_str = match metrics.data_source {
        DataSource::Cache => "cache",
        DataSource::Disk => "disk",
    };
    let error_info = metrics
        .error_code
        .as_ref()
        .map(|code| format!(" error:{}", code))
        .unwrap_or_default();

    format!(
        "{} | {} | {} | {} | intent:{} records:{} size:{} source:{}{}",
        metrics.start_time.format("%Y-%m-%d %H:%M:%S"),
        format_duration(metrics.duration_ms),
        metrics.endpoint,
        status_str,
        if metrics.intent.is_empty() { "-" } else { metrics.intent.as_str() },
        metrics.records_analyzed,
        format_size(metrics.response_size_bytes),
        data_source_str,
        error_info
    )
}

/// Emit the request summary to the `api` log target
pub fn write_api_log_entry(metrics: &ApiPerformanceMetrics) {
    let line = format_api_log_line(metrics);
    match metrics.status {
        ApiStatus::Success => info!(target: "api", duration_ms = metrics.duration_ms, "{}", line),
        ApiStatus::Fail => warn!(target: "api", duration_ms = metrics.duration_ms, "{}", line),
    }
}

pub fn determine_data_source(cache_warm: bool) -> DataSource {
    if cache_warm {
        DataSource::Cache
    } else {
        DataSource::Disk
    }
}
