use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "qwen2.5vl:7b";
pub const DEFAULT_DB_PATH: &str = "pro_analyzer_data.db";
pub const DEFAULT_REPORT_TITLE: &str = "PRO ANALYZER Report";

const DEFAULT_PROBE_TIMEOUT_S: f64 = 5.0;
const DEFAULT_INFERENCE_TIMEOUT_S: f64 = 120.0;

/// Settings shared by the client, store and report generator.
///
/// Built once at startup and handed to each component; nothing reads the
/// environment after that.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzerConfig {
    pub endpoint: String,
    pub model: String,
    pub db_path: PathBuf,
    pub probe_timeout: Duration,
    pub inference_timeout: Duration,
    pub report_title: String,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            probe_timeout: Duration::from_secs_f64(DEFAULT_PROBE_TIMEOUT_S),
            inference_timeout: Duration::from_secs_f64(DEFAULT_INFERENCE_TIMEOUT_S),
            report_title: DEFAULT_REPORT_TITLE.to_string(),
        }
    }
}

impl AnalyzerConfig {
    /// Defaults overlaid with `ANALYZER_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_lookup(non_empty_env)
    }

    fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(endpoint) = lookup("ANALYZER_ENDPOINT") {
            self.endpoint = endpoint.trim_end_matches('/').to_string();
        }
        if let Some(model) = lookup("ANALYZER_MODEL") {
            self.model = model;
        }
        if let Some(path) = lookup("ANALYZER_DB") {
            self.db_path = PathBuf::from(path);
        }
        if let Some(timeout) = lookup("ANALYZER_PROBE_TIMEOUT").and_then(|raw| parse_seconds(&raw)) {
            self.probe_timeout = timeout;
        }
        if let Some(timeout) = lookup("ANALYZER_TIMEOUT").and_then(|raw| parse_seconds(&raw)) {
            self.inference_timeout = timeout;
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        if let Some(endpoint) = endpoint.filter(|value| !value.trim().is_empty()) {
            self.endpoint = endpoint.trim().trim_end_matches('/').to_string();
        }
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model.filter(|value| !value.trim().is_empty()) {
            self.model = model.trim().to_string();
        }
        self
    }

    pub fn with_db_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.db_path = path;
        }
        self
    }

    pub fn with_inference_timeout(mut self, seconds: Option<f64>) -> Self {
        if let Some(timeout) = seconds.and_then(seconds_to_duration) {
            self.inference_timeout = timeout;
        }
        self
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_seconds(raw: &str) -> Option<Duration> {
    raw.trim().parse::<f64>().ok().and_then(seconds_to_duration)
}

fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    if seconds > 0.0 {
        Duration::try_from_secs_f64(seconds).ok()
    } else {
        None
    }
}
