use thiserror::Error;

#[derive(Error, Debug)]
pub enum PickerError {
    #[error("Probe of {endpoint} timed out after {timeout_ms}ms")]
    ProbeTimeout { endpoint: String, timeout_ms: u64 },

    #[error("Probe of {endpoint} failed: {reason}")]
    ProbeTransport { endpoint: String, reason: String },

    #[error("Content load timed out after {0}ms")]
    LoadTimeout(u64),

    #[error("Content load failed: {0}")]
    LoadError(String),

    #[error("No reachable endpoint among {0} candidates")]
    NoReachableEndpoint(usize),

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, PickerError>;
