use serde::{Deserialize, Serialize};
use std::fmt;

/// 候选域名 (镜像源), 例如: "https://aistock.xianfenkeji.com"
///
/// Stored without surrounding whitespace or trailing `/`, so the same origin
/// compares equal however it was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Endpoint(String);

impl Endpoint {
    pub fn new(url: &str) -> Self {
        Self(url.trim().trim_end_matches('/').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Root document of the origin, used when loading content.
    pub fn root_url(&self) -> String {
        format!("{}/", self.0.trim_end_matches('/'))
    }
}

impl From<String> for Endpoint {
    fn from(url: String) -> Self {
        Self::new(&url)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.0
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Why a probe failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    Timeout(u64),
    Transport,
}

/// 单次检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub endpoint: Endpoint,
    pub succeeded: bool,
    pub elapsed_ms: Option<u64>,
    pub error_message: Option<String>,
    pub failure: Option<ProbeFailure>,
}

impl ProbeResult {
    pub fn success(endpoint: Endpoint, elapsed_ms: u64) -> Self {
        Self {
            endpoint,
            succeeded: true,
            elapsed_ms: Some(elapsed_ms),
            error_message: None,
            failure: None,
        }
    }

    pub fn timeout(endpoint: Endpoint, timeout_ms: u64) -> Self {
        Self {
            endpoint,
            succeeded: false,
            elapsed_ms: None,
            error_message: Some(format!("timed out after {}ms", timeout_ms)),
            failure: Some(ProbeFailure::Timeout(timeout_ms)),
        }
    }

    pub fn transport(endpoint: Endpoint, message: impl Into<String>) -> Self {
        Self {
            endpoint,
            succeeded: false,
            elapsed_ms: None,
            error_message: Some(message.into()),
            failure: Some(ProbeFailure::Transport),
        }
    }
}

/// Result of one selection run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionOutcome {
    pub winner: Option<Endpoint>,
    pub elapsed_ms: Option<u64>,
}

impl SelectionOutcome {
    pub fn none() -> Self {
        Self::default()
    }
}

/// Completion signals emitted by a content frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameEvent {
    Loaded,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_url_normalizes_trailing_slash() {
        assert_eq!(Endpoint::new("https://a.test").root_url(), "https://a.test/");
        assert_eq!(Endpoint::new("https://a.test/").root_url(), "https://a.test/");
    }

    #[test]
    fn endpoint_serializes_as_plain_string() {
        let e = Endpoint::new("https://a.test");
        assert_eq!(serde_json::to_string(&e).unwrap(), "\"https://a.test\"");
    }

    #[test]
    fn trailing_slash_names_the_same_origin() {
        assert_eq!(Endpoint::new("https://a.test/"), Endpoint::new("https://a.test"));
        assert_eq!(Endpoint::new(" https://a.test// ").as_str(), "https://a.test");

        let read: Vec<Endpoint> = serde_json::from_str(r#"["https://a.test/"]"#).unwrap();
        assert_eq!(read, vec![Endpoint::new("https://a.test")]);
    }
}
