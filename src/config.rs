use crate::error::{PickerError, Result};
use crate::types::Endpoint;
use directories::ProjectDirs;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

// Include the JSON file at compile time
const ENDPOINTS_JSON: &str = include_str!("../assets/endpoints.json");

// Global cache for the parsed built-in list
static ENDPOINTS_CACHE: OnceLock<Vec<Endpoint>> = OnceLock::new();

pub const APP_NAME: &str = "domainpick";

/// Built-in endpoint list, in configured order.
pub fn builtin_endpoints() -> Vec<Endpoint> {
    ENDPOINTS_CACHE
        .get_or_init(|| {
            serde_json::from_str(ENDPOINTS_JSON)
                .expect("Failed to parse assets/endpoints.json. This is a compile-time error.")
        })
        .clone()
}

fn default_probe_timeout_ms() -> u64 {
    8000
}

fn default_fast_path_ms() -> u64 {
    3000
}

fn default_load_timeout_ms() -> u64 {
    15000
}

fn default_splash_delay_ms() -> u64 {
    1000
}

fn default_restart_delay_ms() -> u64 {
    10000
}

fn default_install_launch_delay_ms() -> u64 {
    2000
}

fn default_reveal_delay_ms() -> u64 {
    300
}

fn default_install_retry_reset_ms() -> u64 {
    3000
}

fn default_ios_guide_recheck_ms() -> u64 {
    2000
}

/// Runtime settings. Every field is optional in `config.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default = "default_fast_path_ms")]
    pub fast_path_ms: u64,
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    #[serde(default = "default_splash_delay_ms")]
    pub splash_delay_ms: u64,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    #[serde(default = "default_install_launch_delay_ms")]
    pub install_launch_delay_ms: u64,
    #[serde(default = "default_reveal_delay_ms")]
    pub reveal_delay_ms: u64,
    #[serde(default = "default_install_retry_reset_ms")]
    pub install_retry_reset_ms: u64,
    /// On iOS, re-arm the manual install steps this long after the landing
    /// page opens if no install prompt has arrived.
    #[serde(default = "default_ios_guide_recheck_ms")]
    pub ios_guide_recheck_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoints: builtin_endpoints(),
            probe_timeout_ms: default_probe_timeout_ms(),
            fast_path_ms: default_fast_path_ms(),
            load_timeout_ms: default_load_timeout_ms(),
            splash_delay_ms: default_splash_delay_ms(),
            restart_delay_ms: default_restart_delay_ms(),
            install_launch_delay_ms: default_install_launch_delay_ms(),
            reveal_delay_ms: default_reveal_delay_ms(),
            install_retry_reset_ms: default_install_retry_reset_ms(),
            ios_guide_recheck_ms: default_ios_guide_recheck_ms(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text, filling in the built-in endpoint list
    /// when none is given, then validate.
    pub fn from_toml(content: &str) -> Result<Self> {
        let mut settings: Settings = toml::from_str(content)?;
        if settings.endpoints.is_empty() {
            settings.endpoints = builtin_endpoints();
        }
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.endpoints.is_empty() {
            return Err(PickerError::Config("endpoint list is empty".to_string()));
        }

        let mut seen = HashSet::new();
        for endpoint in &self.endpoints {
            let parsed = reqwest::Url::parse(endpoint.as_str()).map_err(|e| {
                PickerError::Config(format!("invalid endpoint '{}': {}", endpoint, e))
            })?;
            if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
                return Err(PickerError::Config(format!(
                    "endpoint '{}' must be an http(s) origin",
                    endpoint
                )));
            }
            if !seen.insert(endpoint) {
                return Err(PickerError::Config(format!(
                    "duplicate endpoint '{}'",
                    endpoint
                )));
            }
        }

        let timings = [
            ("probe_timeout_ms", self.probe_timeout_ms),
            ("fast_path_ms", self.fast_path_ms),
            ("load_timeout_ms", self.load_timeout_ms),
            ("restart_delay_ms", self.restart_delay_ms),
        ];
        for (name, value) in timings {
            if value == 0 {
                return Err(PickerError::Config(format!("{} must be positive", name)));
            }
        }

        Ok(())
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn fast_path(&self) -> Duration {
        Duration::from_millis(self.fast_path_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn splash_delay(&self) -> Duration {
        Duration::from_millis(self.splash_delay_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn install_launch_delay(&self) -> Duration {
        Duration::from_millis(self.install_launch_delay_ms)
    }

    pub fn reveal_delay(&self) -> Duration {
        Duration::from_millis(self.reveal_delay_ms)
    }

    pub fn install_retry_reset(&self) -> Duration {
        Duration::from_millis(self.install_retry_reset_ms)
    }

    pub fn ios_guide_recheck(&self) -> Duration {
        Duration::from_millis(self.ios_guide_recheck_ms)
    }
}

/// Default location of the user override (~/.config/domainpick/config.toml)
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
}

/// Load settings.
/// Strategy:
/// 1. Explicit path: must exist and parse
/// 2. User config (~/.config/domainpick/config.toml), if present
/// 3. Fallback to built-in defaults
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)?;
        return Settings::from_toml(&content);
    }

    if let Some(path) = default_config_path() {
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            tracing::info!(path = ?path, "Loaded settings from local config");
            return Settings::from_toml(&content);
        }
    }

    Ok(Settings::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn builtin_list_has_observed_origins() {
        let endpoints = builtin_endpoints();
        assert_eq!(endpoints.len(), 4);
        assert_eq!(endpoints[0].as_str(), "https://aistock.xianfenkeji.com");
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() -> Result<()> {
        let settings = Settings::from_toml("fast_path_ms = 1500\n")?;
        assert_eq!(settings.fast_path_ms, 1500);
        assert_eq!(settings.probe_timeout_ms, 8000);
        assert_eq!(settings.load_timeout_ms, 15000);
        assert_eq!(settings.restart_delay_ms, 10000);
        assert_eq!(settings.endpoints, builtin_endpoints());
        Ok(())
    }

    #[test]
    fn rejects_duplicates_and_bad_schemes() {
        let dup = r#"endpoints = ["https://a.test", "https://a.test/"]"#;
        assert!(matches!(
            Settings::from_toml(dup),
            Err(PickerError::Config(_))
        ));

        let ftp = r#"endpoints = ["ftp://a.test"]"#;
        assert!(matches!(
            Settings::from_toml(ftp),
            Err(PickerError::Config(_))
        ));

        assert!(matches!(
            Settings::from_toml("load_timeout_ms = 0"),
            Err(PickerError::Config(_))
        ));
    }

    #[test]
    fn load_from_explicit_path() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "endpoints = [\"https://a.test\", \"https://b.test\"]\nprobe_timeout_ms = 500\n",
        )?;

        let settings = load_settings(Some(&path))?;
        assert_eq!(settings.endpoints.len(), 2);
        assert_eq!(settings.probe_timeout(), Duration::from_millis(500));
        Ok(())
    }
}
