use crate::error::Result;
use crate::traits::InstallPrompt;
use regex::Regex;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// How the shell was launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// Installed-app presentation.
    Standalone,
    /// Ordinary browser tab.
    Browser,
}

/// Presentation signals read once at startup.
#[derive(Debug, Clone, Default)]
pub struct DisplaySignals {
    /// iOS-style `navigator.standalone` flag.
    pub navigator_standalone: bool,
    /// Matched display mode, e.g. "standalone", "browser", "fullscreen".
    pub display_mode: Option<String>,
    pub user_agent: Option<String>,
}

impl DisplaySignals {
    pub fn classify(&self) -> LaunchMode {
        let standalone_display = self
            .display_mode
            .as_deref()
            .is_some_and(|m| m.eq_ignore_ascii_case("standalone"));

        if self.navigator_standalone || standalone_display {
            LaunchMode::Standalone
        } else {
            LaunchMode::Browser
        }
    }

    pub fn is_ios(&self) -> bool {
        self.user_agent.as_deref().is_some_and(is_ios)
    }
}

/// User's answer to a native install prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallChoice {
    Accepted,
    Dismissed,
}

/// A captured install prompt, usable once the user asks to install.
#[derive(Clone)]
pub struct DeferredPrompt(pub Arc<dyn InstallPrompt>);

impl fmt::Debug for DeferredPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DeferredPrompt")
    }
}

/// Platform events the controller reacts to.
#[derive(Debug, Clone)]
pub enum PlatformEvent {
    /// The platform offered a deferred install prompt.
    InstallPromptAvailable(DeferredPrompt),
    AppInstalled,
    Online,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IosVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

pub fn is_ios(user_agent: &str) -> bool {
    ["iPad", "iPhone", "iPod"]
        .iter()
        .any(|device| user_agent.contains(device))
}

fn ios_version_regex() -> Result<&'static Regex> {
    static RE: OnceLock<Regex> = OnceLock::new();
    if let Some(re) = RE.get() {
        return Ok(re);
    }
    let re = Regex::new(r"OS (\d+)_(\d+)_?(\d+)?")?;
    Ok(RE.get_or_init(|| re))
}

/// Parse "OS 16_4_1"-style version fragments out of a user agent.
pub fn ios_version(user_agent: &str) -> Result<Option<IosVersion>> {
    let re = ios_version_regex()?;
    let Some(caps) = re.captures(user_agent) else {
        return Ok(None);
    };

    let part = |i: usize| {
        caps.get(i)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0)
    };

    Ok(Some(IosVersion {
        major: part(1),
        minor: part(2),
        patch: part(3),
    }))
}

/// iOS 16.4 and later can surface an install prompt.
pub fn ios_supports_install_prompt(user_agent: &str) -> Result<bool> {
    Ok(ios_version(user_agent)?.is_some_and(|v| (v.major, v.minor) >= (16, 4)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE_17: &str =
        "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1_2 like Mac OS X) AppleWebKit/605.1.15";
    const IPAD_16_3: &str = "Mozilla/5.0 (iPad; CPU OS 16_3 like Mac OS X) AppleWebKit/605.1.15";
    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) Chrome/120.0 Mobile";

    #[test]
    fn classification() {
        let mut signals = DisplaySignals::default();
        assert_eq!(signals.classify(), LaunchMode::Browser);

        signals.display_mode = Some("standalone".to_string());
        assert_eq!(signals.classify(), LaunchMode::Standalone);

        let ios = DisplaySignals {
            navigator_standalone: true,
            display_mode: Some("browser".to_string()),
            user_agent: Some(IPHONE_17.to_string()),
        };
        assert_eq!(ios.classify(), LaunchMode::Standalone);
        assert!(ios.is_ios());
    }

    #[test]
    fn ios_detection_and_versions() -> Result<()> {
        assert!(is_ios(IPHONE_17));
        assert!(!is_ios(ANDROID));

        assert_eq!(
            ios_version(IPHONE_17)?,
            Some(IosVersion { major: 17, minor: 1, patch: 2 })
        );
        assert_eq!(
            ios_version(IPAD_16_3)?,
            Some(IosVersion { major: 16, minor: 3, patch: 0 })
        );
        assert_eq!(ios_version(ANDROID)?, None);
        Ok(())
    }

    #[test]
    fn install_prompt_support_starts_at_16_4() -> Result<()> {
        assert!(ios_supports_install_prompt(IPHONE_17)?);
        assert!(!ios_supports_install_prompt(IPAD_16_3)?);
        assert!(ios_supports_install_prompt(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 16_4 like Mac OS X)"
        )?);
        assert!(!ios_supports_install_prompt(ANDROID)?);
        Ok(())
    }
}
