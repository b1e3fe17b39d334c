use crate::error::Result;
use crate::platform::InstallChoice;
use crate::presenter::{InstallButton, LandingAction};
use crate::types::{Endpoint, FrameEvent, ProbeResult};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

/// Prober: 对单个域名做一次有超时限制的连通性检测
#[async_trait]
pub trait Prober: Sync + Send {
    /// Never fails: every error is folded into the returned `ProbeResult`.
    async fn probe(&self, endpoint: &Endpoint, timeout: Duration) -> ProbeResult;
}

/// Receives "probing n of m" progress from the selector.
pub trait ProbeObserver: Sync + Send {
    fn on_probe_start(&self, _index: usize, _total: usize, _endpoint: &Endpoint) {}

    fn on_probe_result(&self, _result: &ProbeResult) {}
}

impl ProbeObserver for () {}

/// The embedded browsing context content is loaded into.
pub trait ContentFrame: Sync + Send {
    /// Register for load/error signals. Only one subscription is live at a time.
    fn subscribe(&self) -> UnboundedReceiver<FrameEvent>;

    /// Drop the live subscription, if any.
    fn unsubscribe(&self);

    /// Point the frame at a new origin.
    fn navigate(&self, target: &Endpoint);
}

/// Durable string key-value storage (the last-known-good lives here).
#[async_trait]
pub trait SessionStore: Sync + Send {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn remove(&self, key: &str) -> Result<()>;
}

/// A deferred native install prompt, captured when the platform offers one.
#[async_trait]
pub trait InstallPrompt: Sync + Send {
    async fn prompt(&self) -> Result<InstallChoice>;
}

/// Everything the controller shows, without knowing how it is rendered.
#[async_trait]
pub trait Presenter: ProbeObserver {
    fn show_landing(&self);

    fn set_install_button(&self, button: &InstallButton);

    fn show_ios_guide(&self);

    fn show_notice(&self, message: &str);

    fn show_splash(&self);

    fn hide_splash(&self);

    fn show_content(&self, endpoint: &Endpoint);

    fn show_error(&self, message: &str);

    /// Wait for the user to act on the landing page.
    async fn next_landing_action(&self) -> LandingAction;
}
