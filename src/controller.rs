use crate::cache;
use crate::config::Settings;
use crate::error::{PickerError, Result};
use crate::loader;
use crate::platform::{self, DeferredPrompt, DisplaySignals, InstallChoice, LaunchMode, PlatformEvent};
use crate::presenter::{InstallButton, LandingAction};
use crate::selector::{self, SelectionPolicy};
use crate::traits::{ContentFrame, InstallPrompt, ProbeObserver, Prober, Presenter, SessionStore};
use crate::types::{Endpoint, ProbeResult};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

const MSG_UNREACHABLE: &str = "Unable to reach the server right now";
const MSG_LOAD_FAILED: &str = "Failed to start the app, please retry later";
const MSG_INSTALL_UNSUPPORTED: &str =
    "This browser cannot install the app. Please use Chrome, Edge or another modern browser.";

/// Where the shell is in its startup sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Init,
    BrowserLanding,
    PwaSplash,
    Selecting,
    ContentShown,
    ErrorShown,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Init => "init",
            Mode::BrowserLanding => "browser-landing",
            Mode::PwaSplash => "pwa-splash",
            Mode::Selecting => "selecting",
            Mode::ContentShown => "content-shown",
            Mode::ErrorShown => "error-shown",
        };
        f.write_str(name)
    }
}

/// Mutable state owned by the controller for the whole run.
pub struct ControllerState {
    pub mode: Mode,
    pub launch: Option<LaunchMode>,
    pub current: Option<Endpoint>,
    /// Endpoints that answered during the latest selection.
    pub available: Vec<ProbeResult>,
    pub installable: bool,
    pub deferred_prompt: Option<Arc<dyn InstallPrompt>>,
    pub attempt: u32,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            mode: Mode::Init,
            launch: None,
            current: None,
            available: Vec::new(),
            installable: false,
            deferred_prompt: None,
            attempt: 0,
        }
    }
}

/// Terminal result of one pass through the flow.
#[derive(Debug)]
pub enum AttemptOutcome {
    Content(Endpoint),
    Failed(PickerError),
    Quit,
}

/// How a whole run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Content(Endpoint),
    Quit,
}

enum LandingStep {
    Action(LandingAction),
    Event(Option<PlatformEvent>),
    IosRecheck,
}

/// Forwards probe progress to the presenter and mirrors it on the install button.
struct ButtonProgress<'a> {
    presenter: &'a dyn Presenter,
}

impl ProbeObserver for ButtonProgress<'_> {
    fn on_probe_start(&self, index: usize, total: usize, endpoint: &Endpoint) {
        self.presenter.on_probe_start(index, total, endpoint);
        self.presenter
            .set_install_button(&InstallButton::Probing { index, total });
    }

    fn on_probe_result(&self, result: &ProbeResult) {
        self.presenter.on_probe_result(result);
    }
}

async fn next_platform_event(
    events: &mut Option<UnboundedReceiver<PlatformEvent>>,
) -> Option<PlatformEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Drives Init → {landing, splash} → selecting → {content, error}, restarting
/// from Init after every error.
pub struct Controller<'a> {
    settings: Settings,
    signals: DisplaySignals,
    prober: &'a dyn Prober,
    frame: &'a dyn ContentFrame,
    store: &'a dyn SessionStore,
    presenter: &'a dyn Presenter,
    events: Option<UnboundedReceiver<PlatformEvent>>,
    max_attempts: Option<u32>,
    state: ControllerState,
}

impl<'a> Controller<'a> {
    pub fn new(
        settings: Settings,
        signals: DisplaySignals,
        prober: &'a dyn Prober,
        frame: &'a dyn ContentFrame,
        store: &'a dyn SessionStore,
        presenter: &'a dyn Presenter,
    ) -> Self {
        Self {
            settings,
            signals,
            prober,
            frame,
            store,
            presenter,
            events: None,
            max_attempts: None,
            state: ControllerState::new(),
        }
    }

    pub fn with_events(mut self, events: UnboundedReceiver<PlatformEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_install_prompt(mut self, prompt: Arc<dyn InstallPrompt>) -> Self {
        self.state.deferred_prompt = Some(prompt);
        self.state.installable = true;
        self
    }

    /// Stop after this many attempts instead of restarting forever.
    pub fn with_max_attempts(mut self, max: Option<u32>) -> Self {
        self.max_attempts = max;
        self
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Run until content is shown or the user quits. Errors restart the whole
    /// flow after `restart_delay` (or as soon as the network comes back).
    pub async fn run(&mut self) -> Result<RunOutcome> {
        loop {
            match self.run_attempt().await {
                AttemptOutcome::Content(endpoint) => return Ok(RunOutcome::Content(endpoint)),
                AttemptOutcome::Quit => return Ok(RunOutcome::Quit),
                AttemptOutcome::Failed(err) => {
                    if self
                        .max_attempts
                        .is_some_and(|max| self.state.attempt >= max)
                    {
                        return Err(err);
                    }
                    self.wait_before_restart().await;
                }
            }
        }
    }

    /// One pass from Init to a terminal state.
    pub async fn run_attempt(&mut self) -> AttemptOutcome {
        self.state.attempt += 1;
        self.state.current = None;
        self.state.available.clear();
        self.transition(Mode::Init);
        self.drain_events();

        let launch = self.signals.classify();
        self.state.launch = Some(launch);
        tracing::info!(attempt = self.state.attempt, ?launch, "Starting");

        let result = match launch {
            LaunchMode::Standalone => self.standalone_flow().await,
            LaunchMode::Browser => match self.landing().await {
                LandingAction::Quit => return AttemptOutcome::Quit,
                _ => self.select_and_load().await,
            },
        };

        match result {
            Ok(endpoint) => {
                self.presenter.show_content(&endpoint);
                self.transition(Mode::ContentShown);
                AttemptOutcome::Content(endpoint)
            }
            Err(err) => {
                let message = match &err {
                    PickerError::NoReachableEndpoint(_) => MSG_UNREACHABLE,
                    _ => MSG_LOAD_FAILED,
                };
                tracing::warn!(error = %err, "Attempt failed");
                self.presenter.show_error(message);
                self.transition(Mode::ErrorShown);
                AttemptOutcome::Failed(err)
            }
        }
    }

    async fn standalone_flow(&mut self) -> Result<Endpoint> {
        self.transition(Mode::PwaSplash);
        self.presenter.show_splash();
        tokio::time::sleep(self.settings.splash_delay()).await;

        let result = self.select_and_load().await;

        // Let the splash fade before revealing whatever comes next.
        self.presenter.hide_splash();
        tokio::time::sleep(self.settings.reveal_delay()).await;
        result
    }

    /// Landing page loop. Returns the action that leaves the page
    /// (`Proceed` also stands for a completed install).
    async fn landing(&mut self) -> LandingAction {
        self.transition(Mode::BrowserLanding);
        self.presenter.show_landing();
        let ios = self.signals.is_ios();
        // iOS also starts on "Install"; the manual steps appear once tapped.
        self.presenter.set_install_button(&InstallButton::Idle);

        tracing::debug!(installable = self.state.installable, ios, "Landing shown");

        let recheck = tokio::time::sleep(self.settings.ios_guide_recheck());
        tokio::pin!(recheck);
        let mut recheck_pending = ios;

        let presenter = self.presenter;
        loop {
            let step = tokio::select! {
                action = presenter.next_landing_action() => LandingStep::Action(action),
                event = next_platform_event(&mut self.events) => LandingStep::Event(event),
                _ = &mut recheck, if recheck_pending => LandingStep::IosRecheck,
            };

            match step {
                LandingStep::IosRecheck => {
                    recheck_pending = false;
                    if !self.state.installable {
                        tracing::debug!("Still no install prompt on iOS, re-arming manual steps");
                        self.presenter.set_install_button(&InstallButton::Idle);
                    }
                }
                LandingStep::Event(Some(event)) => self.apply_event(event),
                LandingStep::Event(None) => self.events = None,
                LandingStep::Action(LandingAction::Install) => {
                    if self.install(ios).await {
                        return LandingAction::Proceed;
                    }
                }
                LandingStep::Action(action) => return action,
            }
        }
    }

    /// Returns true when the app was installed and should launch.
    async fn install(&mut self, ios: bool) -> bool {
        let Some(prompt) = self.state.deferred_prompt.clone() else {
            if ios {
                let ua = self.signals.user_agent.as_deref().unwrap_or_default();
                let version = platform::ios_version(ua).ok().flatten();
                let prompt_capable = platform::ios_supports_install_prompt(ua).unwrap_or(false);
                tracing::info!(?version, prompt_capable, "No install prompt, showing manual iOS steps");
                self.presenter.set_install_button(&InstallButton::IosGuide);
                self.presenter.show_ios_guide();
            } else {
                tracing::info!("Install requested but no prompt is available");
                self.presenter.show_notice(MSG_INSTALL_UNSUPPORTED);
            }
            return false;
        };

        self.presenter
            .set_install_button(&InstallButton::Installing("Installing...".to_string()));

        match prompt.prompt().await {
            Ok(InstallChoice::Accepted) => {
                tracing::info!("User accepted install");
                self.state.deferred_prompt = None;
                self.state.installable = false;
                self.presenter.set_install_button(&InstallButton::Installed);
                tokio::time::sleep(self.settings.install_launch_delay()).await;
                true
            }
            Ok(InstallChoice::Dismissed) => {
                tracing::info!("User dismissed install");
                self.state.deferred_prompt = None;
                self.presenter.set_install_button(&InstallButton::Idle);
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, "Install prompt failed");
                self.presenter.set_install_button(&InstallButton::Retry);
                tokio::time::sleep(self.settings.install_retry_reset()).await;
                self.presenter.set_install_button(&InstallButton::Idle);
                false
            }
        }
    }

    async fn select_and_load(&mut self) -> Result<Endpoint> {
        self.transition(Mode::Selecting);
        let browser = self.state.launch == Some(LaunchMode::Browser);
        if browser {
            self.presenter
                .set_install_button(&InstallButton::Installing("Connecting...".to_string()));
        }

        let last_known_good = match cache::last_known_good(self.store).await {
            Ok(lkg) => lkg,
            Err(e) => {
                tracing::warn!(error = %e, "Could not read last working endpoint");
                None
            }
        };

        let policy = SelectionPolicy {
            probe_timeout: self.settings.probe_timeout(),
            fast_path: self.settings.fast_path(),
        };
        let candidates = &self.settings.endpoints;
        let report = if browser {
            let observer = ButtonProgress {
                presenter: self.presenter,
            };
            selector::select_best(self.prober, candidates, last_known_good.as_ref(), policy, &observer)
                .await
        } else {
            selector::select_best(
                self.prober,
                candidates,
                last_known_good.as_ref(),
                policy,
                self.presenter,
            )
            .await
        };
        self.state.available = report.available;

        let Some(winner) = report.outcome.winner else {
            return Err(PickerError::NoReachableEndpoint(candidates.len()));
        };

        if let Err(e) = cache::remember(self.store, &winner).await {
            tracing::warn!(error = %e, "Could not persist last working endpoint");
        }
        self.state.current = Some(winner.clone());

        if browser {
            self.presenter
                .set_install_button(&InstallButton::Installing("Starting...".to_string()));
        }
        loader::load(self.frame, &winner, self.settings.load_timeout()).await?;
        Ok(winner)
    }

    async fn wait_before_restart(&mut self) {
        let delay = tokio::time::sleep(self.settings.restart_delay());
        tokio::pin!(delay);

        loop {
            let event = tokio::select! {
                _ = &mut delay => {
                    tracing::info!("Retrying");
                    return;
                }
                event = next_platform_event(&mut self.events) => event,
            };

            match event {
                Some(PlatformEvent::Online) => {
                    tracing::info!("Network back online, retrying now");
                    return;
                }
                Some(event) => self.apply_event(event),
                None => self.events = None,
            }
        }
    }

    fn drain_events(&mut self) {
        let mut pending = Vec::new();
        if let Some(rx) = self.events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                pending.push(event);
            }
        }
        for event in pending {
            self.apply_event(event);
        }
    }

    fn apply_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::InstallPromptAvailable(DeferredPrompt(prompt)) => {
                tracing::info!("Install prompt available");
                self.state.deferred_prompt = Some(prompt);
                self.state.installable = true;
                if self.state.mode == Mode::BrowserLanding {
                    self.presenter.set_install_button(&InstallButton::Idle);
                }
            }
            PlatformEvent::AppInstalled => {
                tracing::info!("App installed");
                self.state.deferred_prompt = None;
                self.state.installable = false;
            }
            PlatformEvent::Online => tracing::info!("Network online"),
            PlatformEvent::Offline => tracing::warn!("Network offline"),
        }
    }

    fn transition(&mut self, to: Mode) {
        tracing::debug!(from = %self.state.mode, to = %to, "Mode change");
        self.state.mode = to;
    }
}
