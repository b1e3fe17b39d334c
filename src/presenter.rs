use crate::traits::{ProbeObserver, Presenter};
use crate::types::{Endpoint, ProbeResult};
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

/// States of the landing page install button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallButton {
    Idle,
    Installing(String),
    Installed,
    Retry,
    IosGuide,
    Probing { index: usize, total: usize },
}

impl InstallButton {
    pub fn label(&self) -> String {
        match self {
            InstallButton::Idle => "Install".to_string(),
            InstallButton::Installing(label) => label.clone(),
            InstallButton::Installed => "Installed".to_string(),
            InstallButton::Retry => "Install again".to_string(),
            InstallButton::IosGuide => "View install steps".to_string(),
            InstallButton::Probing { index, total } => format!("Checking {}/{}", index, total),
        }
    }
}

/// What the user did on the landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandingAction {
    Install,
    Proceed,
    Quit,
}

const IOS_GUIDE: &[&str] = &[
    "Tap the Share button in the toolbar",
    "Scroll down to \"Add to Home Screen\"",
    "Tap \"Add to Home Screen\"",
    "Tap \"Add\" in the top-right corner",
];

type ActionInput = Box<dyn AsyncBufRead + Unpin + Send>;

/// Renders every view as terminal output; landing actions come from stdin.
///
/// One buffered reader lives for the whole session so typed-ahead lines are
/// not lost between prompts.
pub struct TerminalPresenter {
    progress: Mutex<Option<ProgressBar>>,
    input: tokio::sync::Mutex<ActionInput>,
}

impl TerminalPresenter {
    pub fn new() -> Self {
        Self::with_input(BufReader::new(tokio::io::stdin()))
    }

    /// Read landing actions from `reader` instead of stdin.
    pub fn with_input<R>(reader: R) -> Self
    where
        R: AsyncBufRead + Unpin + Send + 'static,
    {
        Self {
            progress: Mutex::new(None),
            input: tokio::sync::Mutex::new(Box::new(reader)),
        }
    }

    fn finish_progress(&self) {
        if let Some(pb) = self.progress.lock().unwrap_or_else(|e| e.into_inner()).take() {
            pb.finish_and_clear();
        }
    }
}

impl ProbeObserver for TerminalPresenter {
    fn on_probe_start(&self, index: usize, total: usize, endpoint: &Endpoint) {
        let mut slot = self.progress.lock().unwrap_or_else(|e| e.into_inner());
        let pb = slot.get_or_insert_with(|| {
            let pb = ProgressBar::new(total as u64);
            if let Ok(style) = ProgressStyle::with_template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
            {
                pb.set_style(style.progress_chars("|| "));
            }
            pb
        });
        pb.set_position(index as u64 - 1);
        pb.set_message(format!("Checking {}", endpoint));
    }

    fn on_probe_result(&self, result: &ProbeResult) {
        if let Some(pb) = self.progress.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            pb.inc(1);
            let status = match result.elapsed_ms {
                Some(ms) => format!("{} ok ({}ms)", result.endpoint, ms),
                None => format!("{} unreachable", result.endpoint),
            };
            pb.println(status);
        }
    }
}

#[async_trait]
impl Presenter for TerminalPresenter {
    fn show_landing(&self) {
        println!("{}", "-".repeat(60));
        println!("Install the app for the best experience.");
        println!("  [i] Install    [Enter] Open in browser    [q] Quit");
        println!("{}", "-".repeat(60));
    }

    fn set_install_button(&self, button: &InstallButton) {
        println!("[ {} ]", button.label());
    }

    fn show_ios_guide(&self) {
        println!("Add this app to your Home Screen:");
        for (i, step) in IOS_GUIDE.iter().enumerate() {
            println!("  {}. {}", i + 1, step);
        }
    }

    fn show_notice(&self, message: &str) {
        println!("{}", message);
    }

    fn show_splash(&self) {
        println!("Starting...");
    }

    fn hide_splash(&self) {
        self.finish_progress();
    }

    fn show_content(&self, endpoint: &Endpoint) {
        self.finish_progress();
        println!("Connected: {}", endpoint.root_url());
    }

    fn show_error(&self, message: &str) {
        self.finish_progress();
        eprintln!("Error: {}", message);
    }

    async fn next_landing_action(&self) -> LandingAction {
        let mut line = String::new();
        let mut input = self.input.lock().await;
        match input.read_line(&mut line).await {
            Ok(0) | Err(_) => LandingAction::Quit,
            Ok(_) => match line.trim().to_lowercase().as_str() {
                "i" | "install" => LandingAction::Install,
                "q" | "quit" => LandingAction::Quit,
                _ => LandingAction::Proceed,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Records every view call; landing actions are scripted.
    #[derive(Default)]
    pub(crate) struct RecordingPresenter {
        pub events: Mutex<Vec<String>>,
        pub actions: Mutex<VecDeque<LandingAction>>,
        /// How long the user takes before each landing action.
        pub think_time: Option<std::time::Duration>,
    }

    impl RecordingPresenter {
        pub(crate) fn with_actions(actions: &[LandingAction]) -> Self {
            Self {
                actions: Mutex::new(actions.iter().copied().collect()),
                ..Self::default()
            }
        }

        pub(crate) fn thinking(mut self, think_time: std::time::Duration) -> Self {
            self.think_time = Some(think_time);
            self
        }

        fn push(&self, event: String) {
            self.events.lock().unwrap().push(event);
        }

        pub(crate) fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl ProbeObserver for RecordingPresenter {
        fn on_probe_start(&self, index: usize, total: usize, _endpoint: &Endpoint) {
            self.push(format!("probe {}/{}", index, total));
        }
    }

    #[async_trait]
    impl Presenter for RecordingPresenter {
        fn show_landing(&self) {
            self.push("landing".to_string());
        }

        fn set_install_button(&self, button: &InstallButton) {
            self.push(format!("button {}", button.label()));
        }

        fn show_ios_guide(&self) {
            self.push("ios-guide".to_string());
        }

        fn show_notice(&self, message: &str) {
            self.push(format!("notice {}", message));
        }

        fn show_splash(&self) {
            self.push("splash".to_string());
        }

        fn hide_splash(&self) {
            self.push("hide-splash".to_string());
        }

        fn show_content(&self, endpoint: &Endpoint) {
            self.push(format!("content {}", endpoint));
        }

        fn show_error(&self, message: &str) {
            self.push(format!("error {}", message));
        }

        async fn next_landing_action(&self) -> LandingAction {
            if let Some(delay) = self.think_time {
                tokio::time::sleep(delay).await;
            }
            self.actions
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(LandingAction::Quit)
        }
    }

    #[test]
    fn button_labels() {
        assert_eq!(InstallButton::Idle.label(), "Install");
        assert_eq!(
            InstallButton::Probing { index: 2, total: 4 }.label(),
            "Checking 2/4"
        );
        assert_eq!(
            InstallButton::Installing("Connecting...".to_string()).label(),
            "Connecting..."
        );
    }

    #[tokio::test]
    async fn terminal_actions_read_line_by_line() {
        let presenter = TerminalPresenter::with_input(std::io::Cursor::new(b"i\n\nQ\n".to_vec()));

        assert_eq!(presenter.next_landing_action().await, LandingAction::Install);
        assert_eq!(presenter.next_landing_action().await, LandingAction::Proceed);
        assert_eq!(presenter.next_landing_action().await, LandingAction::Quit);
        // End of input quits.
        assert_eq!(presenter.next_landing_action().await, LandingAction::Quit);
    }
}
