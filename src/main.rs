use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use domainpick::cache::{self, FileStore, MemoryStore};
use domainpick::config::{self, Settings};
use domainpick::controller::{Controller, RunOutcome};
use domainpick::error::PickerError;
use domainpick::loader::HttpFrame;
use domainpick::platform::DisplaySignals;
use domainpick::presenter::TerminalPresenter;
use domainpick::prober::HttpProber;
use domainpick::selector::{self, SelectionPolicy};
use domainpick::traits::{Presenter, ProbeObserver, Prober, SessionStore};
use domainpick::types::ProbeFailure;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "domainpick")]
#[command(about = "Pick the fastest reachable mirror and open it", long_about = None)]
struct Cli {
    /// Settings file (defaults to ~/.config/domainpick/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session file holding the last working endpoint
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Do not read or write the last working endpoint
    #[arg(long, global = true)]
    no_cache: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full startup flow (landing or splash, select, load)
    Run {
        /// Launched as an installed app
        #[arg(long)]
        standalone: bool,

        /// Display mode reported by the platform (e.g. standalone, browser)
        #[arg(long)]
        display_mode: Option<String>,

        /// User agent used for install guidance
        #[arg(long)]
        user_agent: Option<String>,

        /// Give up after this many attempts instead of retrying forever
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Probe every configured endpoint and print a latency table
    Probe,
    /// Select the best endpoint and remember it
    Select,
    /// Show configured endpoints and the last working one
    Status,
    /// Forget the last working endpoint
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "domainpick=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref())?;
    tracing::debug!(
        endpoints = settings.endpoints.len(),
        probe_timeout_ms = settings.probe_timeout_ms,
        fast_path_ms = settings.fast_path_ms,
        "Settings loaded"
    );

    let store: Box<dyn SessionStore> = if cli.no_cache {
        Box::new(MemoryStore::default())
    } else {
        match cli.store {
            Some(path) => Box::new(FileStore::with_path(path)),
            None => Box::new(FileStore::new()),
        }
    };

    match cli.command {
        Commands::Run {
            standalone,
            display_mode,
            user_agent,
            max_attempts,
        } => {
            let signals = DisplaySignals {
                navigator_standalone: standalone,
                display_mode,
                user_agent,
            };
            handle_run(settings, signals, store.as_ref(), max_attempts).await?
        }
        Commands::Probe => handle_probe(&settings).await?,
        Commands::Select => handle_select(&settings, store.as_ref()).await?,
        Commands::Status => handle_status(&settings, store.as_ref()).await?,
        Commands::Reset => handle_reset(store.as_ref()).await?,
    }

    Ok(())
}

// --- Handlers ---

async fn handle_run(
    settings: Settings,
    signals: DisplaySignals,
    store: &dyn SessionStore,
    max_attempts: Option<u32>,
) -> Result<()> {
    let prober = HttpProber::new()?;
    let frame = HttpFrame::new()?;
    let presenter = TerminalPresenter::new();

    let mut controller = Controller::new(settings, signals, &prober, &frame, store, &presenter)
        .with_max_attempts(max_attempts);

    let outcome = controller.run().await?;
    let attempts = controller.state().attempt;
    match outcome {
        RunOutcome::Content(endpoint) => {
            tracing::info!(%endpoint, attempts, "Content shown");
        }
        RunOutcome::Quit => println!("Bye."),
    }
    Ok(())
}

async fn handle_probe(settings: &Settings) -> Result<()> {
    let prober = HttpProber::new()?;
    let presenter = TerminalPresenter::new();
    let total = settings.endpoints.len();

    let mut results = Vec::with_capacity(total);
    for (i, endpoint) in settings.endpoints.iter().enumerate() {
        presenter.on_probe_start(i + 1, total, endpoint);
        let res = prober.probe(endpoint, settings.probe_timeout()).await;
        presenter.on_probe_result(&res);
        results.push(res);
    }
    presenter.hide_splash();

    // 排序: 延迟低的在前, 失败的在后
    results.sort_by_key(|r| r.elapsed_ms.unwrap_or(u64::MAX));

    println!();
    println!("{:<4} {:<10} URL", "RANK", "LATENCY");
    println!("{}", "-".repeat(60));

    for (i, res) in results.iter().enumerate() {
        let latency_str = match (res.elapsed_ms, res.failure) {
            (Some(ms), _) => format!("{}ms", ms),
            (None, Some(ProbeFailure::Timeout(_))) => "Timeout".to_string(),
            (None, _) => "Failed".to_string(),
        };
        println!("{:<4} {:<10} {}", i + 1, latency_str, res.endpoint);
    }

    Ok(())
}

async fn handle_select(settings: &Settings, store: &dyn SessionStore) -> Result<()> {
    let prober = HttpProber::new()?;
    let presenter = TerminalPresenter::new();
    let last_known_good = cache::last_known_good(store).await?;

    let policy = SelectionPolicy {
        probe_timeout: settings.probe_timeout(),
        fast_path: settings.fast_path(),
    };
    let report = selector::select_best(
        &prober,
        &settings.endpoints,
        last_known_good.as_ref(),
        policy,
        &presenter,
    )
    .await;
    presenter.hide_splash();

    let Some(winner) = report.outcome.winner else {
        bail!(PickerError::NoReachableEndpoint(settings.endpoints.len()));
    };

    cache::remember(store, &winner).await?;
    println!(
        "Selected {} ({}ms){}",
        winner,
        report.outcome.elapsed_ms.unwrap_or_default(),
        if report.early_exit { " [last working]" } else { "" }
    );
    Ok(())
}

async fn handle_status(settings: &Settings, store: &dyn SessionStore) -> Result<()> {
    let last_known_good = cache::last_known_good(store).await?;

    println!("{}", "-".repeat(60));
    println!("{:<4} {:<44} Status", "#", "Endpoint");
    println!("{}", "-".repeat(60));
    for (i, endpoint) in settings.endpoints.iter().enumerate() {
        let status = if Some(endpoint) == last_known_good.as_ref() {
            "[Last working]"
        } else {
            ""
        };
        println!("{:<4} {:<44} {}", i + 1, endpoint.as_str(), status);
    }
    println!("{}", "-".repeat(60));

    match last_known_good {
        Some(lkg) if !settings.endpoints.contains(&lkg) => {
            println!("Stored endpoint {} is no longer configured and will be ignored.", lkg)
        }
        None => println!("No working endpoint remembered yet."),
        _ => {}
    }
    Ok(())
}

async fn handle_reset(store: &dyn SessionStore) -> Result<()> {
    cache::forget(store).await?;
    println!("Forgot the last working endpoint.");
    Ok(())
}
