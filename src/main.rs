//! Agent Watch - lifecycle notifications for coding-assistant CLIs.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use url::Url;

use agent_watch::agents::{builtin_agents, resolve_agents};
use agent_watch::config::{ConfigLoader, Verbosity, WatchConfig, WebhookConfig};
use agent_watch::display;
use agent_watch::notifier::{
    FanoutNotifier, LogNotifier, Notifier, StdoutNotifier, WebhookNotifier,
};
use agent_watch::watcher::{ScheduleMode, Watcher};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VerbosityArg {
    Minimal,
    Normal,
    Verbose,
}

impl From<VerbosityArg> for Verbosity {
    fn from(arg: VerbosityArg) -> Self {
        match arg {
            VerbosityArg::Minimal => Verbosity::Minimal,
            VerbosityArg::Normal => Verbosity::Normal,
            VerbosityArg::Verbose => Verbosity::Verbose,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "agent-watch",
    about = "Notifications when coding-assistant sessions finish or need attention",
    version
)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Config file (defaults to .agent-watch.toml, then the user config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch agent logs using filesystem notifications.
    Watch(WatchArgs),
    /// Watch agent logs by polling at a fixed interval.
    Poll(WatchArgs),
    /// List known agents and whether their logs exist.
    Agents,
}

#[derive(Args, Debug)]
struct WatchArgs {
    /// Agent to watch; repeat for several. Overrides the config file.
    #[arg(short, long = "agent")]
    agents: Vec<String>,
    /// Seconds of silence before a quiet notification.
    #[arg(long)]
    quiet_secs: Option<u64>,
    /// Poll interval in milliseconds (poll mode).
    #[arg(long)]
    poll_ms: Option<u64>,
    /// Notification detail.
    #[arg(long, value_enum)]
    verbosity: Option<VerbosityArg>,
    /// Track each log file as its own session.
    #[arg(long)]
    per_instance: bool,
    /// Sample the assistant process for idleness and exit.
    #[arg(long)]
    track_process: bool,
    /// Read existing log content instead of starting at the end.
    #[arg(long)]
    from_start: bool,
    /// POST each notification as JSON to this URL.
    #[arg(long)]
    webhook: Option<Url>,
    /// Print full snippets without truncation.
    #[arg(long)]
    raw: bool,
}

impl WatchArgs {
    fn apply(&self, config: &mut WatchConfig) {
        if !self.agents.is_empty() {
            config.agents.clone_from(&self.agents);
        }
        if let Some(secs) = self.quiet_secs {
            config.quiet_secs = secs;
        }
        if let Some(ms) = self.poll_ms {
            config.poll_interval_ms = ms;
        }
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity.into();
        }
        config.per_instance |= self.per_instance;
        config.track_process |= self.track_process;
        config.from_start |= self.from_start;
        config.raw_snippets |= self.raw;
        if let Some(url) = &self.webhook {
            config.webhook = Some(WebhookConfig {
                url: url.clone(),
                timeout_secs: config.webhook.as_ref().map_or(10, |w| w.timeout_secs),
            });
        }
    }
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<WatchConfig, String> {
    let loader = path.map_or_else(ConfigLoader::new, ConfigLoader::with_path);
    loader.load().map_err(|e| e.to_string())
}

fn build_notifier(config: &WatchConfig, raw: bool) -> Result<Arc<dyn Notifier>, String> {
    let mut fanout = FanoutNotifier::new(vec![
        Arc::new(StdoutNotifier::new(raw)),
        Arc::new(LogNotifier),
    ]);
    if let Some(webhook) = &config.webhook {
        let notifier = WebhookNotifier::new(webhook).map_err(|e| e.to_string())?;
        tracing::info!(url = %notifier.url(), "Webhook notifications enabled");
        fanout.push(Arc::new(notifier));
    }
    Ok(Arc::new(fanout))
}

async fn run_watch(
    config_path: Option<PathBuf>,
    args: &WatchArgs,
    mode: ScheduleMode,
) -> Result<(), String> {
    let mut config = load_config(config_path)?;
    args.apply(&mut config);

    let agents = resolve_agents(&config).map_err(|e| e.to_string())?;
    for agent in &agents {
        display::print_watch_start(agent, mode.as_str());
    }

    let notifier = build_notifier(&config, config.raw_snippets)?;
    let mut watcher =
        Watcher::new(agents, config, notifier, mode).map_err(|e| e.to_string())?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
        }
        signal_cancel.cancel();
    });

    watcher.run(cancel).await.map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match &cli.command {
        Commands::Watch(args) => run_watch(cli.config.clone(), args, ScheduleMode::Events).await,
        Commands::Poll(args) => run_watch(cli.config.clone(), args, ScheduleMode::Polling).await,
        Commands::Agents => {
            let config = load_config(cli.config.clone());
            for agent in builtin_agents() {
                display::print_agent_row(&agent);
            }
            match config {
                Ok(config) => {
                    for custom in &config.custom_agents {
                        display::print_agent_row(&custom.to_agent());
                    }
                    Ok(())
                }
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            display::print_error(&message);
            ExitCode::FAILURE
        }
    }
}
