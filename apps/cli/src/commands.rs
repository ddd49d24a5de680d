//! CLI command definitions, routing, and tracing setup.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use gcnwatch_core::{Monitor, ProgressReporter, inspect_circular};
use gcnwatch_notify::{Notifier, SlackNotifier};
use gcnwatch_shared::{
    AppConfig, ExtractionRecord, LoggingConfig, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// GCN Watch: monitor GCN Circulars and extract what they report.
#[derive(Parser)]
#[command(
    name = "gcnwatch",
    version,
    about = "Poll GCN Circulars, extract structured observations with an LLM, and notify Slack.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.gcnwatch/gcnwatch.toml).
    #[arg(short, long, global = true, env = "GCNWATCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Defaults to `run`.
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Poll the circular index until interrupted.
    Run,

    /// Extract a single circular and print the result. Does not touch the
    /// ledger or result file.
    Parse {
        /// Circular number (e.g. 38215) or full circular URL.
        target: String,

        /// Also send the result to Slack.
        #[arg(long)]
        notify: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

/// Load the config named by `--config`, or the default one.
pub(crate) fn load(cli: &Cli) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing from CLI flags and the `[logging]` section.
///
/// `RUST_LOG` wins over `-v`, which wins over `logging.level`. When
/// `logging.file` is set every event is also appended there without ANSI
/// colors.
pub(crate) fn init_tracing(cli: &Cli, logging: &LoggingConfig) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let level = match cli.verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,gcnwatch={level}")));

    let console = match cli.log_format {
        LogFormat::Text => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    let file_layer = logging.file.as_deref().and_then(open_log_file).map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .boxed()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console)
        .with(file_layer)
        .init();
}

fn open_log_file(path: &Path) -> Option<File> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!(
                "warning: could not create log directory {}: {e}; file logging disabled",
                dir.display()
            );
            return None;
        }
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "warning: could not open log file {}: {e}; file logging disabled",
                path.display()
            );
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    match cli.command.unwrap_or(Command::Run) {
        Command::Run => cmd_run(&config).await,
        Command::Parse { target, notify } => cmd_parse(&config, &target, notify).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&config),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config: &AppConfig) -> Result<()> {
    let notifier = SlackNotifier::new(&config.slack)?;
    if !notifier.is_enabled() {
        info!(env = %config.slack.webhook_url_env, "Slack webhook not set, notifications disabled");
    }
    let mut monitor = Monitor::new(config, notifier)?;

    tokio::select! {
        result = monitor.run() => {
            if let Err(e) = result {
                error!(fatal = true, error = %e, "critical error in monitor loop");
                return Err(e.into());
            }
            Ok(())
        }
        _ = tokio::signal::ctrl_c() => {
            info!("GCN monitor stopped by user");
            Ok(())
        }
    }
}

async fn cmd_parse(config: &AppConfig, target: &str, notify: bool) -> Result<()> {
    config.validate()?;

    let reporter = CliProgress::new();
    let record = inspect_circular(config, target, &reporter).await?;

    println!("{}", serde_json::to_string_pretty(&record)?);

    if notify {
        let notifier = SlackNotifier::new(&config.slack)?;
        if !notifier.is_enabled() {
            warn!(
                env = %config.slack.webhook_url_env,
                "Slack notification requested, but no webhook URL is configured"
            );
        } else if notifier.notify(&record).await {
            info!("result sent to Slack");
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config: &AppConfig) -> Result<()> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, record: &ExtractionRecord) {
        if record.extraction_successful {
            self.spinner.finish_and_clear();
        } else {
            self.spinner
                .abandon_with_message(format!("extraction failed for circular {}", record.circular_id));
        }
    }
}
