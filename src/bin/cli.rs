//! Course Monitor CLI
//!
//! Administrative surface: run checks, manage monitored modules, and run
//! the daily scheduler as a daemon.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use course_monitor::{
    error::{AppError, Result},
    models::{Config, Destination, Module},
    pipeline::{Engine, Scheduler, StopSignal, Trigger, stop_signal, trigger_cycle},
    services::TelegramChannel,
};
use tokio::sync::Mutex;

/// Course Monitor - e-learning resource notifier
#[derive(Parser, Debug)]
#[command(
    name = "course-monitor",
    version,
    about = "Forwards new course resources to Telegram"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Override the data directory from the configuration
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one check cycle now
    Check,

    /// Run the daily scheduler until interrupted
    Run {
        /// Also run a check immediately on startup
        #[arg(long)]
        run_now: bool,
    },

    /// Start monitoring a course page
    Add {
        /// Display name of the module
        name: String,

        /// Course page URL
        url: String,

        /// Chat id, or chat_thread for a forum topic
        #[arg(short = 't', long)]
        destination: Destination,

        /// Module id (default: the `id` query parameter of the URL)
        #[arg(long)]
        id: Option<String>,
    },

    /// List monitored modules
    List,

    /// Stop monitoring a module
    Remove {
        id: String,

        /// Also forget which resources were already delivered
        #[arg(long)]
        purge_history: bool,
    },

    /// Test the portal login
    Login,

    /// Validate the configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load the file configuration, then apply environment overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(&cli.config);
    config.apply_env()?;
    if let Some(data_dir) = &cli.data_dir {
        config.paths.data_dir = data_dir.clone();
    }
    Ok(config)
}

async fn open_engine(config: &Arc<Config>) -> Result<Engine> {
    let timeout = Duration::from_secs(config.portal.timeout_secs.saturating_mul(4));
    let channel = Arc::new(TelegramChannel::new(&config.telegram, timeout)?);
    Engine::open(Arc::clone(config), channel).await
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = load_config(&cli)?;
    log::debug!("Configuration: {:?}", config);

    match &cli.command {
        Command::Validate => {
            log::info!("Validating configuration...");
            config.validate()?;
            log::info!("✓ Config OK");
            if let Err(e) = config.validate_runtime() {
                log::warn!("Not ready for live checks: {}", e);
            }
            return Ok(());
        }
        Command::Check | Command::Run { .. } | Command::Login => config.validate_runtime()?,
        _ => config.validate()?,
    }

    let config = Arc::new(config);
    let mut engine = open_engine(&config).await?;

    match cli.command {
        Command::Check => {
            log::info!("🔍 Checking modules for new files...");
            match engine.run_cycle(Trigger::Manual, &StopSignal::never()).await {
                Ok(report) => log::info!("✅ Check completed! {}", report),
                Err(e) => {
                    log::error!("❌ Check failed: {}", e);
                    return Err(e);
                }
            }
        }

        Command::Run { run_now } => {
            let engine = Arc::new(Mutex::new(engine));
            let (handle, stop) = stop_signal();

            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("Interrupt received, stopping after the current step");
                    handle.stop();
                }
            });

            if run_now {
                match trigger_cycle(&engine, Trigger::Manual, &stop).await {
                    Some(Ok(report)) => log::info!("✅ Check completed! {}", report),
                    Some(Err(e)) => log::error!("❌ Check failed: {}", e),
                    None => {}
                }
            }

            let scheduler = Scheduler::new(Arc::clone(&engine), &config.schedule)?;
            log::info!("Scheduler started, daily check at {}", config.schedule.daily_at);
            scheduler.run(stop).await;
        }

        Command::Add {
            name,
            url,
            destination,
            id,
        } => {
            let id = id.unwrap_or_else(|| Module::derive_id(&url));
            if let Some(previous) = engine.register_module(&id, &name, &url, destination).await? {
                log::warn!("Replaced existing module {} ({})", id, previous.name);
            }
            log::info!("✅ Module added: {} (id {}) -> {}", name, id, destination);
        }

        Command::List => {
            let modules = engine.modules();
            if modules.is_empty() {
                println!("No modules are being monitored.");
            }
            for module in modules {
                println!(
                    "{}\t{}\t{}\t{}\t(added {})",
                    module.id,
                    module.name,
                    module.destination,
                    module.url,
                    module.added_at.format("%Y-%m-%d %H:%M")
                );
            }
        }

        Command::Remove { id, purge_history } => match engine.remove_module(&id, purge_history).await? {
            Some(module) => log::info!("Module {} ({}) removed", id, module.name),
            None => return Err(AppError::validation(format!("no module with id '{id}'"))),
        },

        Command::Login => {
            engine.test_login().await?;
            log::info!(
                "✅ Login successful ({} session cookies saved)",
                engine.session().cookies().len()
            );
        }

        Command::Validate => {}
    }

    Ok(())
}
