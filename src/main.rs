mod commands;

use anyhow::Context as _;
use beacon_channels::WhatsAppFactory;
use beacon_core::{
    config::{self, shellexpand, AdminList, ConfigStore, UserConfig},
    message::normalize_number,
    traits::SessionArchive,
};
use beacon_sessions::{archive::GithubArchive, BotContext, SessionManager};
use clap::{Parser, Subcommand};
use commands::{render_config, CommandRegistry, MediaClient};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "beacon",
    version,
    about = "Beacon: multi-session WhatsApp status bot"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml", env = "BEACON_CONFIG")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect every configured number and run until Ctrl-C.
    Start {
        /// Extra numbers to connect besides `sessions.numbers`.
        numbers: Vec<String>,
    },
    /// Show configuration, archive state and per-number settings.
    Status,
    /// View or edit a number's settings offline.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print a number's settings.
    View { number: String },
    /// Set one key, e.g. `config set 9477... AUTO_LIKE_EMOJI 🔥,😍`.
    Set {
        number: String,
        key: String,
        #[arg(required = true, trailing_var_arg = true)]
        value: Vec<String>,
    },
}

/// Stderr plus a daily rolling file under `<data_dir>/logs`.
fn init_logging(cfg: &config::Config) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let log_dir = Path::new(&shellexpand(&cfg.bot.data_dir)).join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("creating log dir {}", log_dir.display()))?;
    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, "beacon.log"));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.bot.log_level.as_str()));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();
    Ok(guard)
}

fn config_store(cfg: &config::Config) -> ConfigStore {
    ConfigStore::new(
        shellexpand(&cfg.storage.config_dir),
        UserConfig::default(),
        cfg.storage.cache_ttl(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load(&cli.config)?;
    let _log_guard = init_logging(&cfg)?;

    match cli.command {
        Commands::Start { numbers } => {
            let mut numbers: Vec<String> = cfg
                .sessions
                .numbers
                .iter()
                .chain(numbers.iter())
                .map(|n| normalize_number(n))
                .filter(|n| !n.is_empty())
                .collect();
            numbers.sort();
            numbers.dedup();
            if numbers.is_empty() {
                anyhow::bail!(
                    "no numbers to connect. Add them to [sessions].numbers in {} \
                     or pass them to `beacon start`.",
                    cli.config
                );
            }

            let context = Arc::new(BotContext::new(
                cfg.bot.clone(),
                config_store(&cfg),
                AdminList::new(shellexpand(&cfg.storage.admin_file), cfg.storage.cache_ttl()),
                cfg.sessions.clone(),
            ));

            let archive: Option<Arc<dyn SessionArchive>> =
                match GithubArchive::from_config(&cfg.archive, reqwest::Client::new()) {
                    Some(archive) => Some(Arc::new(archive)),
                    None => {
                        warn!("GITHUB_TOKEN not set, credential archiving disabled");
                        None
                    }
                };

            let factory = Arc::new(WhatsAppFactory::new(
                shellexpand(&cfg.storage.session_db),
                cfg.bot.name.clone(),
            ));
            let registry = Arc::new(CommandRegistry::new(
                context.clone(),
                MediaClient::new(&cfg.media)?,
            ));
            let manager = Arc::new(SessionManager::new(factory, archive, context, registry));

            println!("Beacon: starting {} session(s)...", numbers.len());
            let results = manager.start_all(&numbers).await;
            let started = results.iter().filter(|(_, r)| r.is_ok()).count();
            info!("{started}/{} sessions started", results.len());
            for (number, result) in &results {
                match result {
                    Ok(session) => println!("  {number}: {}", session.state),
                    Err(e) => println!("  {number}: failed ({e})"),
                }
            }

            tokio::signal::ctrl_c()
                .await
                .context("waiting for Ctrl-C")?;
            info!("shutting down");
            manager.shutdown().await;
        }
        Commands::Status => {
            println!("Beacon status\n");
            println!("Config: {}", cli.config);
            println!("Bot: {} (owner {})", cfg.bot.name, cfg.bot.owner);
            println!("Data dir: {}", shellexpand(&cfg.bot.data_dir));
            println!("Session db: {}", shellexpand(&cfg.storage.session_db));
            println!(
                "Archive: {}",
                if cfg.archive.is_enabled() {
                    format!(
                        "github.com/{}/{} ({}/ on {})",
                        cfg.archive.owner, cfg.archive.repo, cfg.archive.path, cfg.archive.branch
                    )
                } else {
                    "disabled (no GITHUB_TOKEN)".to_string()
                }
            );
            println!(
                "WhatsApp client: {}",
                if cfg!(feature = "whatsapp-web") {
                    "built in"
                } else {
                    "not compiled (enable the `whatsapp-web` feature)"
                }
            );
            println!();

            let store = config_store(&cfg);
            if cfg.sessions.numbers.is_empty() {
                println!("No numbers configured.");
            }
            for number in &cfg.sessions.numbers {
                match store.load(number).await {
                    Ok(user) => println!("{}\n", render_config(number, &user)),
                    Err(e) => println!("{number}: invalid config ({e})\n"),
                }
            }
        }
        Commands::Config { action } => {
            let store = config_store(&cfg);
            match action {
                ConfigAction::View { number } => {
                    let user = store.load(&number).await?;
                    println!("{}", render_config(&number, &user));
                }
                ConfigAction::Set { number, key, value } => {
                    let user = store.set(&number, &key, &value.join(" ")).await?;
                    println!("Saved to {}", store.path_for(&number).display());
                    println!("{}", render_config(&number, &user));
                }
            }
        }
    }

    Ok(())
}
