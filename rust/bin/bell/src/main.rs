//! `bell` — terminal notification bell for the rental API.
//!
//! Drives the notification sync core against a live server: badge count,
//! dropdown list, mark read, and a live `watch` mode fed by push
//! envelopes on stdin.

mod commands;
mod config;

use clap::{Parser, Subcommand};

/// Rental notification bell.
#[derive(Parser, Debug)]
#[command(name = "bell", about = "Rental notification bell")]
struct Cli {
    /// Path to client config file (default: ~/.rental-bell/config.toml).
    #[arg(long = "config", global = true)]
    config: Option<String>,

    /// API base URL, overrides the config file.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Bearer token, overrides the config file.
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the unread count (the badge).
    Count,

    /// Open the dropdown and list notifications.
    List {
        /// Number of pages to load.
        #[arg(long, default_value_t = 1)]
        pages: u32,
    },

    /// Mark one notification read.
    Read { id: String },

    /// Click a notification: mark it read and show its target or detail.
    Open { id: String },

    /// Mark every notification read.
    #[command(name = "read-all")]
    ReadAll,

    /// Keep the dropdown open and re-render on every change.
    ///
    /// Reads push envelopes as JSON lines from stdin. Also accepts the
    /// commands `more`, `all`, `read <id>`, `open <id>`, `focus`.
    Watch,

    /// Client configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Set properties in the config file.
    Set {
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        page_size: Option<u32>,
        #[arg(long)]
        poll_interval: Option<u64>,
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_path = cli
        .config
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::ClientConfig::default_path);

    let command = match cli.command {
        Commands::Config { action } => {
            match action {
                ConfigAction::Show => commands::config::show(&config_path)?,
                ConfigAction::Set {
                    server,
                    token,
                    page_size,
                    poll_interval,
                    timeout,
                } => commands::config::set(
                    &config_path,
                    commands::config::Changes {
                        server,
                        token,
                        page_size,
                        poll_interval,
                        timeout,
                    },
                )?,
            }
            return Ok(());
        }
        command => command,
    };

    let config = config::ClientConfig::load(&config_path)?.with_overrides(cli.server, cli.token);
    let controller = commands::connect(&config)?;

    match command {
        Commands::Count => commands::list::count(&controller).await?,
        Commands::List { pages } => commands::list::list(&controller, pages).await?,
        Commands::Read { id } => commands::list::read(&controller, &id).await?,
        Commands::Open { id } => commands::list::open(&controller, &id).await?,
        Commands::ReadAll => commands::list::read_all(&controller).await?,
        Commands::Watch => commands::watch::run(&controller).await?,
        Commands::Config { .. } => unreachable!("handled above"),
    }

    Ok(())
}
