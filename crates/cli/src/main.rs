//! tripclaw CLI, the main entry point.
//!
//! Commands:
//! - `chat`    Interactive multi-turn conversation
//! - `plan`    Run the recommendation workflow once
//! - `prefs`   Show or update a session's travel preferences
//! - `config`  Print the config path, the effective config or a starter file

use clap::{Parser, Subcommand};
use tripclaw_core::checkpoint::MAX_TRIP_DAYS;

mod commands;

#[derive(Parser)]
#[command(name = "tripclaw", about = "tripclaw: multi-turn travel planning assistant", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the travel assistant
    Chat {
        /// Continue an existing session instead of starting a new one
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Plan a trip without a conversation
    Plan {
        /// Destination city
        #[arg(short, long)]
        city: String,

        /// Trip length in days
        #[arg(
            short,
            long,
            default_value_t = 2,
            value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_TRIP_DAYS))
        )]
        days: u32,

        /// Free-text request stored with the plan
        #[arg(short, long)]
        query: Option<String>,

        /// Session whose preferences shape the plan
        #[arg(short, long, default_value = "cli")]
        session: String,
    },

    /// Show or change a session's preferences
    Prefs(commands::prefs::PrefsArgs),

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat { session } => commands::chat::run(session).await?,
        Commands::Plan {
            city,
            days,
            query,
            session,
        } => commands::plan::run(&session, city, days, query).await?,
        Commands::Prefs(args) => commands::prefs::run(args).await?,
        Commands::Config { action } => match action {
            ConfigAction::Path => commands::config_cmd::path()?,
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Init => commands::config_cmd::init()?,
        },
    }

    Ok(())
}
