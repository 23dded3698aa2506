//! Keepsake CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Talk to the agent from the terminal; lines become fragments
//! - `tools`   — Print the tool schemas sent to the model
//! - `config`  — Show, validate, or initialize configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "keepsake",
    about = "Keepsake — a conversational assistant for event memories",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent; bursts of lines are batched like a messenger would
    Chat {
        /// Sender id to chat as
        #[arg(short, long, default_value = "local")]
        sender: String,

        /// Display name reported for the sender
        #[arg(short, long)]
        name: Option<String>,

        /// Override the batch window in milliseconds
        #[arg(short, long)]
        window_ms: Option<u64>,
    },

    /// Print tool schemas as JSON
    Tools {
        /// Only print this tool
        name: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Check the configuration file and environment
    Validate,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    let json = cli.json_logs
        || keepsake_config::AppConfig::load()
            .map(|c| c.log.json)
            .unwrap_or(false);
    // Logs go to stderr so replies on stdout stay readable.
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Chat { sender, name, window_ms } => commands::chat::run(sender, name, window_ms).await?,
        Commands::Tools { name } => commands::tools::run(name)?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Validate => commands::config_cmd::validate()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Init => commands::config_cmd::init()?,
        },
    }

    Ok(())
}
