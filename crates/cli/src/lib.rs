pub mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use skydesk_core::{AppConfig, LoadOptions, LogFormat};

#[derive(Debug, Parser)]
#[command(
    name = "skydesk",
    about = "Airline support desk operator CLI",
    after_help = "Examples:\n  skydesk chat\n  skydesk chat --session window-seat-fan\n  skydesk config"
)]
pub struct Cli {
    /// Path to a skydesk.toml config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Chat with the support desk using the offline rule-based oracle")]
    Chat {
        #[arg(long, default_value = "local", help = "Session id; reuse to continue a conversation")]
        session: String,
    },
    #[command(about = "Print the effective configuration with secrets redacted")]
    Config,
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        LogFormat::Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        LogFormat::Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config.clone(),
        require_file: cli.config.is_some(),
    };
    let config = AppConfig::load(options)?;

    match cli.command {
        Command::Chat { session } => {
            init_logging(&config);
            commands::chat::run(&config, &session).await
        }
        Command::Config => {
            println!("{}", commands::config::render(&config));
            Ok(())
        }
    }
}
