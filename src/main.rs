//! castplay - terminal session player

mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use castplay::cli::{git_sha, Cli, Commands, ConfigCommands};

/// Environment variable holding the log filter, e.g. `castplay=debug`.
const LOG_ENV: &str = "CASTPLAY_LOG";

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[cfg(not(tarpaulin_include))]
#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    tracing::debug!(sha = git_sha(), "starting castplay");

    match cli.command {
        Commands::Play(args) => commands::play::handle(args).await,
        Commands::Info {
            file,
            format,
            timing,
        } => commands::info::handle(file, format, timing).await,
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::handle_show(),
            ConfigCommands::Path => commands::config::handle_path(),
            ConfigCommands::Init { force } => commands::config::handle_init(force),
        },
        Commands::Completions { shell } => commands::completions::handle(shell),
    }
}
