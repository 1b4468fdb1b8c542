//! Completions subcommand handler

use anyhow::Result;
use clap::CommandFactory;
use clap_complete::Shell;

use castplay::cli::Cli;

/// Print a completion script for `shell` to stdout.
pub fn handle(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "castplay", &mut std::io::stdout());
    Ok(())
}
