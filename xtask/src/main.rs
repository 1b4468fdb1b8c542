//! Development tasks for castplay.
//!
//! Run with `cargo xtask <command>`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_mangen::Man;

use castplay::cli::Cli;

#[derive(Parser)]
#[command(name = "xtask", about = "Development tasks for castplay")]
struct Xtask {
    #[command(subcommand)]
    command: Task,
}

#[derive(Subcommand)]
enum Task {
    /// Generate man pages for castplay and its subcommands
    Man {
        /// Output directory
        #[arg(short, long, default_value = "target/man")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    match Xtask::parse().command {
        Task::Man { out_dir } => generate_man_pages(&out_dir),
    }
}

fn generate_man_pages(out_dir: &Path) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let cmd = Cli::command();
    write_man_page(&cmd, out_dir, "castplay")?;

    for sub in cmd.get_subcommands() {
        let name = format!("castplay-{}", sub.get_name());
        write_man_page(sub, out_dir, &name)?;
    }

    println!("Man pages written to {}", out_dir.display());
    Ok(())
}

fn write_man_page(cmd: &clap::Command, out_dir: &Path, name: &str) -> Result<()> {
    let mut buffer = Vec::new();
    Man::new(cmd.clone().name(name.to_string()))
        .render(&mut buffer)
        .with_context(|| format!("Failed to render man page for {name}"))?;

    let path = out_dir.join(format!("{name}.1"));
    fs::write(&path, buffer).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
