//! Config subcommands handler

use anyhow::{bail, Result};

use castplay::Config;

/// Show current configuration as TOML.
#[cfg(not(tarpaulin_include))]
pub fn handle_show() -> Result<()> {
    let config = Config::load()?;
    let toml_str = toml::to_string_pretty(&config)?;
    print!("{}", toml_str);
    Ok(())
}

/// Print where the configuration file lives, whether or not it exists.
#[cfg(not(tarpaulin_include))]
pub fn handle_path() -> Result<()> {
    println!("{}", Config::config_path()?.display());
    Ok(())
}

/// Write a configuration file holding the defaults.
#[cfg(not(tarpaulin_include))]
pub fn handle_init(force: bool) -> Result<()> {
    let config_path = Config::config_path()?;

    if config_path.exists() && !force {
        bail!(
            "Config file already exists: {} (use --force to overwrite)",
            config_path.display()
        );
    }

    Config::default().save_to(&config_path)?;
    println!("Wrote {}", config_path.display());
    Ok(())
}
