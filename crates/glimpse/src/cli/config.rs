//! The `glimpse config` command.

use clap::{Args, Subcommand};
use glimpse_core::Config;
use std::path::Path;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Print where the config file, database and thumbnail cache live
    Path,

    /// Write a config file holding the defaults
    Init {
        /// Replace an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub fn execute(args: ConfigArgs, config: Config) -> anyhow::Result<()> {
    let config_path = Config::default_path();
    match args.command {
        ConfigCommand::Show => {
            if !config_path.exists() {
                eprintln!("# no file at {}, showing defaults", config_path.display());
            }
            print!("{}", config.to_toml()?);
        }
        ConfigCommand::Path => {
            println!("config:    {}", config_path.display());
            println!("database:  {}", config.database_path().display());
            println!("cache:     {}", config.cache_dir().display());
        }
        ConfigCommand::Init { force } => {
            write_defaults(&config_path, force)?;
            tracing::info!("Wrote default configuration to {:?}", config_path);
            println!("{}", config_path.display());
        }
    }
    Ok(())
}

/// Write the default configuration to `path`, refusing to replace an
/// existing file unless `force` is set.
fn write_defaults(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists (pass --force to replace it)",
            path.display()
        );
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let body = format!(
        "# Glimpse configuration. Every key is optional.\n\n{}",
        Config::default().to_toml()?
    );
    std::fs::write(path, body)?;
    Ok(())
}
