//! Glimpse CLI - incremental image scanner.
//!
//! Glimpse walks a directory, caches downscaled thumbnails, labels every image
//! with the configured classifier and remembers the results, so scanning the
//! same directory again only does the work that is still missing.
//!
//! # Usage
//!
//! ```bash
//! # Scan a directory and print the records
//! glimpse scan ./photos
//!
//! # Write JSON Lines to a file
//! glimpse scan ./photos --format jsonl --output photos.jsonl
//!
//! # Mark a favorite
//! glimpse favorite ./photos/beach.jpg
//!
//! # View configuration
//! glimpse config show
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Glimpse - incremental image scanner with thumbnails and classification.
#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan a directory: thumbnails, classification, persisted records
    Scan(cli::scan::ScanArgs),

    /// Mark or unmark an image as a favorite
    Favorite(cli::favorite::FavoriteArgs),

    /// Delete images from disk, the thumbnail cache and the store
    Delete(cli::delete::DeleteArgs),

    /// List or forget tracked directories
    Sessions(cli::sessions::SessionsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match glimpse_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `glimpse config path`."
            );
            glimpse_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Glimpse v{}", glimpse_core::VERSION);

    match cli.command {
        Commands::Scan(args) => cli::scan::execute(args, config).await,
        Commands::Favorite(args) => cli::favorite::execute(args, config),
        Commands::Delete(args) => cli::delete::execute(args, config),
        Commands::Sessions(args) => cli::sessions::execute(args, config),
        Commands::Config(args) => cli::config::execute(args, config),
    }
}
