//! The `glimpse favorite` command.

use clap::Args;
use glimpse_core::Config;
use std::path::PathBuf;

/// Arguments for the `favorite` command.
#[derive(Args, Debug)]
pub struct FavoriteArgs {
    /// Image to mark
    #[arg(required = true)]
    pub path: PathBuf,

    /// Remove the mark instead
    #[arg(long)]
    pub unset: bool,
}

/// Execute the favorite command.
pub fn execute(args: FavoriteArgs, config: Config) -> anyhow::Result<()> {
    let glimpse = super::open_store_only(config)?;
    let path = super::resolve_path(&args.path);
    let favorite = !args.unset;

    let updated = glimpse.set_favorite(&path, favorite)?;
    if updated == 0 {
        anyhow::bail!(
            "{} is not tracked. Scan its directory first with `glimpse scan`.",
            path.display()
        );
    }

    tracing::debug!("Updated {updated} record(s) for {:?}", path);
    println!(
        "{} {}",
        if favorite { "Favorited" } else { "Unfavorited" },
        path.display()
    );
    Ok(())
}
