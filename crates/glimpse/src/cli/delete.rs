//! The `glimpse delete` command.

use clap::Args;
use glimpse_core::Config;
use std::path::PathBuf;

/// Arguments for the `delete` command.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Images to delete
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Confirm deletion of the source files
    #[arg(long)]
    pub yes: bool,
}

/// Execute the delete command.
pub fn execute(args: DeleteArgs, config: Config) -> anyhow::Result<()> {
    if !args.yes {
        anyhow::bail!(
            "Refusing to delete {} file(s) from disk without --yes",
            args.paths.len()
        );
    }

    let glimpse = super::open_store_only(config)?;
    let paths: Vec<PathBuf> = args.paths.iter().map(|p| super::resolve_path(p)).collect();
    let summary = glimpse.delete_paths(&paths)?;

    eprintln!(
        "Deleted {} file(s), {} thumbnail(s), {} record(s)",
        summary.files_removed, summary.thumbnails_removed, summary.records_removed
    );
    if !summary.failed.is_empty() {
        for (path, reason) in &summary.failed {
            eprintln!("  failed: {}: {reason}", path.display());
        }
        anyhow::bail!("{} file(s) could not be deleted", summary.failed.len());
    }
    Ok(())
}
