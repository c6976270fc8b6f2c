//! The `glimpse sessions` command.

use clap::Args;
use glimpse_core::{Config, SessionId};

/// Arguments for the `sessions` command.
#[derive(Args, Debug)]
pub struct SessionsArgs {
    /// Forget the session with this id and all of its records
    #[arg(long, value_name = "ID")]
    pub forget: Option<i64>,

    /// Print sessions as JSON
    #[arg(long)]
    pub json: bool,
}

/// Execute the sessions command.
pub fn execute(args: SessionsArgs, config: Config) -> anyhow::Result<()> {
    let glimpse = super::open_store_only(config)?;

    if let Some(id) = args.forget {
        if !glimpse.forget_session(SessionId(id))? {
            anyhow::bail!("No session with id {id}");
        }
        println!("Forgot session {id}");
        return Ok(());
    }

    let sessions = glimpse.sessions()?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    } else if sessions.is_empty() {
        eprintln!("No directories scanned yet.");
    } else {
        for session in &sessions {
            println!("{:>6}  {}", session.id.0, session.directory);
        }
    }
    Ok(())
}
