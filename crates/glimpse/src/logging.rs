//! Logging initialization.
//!
//! Logs go to stderr; stdout is reserved for record output.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Install the global subscriber. `RUST_LOG` overrides `level` when set.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize logging from the `[logging]` config section.
///
/// `--verbose` raises the level to at least DEBUG; `--json-logs` forces JSON.
pub fn init_from_config(config: &glimpse_core::Config, verbose: bool, json_logs: bool) {
    let level = effective_level(&config.logging.level, verbose);
    let json_format = json_logs || config.logging.format.eq_ignore_ascii_case("json");
    init(level, json_format);
}

fn effective_level(configured: &str, verbose: bool) -> &'static str {
    let configured = configured.to_ascii_lowercase();
    let level = LEVELS
        .iter()
        .copied()
        .find(|l| *l == configured)
        .unwrap_or("info");
    if verbose && level != "trace" {
        "debug"
    } else {
        level
    }
}
