//! Logging initialization for the CLI.
//!
//! Logging is owned by the CLI crate. The library crates log through the
//! `log` facade, which the subscriber picks up via its `log` bridge.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Crates whose records follow the `-v` flag.
const LOG_TARGETS: &[&str] = &["modhost_cli", "modhost_core", "modhost_runtime"];

/// Initialize the tracing subscriber.
///
/// `verbosity`: 0 = INFO, 1 = DEBUG, 2+ = TRACE. With `json`, each record is
/// one JSON line on stderr:
/// ```json
/// {"timestamp":"...","level":"DEBUG","span":{"cmd":"resolve"},"fields":{"message":"..."}}
/// ```
///
/// # Panics
/// Panics if a global subscriber is already installed.
pub fn init(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    // RUST_LOG is honored; the verbosity flag overrides it for our crates.
    let mut filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    for target in LOG_TARGETS {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        subscriber
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }
}
