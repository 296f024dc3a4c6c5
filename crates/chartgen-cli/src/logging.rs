//! Diagnostics on stderr
//!
//! `CHARTGEN_LOG` takes an `EnvFilter` directive such as
//! `chartgen_repo=debug`. Without it the level is `warn`, or `debug` with
//! `--debug`.

use std::io::IsTerminal;

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CHARTGEN_LOG";

pub fn init(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    // stdout carries manifests only
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(debug)
        .without_time()
        .try_init();
}
