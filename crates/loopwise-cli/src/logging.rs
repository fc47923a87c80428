//! File logging for Loopwise.
//!
//! Records go to `<home>/logs/loopwise.log`, one file per day. The terminal
//! only ever shows command output, so `loopwise sync watch` and the logger
//! never interleave.
//!
//! `LOOPWISE_LOG` overrides the filter, e.g. `LOOPWISE_LOG=loopwise::sync=trace`
//! to follow every enqueue and flush, or `LOOPWISE_LOG=debug` for everything.

use crate::config::loopwise_home;
use crate::error::Result;
use std::path::PathBuf;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "LOOPWISE_LOG";
const LOG_FILE: &str = "loopwise.log";
/// HTTP and connection-pool chatter stays at warn unless asked for.
const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,hyper_util=warn";

pub fn log_dir() -> Result<PathBuf> {
    Ok(loopwise_home()?.join("logs"))
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Later calls, and calls without a usable
/// home directory, do nothing.
pub fn init() {
    let Ok(dir) = log_dir() else {
        return;
    };
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }

    let fmt_layer = fmt::layer()
        .with_writer(rolling::daily(&dir, LOG_FILE))
        .with_target(true)
        .with_ansi(false);

    let _ = tracing_subscriber::registry()
        .with(filter())
        .with(fmt_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }
}
