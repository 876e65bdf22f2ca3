//! Logging and tracing initialization.

use crate::config::LoggingConfig;
use crate::error::RecorderResult;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber.
///
/// The level filter comes from `RUST_LOG` when set, else from the config.
/// With `file` set, output is appended to that file with ANSI escapes
/// disabled; otherwise it goes to stdout. The `json` switch selects
/// structured output in either case. Calling this more than once leaves the
/// first subscriber in place.
pub fn init_logging(config: &LoggingConfig) -> RecorderResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = fmt::Subscriber::builder().with_env_filter(env_filter);

    match (&config.file, config.json) {
        (Some(path), json) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let writer = Arc::new(file);
            if json {
                let subscriber = builder.json().with_writer(writer).finish();
                tracing::subscriber::set_global_default(subscriber).ok();
            } else {
                let subscriber = builder.with_ansi(false).with_writer(writer).finish();
                tracing::subscriber::set_global_default(subscriber).ok();
            }
        }
        (None, true) => {
            let subscriber = builder.json().finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        (None, false) => {
            let subscriber = builder
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok();
        }
    }
    Ok(())
}

/// Initialize logging with defaults (useful for tests and quick scripts).
/// Defaults carry no file sink, so this cannot fail.
pub fn init_default_logging() {
    let _ = init_logging(&LoggingConfig::default());
}
