//! Logging and tracing setup

use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the given default level and output format
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn initialize_logging(level: &str, format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    let fmt_layer = match format {
        "json" => fmt::layer().json().with_target(true).with_thread_ids(true).boxed(),
        "pretty" => fmt::layer().pretty().with_target(false).with_ansi(true).boxed(),
        _ => fmt::layer().compact().with_target(false).with_ansi(true).boxed(),
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).try_init()?;

    Ok(())
}
