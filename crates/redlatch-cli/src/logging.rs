//! Console logging
//!
//! A single `fmt` layer on stderr so stdout stays free for scripting. The
//! level comes from `RUST_LOG` when set, otherwise from settings.

use anyhow::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Install the global tracing subscriber
pub fn init_logging(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .with_context(|| format!("invalid log level: {}", default_level))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(true)
        .with_filter(filter);

    Registry::default()
        .with(console_layer)
        .try_init()
        .context("failed to initialize logging")?;

    Ok(())
}
