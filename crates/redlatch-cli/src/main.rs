//! redlatch - acquire a distributed lock, hold it, release it

mod cli;
mod latch;
mod logging;

use clap::Parser;
use redlatch_lock::{CancellationToken, Settings};
use tracing::info;

use crate::cli::Cli;
use crate::latch::Latch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);

    logging::init_logging(&settings.log_level)?;
    redlatch_lock::metrics::describe_metrics();

    let latch = Latch::from_settings(&args.key, &settings)?;
    info!(
        key = %latch.key(),
        nodes = settings.nodes.len(),
        quorum = latch.is_quorum(),
        "Starting redlatch"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    latch::run(&latch, &cancel, args.hold()).await
}
