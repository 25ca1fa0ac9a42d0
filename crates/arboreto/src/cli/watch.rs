//! `arboreto watch`: the long-running mode.

use super::build_pipeline;
use anyhow::{Context, Result};
use arboreto::shutdown::install_signal_handlers;
use arboreto::{ArboretoConfig, ShutdownToken, Supervisor};
use tracing::info;

pub fn run(config: &ArboretoConfig) -> Result<()> {
    let shutdown = ShutdownToken::new();
    install_signal_handlers(&shutdown).context("Failed to install signal handlers")?;

    let pipeline = build_pipeline(config);
    let stats = pipeline.stats().clone();

    info!(
        watch_root = %config.watch_root.display(),
        archive = %config.archive_dir().display(),
        output = %config.output_dir.display(),
        images = %config.image_root.display(),
        on_conflict = %config.on_output_conflict,
        "Starting Arboreto"
    );

    Supervisor::new(pipeline, &config.watch_root, shutdown)
        .with_folders(config.required_folders())
        .with_settle(config.settle())
        .with_poll_interval(config.poll_interval())
        .with_stats(stats)
        .run()?;

    Ok(())
}
