use anyhow::{Context, Result};
use energy_collector::{analysis::trend, config::AppConfig, observability, shutdown};
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing(env!("CARGO_CRATE_NAME"));

    let cfg = AppConfig::load()?;
    let cancel = CancellationToken::new();
    shutdown::cancel_on_interrupt(cancel.clone());

    tracing::info!(
        energy_dir = %cfg.paths.energy_dir.display(),
        analysis_dir = %cfg.paths.analysis_dir.display(),
        "trend analysis starting"
    );

    let energy_dir = cfg.paths.energy_dir.clone();
    let analysis_dir = cfg.paths.analysis_dir.clone();
    let slope_threshold = cfg.analysis.slope_threshold;
    let summary = tokio::task::spawn_blocking(move || {
        trend::run_trend_analysis(&energy_dir, &analysis_dir, slope_threshold, &cancel)
    })
    .await
    .context("trend analysis task panicked")??;

    tracing::info!(
        files = summary.files_seen,
        written = summary.files_written,
        failed = summary.files_failed,
        cancelled = summary.cancelled,
        "trend analysis finished"
    );
    Ok(())
}
