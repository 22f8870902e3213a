use anyhow::{Context, Result};
use energy_collector::{
    config::AppConfig,
    metrics_server,
    observability,
    pipeline::{self, BatchDriver},
    shutdown,
    sinks::CsvAppender,
    sources::HttpEnergyApi,
};
use std::time::Duration;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing(env!("CARGO_CRATE_NAME"));

    // Read before any worker threads exist; the local offset is unavailable afterwards on some platforms.
    let today = OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date();

    tracing::info!("energy collector starting; Ctrl+C stops after the current request");

    let cfg = AppConfig::load()?;
    let service_key = cfg.service_key()?;

    if let Some(metrics_cfg) = &cfg.metrics {
        metrics_server::init(&metrics_cfg.bind_addr)?;
    }

    let roster = pipeline::load_roster(&cfg.paths.roster_file, &cfg.roster)
        .with_context(|| format!("failed to load roster {}", cfg.paths.roster_file.display()))?;

    let api = HttpEnergyApi::new(
        cfg.api.base_url.clone(),
        service_key,
        Duration::from_secs(cfg.api.timeout_secs),
    )?;

    let cancel = CancellationToken::new();
    shutdown::cancel_on_interrupt(cancel.clone());

    let mut driver = BatchDriver::new(api, CsvAppender::new(&cfg.paths.energy_dir), today, cancel);
    match driver.run(&roster).await {
        Ok(summary) => tracing::info!(
            complexes = summary.complexes_total,
            collected = summary.complexes_collected,
            months_persisted = summary.months_persisted,
            skipped_complete = summary.skipped_complete,
            skipped_invalid_date = summary.skipped_invalid_date,
            skipped_unreadable = summary.skipped_unreadable,
            structural_aborts = summary.structural_aborts,
            soft_failures = summary.soft_failures,
            termination = ?summary.termination,
            "collection run finished"
        ),
        Err(e) => tracing::error!(error = %e, "collection run stopped by an unexpected error"),
    }

    Ok(())
}
