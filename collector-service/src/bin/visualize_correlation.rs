use anyhow::Result;
use energy_collector::{
    analysis::{charts::CsvTableRenderer, correlation},
    config::AppConfig,
    observability,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing(env!("CARGO_CRATE_NAME"));

    let cfg = AppConfig::load()?;
    let mut renderer = CsvTableRenderer::new(&cfg.paths.visualization_dir);

    let summary = correlation::run_visualization(
        &cfg.paths.analysis_dir,
        &cfg.paths.processed_dir,
        cfg.analysis.min_data_points,
        &mut renderer,
    )?;

    tracing::info!(
        rows = summary.rows_merged,
        charts = summary.charts_rendered,
        dir = %renderer.dir().display(),
        "correlation charts written"
    );
    Ok(())
}
