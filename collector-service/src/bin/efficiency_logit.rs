use std::path::PathBuf;

use anyhow::{Context, Result};
use energy_client::store::analysis_queries::MERGED_ANALYSIS_FILE;
use energy_collector::{analysis::logit, config::AppConfig, observability};

/// Profiles default to the region-filtered roster in the processed directory;
/// the first argument overrides the path.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing(env!("CARGO_CRATE_NAME"));

    let cfg = AppConfig::load()?;
    let profiles_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let file_name = cfg
                .paths
                .roster_file
                .file_name()
                .context("roster_file has no file name")?;
            cfg.paths.processed_dir.join(file_name)
        }
    };
    let merged_path = cfg.paths.processed_dir.join(MERGED_ANALYSIS_FILE);

    let report = logit::run_efficiency_logit(
        &profiles_path,
        &merged_path,
        &cfg.analysis.efficiency_energy_type,
        cfg.analysis.efficiency_threshold,
    )
    .with_context(|| format!("efficiency model failed for {}", profiles_path.display()))?;

    tracing::info!(
        high = report.labels.high,
        low = report.labels.low,
        observations = report.fit.observations,
        iterations = report.fit.iterations,
        log_likelihood = report.fit.log_likelihood,
        "logistic regression fitted"
    );
    for c in &report.fit.coefficients {
        tracing::info!(
            term = %c.name,
            coef = c.estimate,
            std_err = c.std_error,
            z = c.z_value,
            p_value = c.p_value,
            ci_low = c.conf_int.0,
            ci_high = c.conf_int.1,
            odds_ratio = c.odds_ratio,
            "coefficient"
        );
    }
    Ok(())
}
