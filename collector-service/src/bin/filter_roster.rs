use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use energy_client::store::roster_queries::{self, METROPOLITAN_REGIONS};
use energy_collector::{config::AppConfig, observability};

const USAGE: &str = "usage: filter_roster [--title-rows N] <roster.csv> [region ...]";

/// Keeps the roster rows of the given regions (default: the capital area).
/// `--title-rows N` skips N lines above the header of a spreadsheet export.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    observability::init_tracing(env!("CARGO_CRATE_NAME"));

    let mut title_rows = 0;
    let mut positional = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--title-rows" {
            let value = args.next().context(USAGE)?;
            title_rows = value
                .parse()
                .with_context(|| format!("--title-rows expects a number, got '{value}'"))?;
        } else {
            positional.push(arg);
        }
    }

    let mut positional = positional.into_iter();
    let Some(input) = positional.next().map(PathBuf::from) else {
        bail!(USAGE);
    };
    let extra: Vec<String> = positional.collect();
    let regions: Vec<&str> = if extra.is_empty() {
        METROPOLITAN_REGIONS.to_vec()
    } else {
        extra.iter().map(String::as_str).collect()
    };

    let cfg = AppConfig::load()?;
    let stem = input
        .file_stem()
        .context("input path has no file name")?
        .to_string_lossy();
    let output = cfg.paths.processed_dir.join(format!("{stem}_수도권.csv"));

    let written = roster_queries::filter_by_region(&input, &output, &regions, title_rows)
        .with_context(|| format!("failed to filter {}", input.display()))?;

    tracing::info!(rows = written, title_rows, ?regions, path = %output.display(), "filtered roster saved");
    Ok(())
}
