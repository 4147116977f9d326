use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use motifguard_compute::{Exclusion, ExclusionReason, RunReport, TrainingRunner};
use motifguard_core::Config;
use motifguard_ingest::{preprocess, ParquetImporter};
use motifguard_store::ArtifactStore;

/// Import the normal-operation table and run the training pipeline over it.
pub fn train(config: &Config, input: &Path) -> Result<()> {
    info!("Importing normal-operation table {}", input.display());
    let table = ParquetImporter::import(input, &config.ingest)
        .with_context(|| format!("failed to import {}", input.display()))?;

    let prepared = preprocess(table, config.ingest.max_missing_fraction);
    let dropped: Vec<Exclusion> = prepared
        .dropped
        .into_iter()
        .map(|d| Exclusion::sensor(d.sensor, ExclusionReason::Preprocessing { detail: d.reason }))
        .collect();

    let store = ArtifactStore::open(&config.storage).context("failed to open artifact store")?;
    let runner = TrainingRunner::new(config.clone(), store);
    let report = runner
        .run(prepared.table.to_series(), dropped)
        .context("training run failed")?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    info!("Training summary (run {}):", report.run_id);
    info!("  Sensors:   {} total, {} segmented", report.sensors_total, report.sensors_segmented);
    info!(
        "  Trained:   {} classifiers ({} resumed)",
        report.trained.len(),
        report.trained.iter().filter(|t| t.resumed).count()
    );
    for entry in &report.trained {
        info!("    {:<24} {:<4} {}", entry.sensor, entry.family.dir_name(), entry.metrics);
    }
    let excluded = report.excluded_sensors();
    info!("  Excluded:  {} sensors", excluded.len());
    for exclusion in &report.exclusions {
        match exclusion.family {
            Some(family) => info!("    {:<24} {:<4} {}", exclusion.sensor, family.dir_name(), exclusion.reason),
            None => info!("    {:<24} all  {}", exclusion.sensor, exclusion.reason),
        }
    }
}
