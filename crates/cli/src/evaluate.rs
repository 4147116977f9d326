use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::info;

use motifguard_compute::{evaluate_table, AnomalyHandler, SensorModelBundle, WeightedVote};
use motifguard_core::Config;
use motifguard_ingest::{preprocess, ParquetImporter};
use motifguard_store::ArtifactStore;

use crate::cli::Policy;

const REPORT_NAME: &str = "evaluation_report";

/// Score the stored detectors against a labeled anomalous-operation table.
pub fn evaluate(config: &Config, input: &Path, policy: Policy, threshold: f64) -> Result<()> {
    info!("Importing anomalous-operation table {}", input.display());
    let table = ParquetImporter::import_labeled(input, &config.ingest)
        .with_context(|| format!("failed to import {}", input.display()))?;
    let labels = table
        .labels()
        .context("anomalous table has no label column")?
        .to_vec();
    let prepared = preprocess(table, config.ingest.max_missing_fraction);

    let store = ArtifactStore::open(&config.storage).context("failed to open artifact store")?;
    let mut bundles = BTreeMap::new();
    for sensor in prepared.table.sensors() {
        let bundle = SensorModelBundle::load(&store, sensor)
            .with_context(|| format!("failed to load classifiers for {}", sensor))?;
        if !bundle.is_empty() {
            bundles.insert(sensor.to_string(), bundle);
        }
    }
    if bundles.is_empty() {
        bail!(
            "no trained classifiers under {} match this table; run `motifguard train` first",
            config.storage.data_dir.display()
        );
    }

    let min_len = config.segmentation.min_motif_len;
    let handler = match policy {
        Policy::Any => AnomalyHandler::any_family(min_len),
        Policy::Weighted => AnomalyHandler::new(Box::new(WeightedVote::new(threshold)), min_len),
    };

    let report = evaluate_table(
        &handler,
        &bundles,
        &prepared.table.to_series(),
        &labels,
        config.evaluation.window,
        config.evaluation.stride,
    );
    let path = store
        .write_report(REPORT_NAME, &report)
        .context("failed to write evaluation report")?;

    info!("Evaluation summary ({} policy):", report.policy);
    info!("  Rows:      {} ({} flagged)", report.rows, report.rows_flagged);
    info!("  Sensors:   {} evaluated, {} without classifiers", report.sensors.len(), report.skipped.len());
    info!("  Metrics:   {}", report.metrics);
    info!("  Report:    {}", path.display());
    Ok(())
}
