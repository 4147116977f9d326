use anyhow::{Context, Result};

use motifguard_compute::{Exclusion, RunReport, REPORT_NAME};
use motifguard_core::{AnomalyFamily, Config};
use motifguard_store::{ArtifactKey, ArtifactStore};

/// Print, per sensor, which artifacts the store holds.
pub fn status(config: &Config) -> Result<()> {
    let store = ArtifactStore::open(&config.storage).context("failed to open artifact store")?;

    let segmented = store.list_segmented_sensors();
    let excluded = store.list_excluded_sensors();

    println!("Artifacts under {}", config.storage.data_dir.display());
    println!(
        "{:<24} {:<8} {}",
        "sensor",
        "motifs",
        AnomalyFamily::ALL
            .iter()
            .map(|f| format!("{:<8}", f.dir_name()))
            .collect::<String>()
    );
    for sensor in &segmented {
        let cells: String = AnomalyFamily::ALL
            .iter()
            .map(|&family| {
                let dataset = store.exists(&ArtifactKey::dataset(sensor, family));
                let model = store.exists(&ArtifactKey::classifier(sensor, family));
                let cell = match (dataset, model) {
                    (_, true) => "model",
                    (true, false) => "data",
                    (false, false) => "-",
                };
                format!("{:<8}", cell)
            })
            .collect();
        println!("{:<24} {:<8} {}", sensor, "yes", cells);
    }
    for sensor in &excluded {
        let reason = store
            .read::<Exclusion>(&ArtifactKey::exclusion(sensor))
            .map(|e| e.reason.to_string())
            .unwrap_or_else(|e| format!("unreadable marker: {}", e));
        println!("{:<24} {:<8} excluded: {}", sensor, "no", reason);
    }

    let report_path = config.storage.reports_dir().join(format!("{}.json", REPORT_NAME));
    if let Ok(bytes) = std::fs::read(&report_path) {
        let report: RunReport = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse {}", report_path.display()))?;
        println!();
        println!(
            "Last run {} finished {}: {} trained, {} exclusions",
            report.run_id,
            report.finished_at.to_rfc3339(),
            report.trained.len(),
            report.exclusions.len()
        );
    }
    Ok(())
}
