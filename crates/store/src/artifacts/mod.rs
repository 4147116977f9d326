use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use motifguard_core::config::StorageConfig;
use motifguard_core::AnomalyFamily;

use crate::claim::Claim;
use crate::codec;
use crate::error::StoreError;


/// Addressable artifact in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    /// Segmented motif array for a sensor.
    Motifs { sensor: String },
    /// Marker recording why a sensor was excluded.
    Exclusion { sensor: String },
    /// Synthetic labeled dataset for a (sensor, family).
    Dataset { sensor: String, family: AnomalyFamily },
    /// Trained classifier for a (sensor, family).
    Classifier { sensor: String, family: AnomalyFamily },
}

impl ArtifactKey {
    pub fn motifs(sensor: &str) -> Self {
        ArtifactKey::Motifs { sensor: sensor.to_string() }
    }

    pub fn exclusion(sensor: &str) -> Self {
        ArtifactKey::Exclusion { sensor: sensor.to_string() }
    }

    pub fn dataset(sensor: &str, family: AnomalyFamily) -> Self {
        ArtifactKey::Dataset { sensor: sensor.to_string(), family }
    }

    pub fn classifier(sensor: &str, family: AnomalyFamily) -> Self {
        ArtifactKey::Classifier { sensor: sensor.to_string(), family }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ArtifactKey::Motifs { .. } => "motifs",
            ArtifactKey::Exclusion { .. } => "exclusion",
            ArtifactKey::Dataset { .. } => "dataset",
            ArtifactKey::Classifier { .. } => "classifier",
        }
    }

    pub fn sensor(&self) -> &str {
        match self {
            ArtifactKey::Motifs { sensor }
            | ArtifactKey::Exclusion { sensor }
            | ArtifactKey::Dataset { sensor, .. }
            | ArtifactKey::Classifier { sensor, .. } => sensor,
        }
    }

    pub fn family(&self) -> Option<AnomalyFamily> {
        match self {
            ArtifactKey::Dataset { family, .. } | ArtifactKey::Classifier { family, .. } => {
                Some(*family)
            }
            _ => None,
        }
    }

    /// Exclusion markers are small JSON documents; everything else is packed.
    fn is_json(&self) -> bool {
        matches!(self, ArtifactKey::Exclusion { .. })
    }

    fn path(&self, storage: &StorageConfig) -> PathBuf {
        match self {
            ArtifactKey::Motifs { sensor } => {
                storage.sensors_dir().join(format!("{}.motifs", file_stem(sensor)))
            }
            ArtifactKey::Exclusion { sensor } => {
                storage.sensors_dir().join(format!("{}.excluded.json", file_stem(sensor)))
            }
            ArtifactKey::Dataset { sensor, family } => storage
                .datasets_dir(*family)
                .join(format!("{}_dataset.bin", file_stem(sensor))),
            ArtifactKey::Classifier { sensor, family } => storage
                .classifiers_dir(*family)
                .join(format!("{}.model", file_stem(sensor))),
        }
    }
}

impl std::fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.family() {
            Some(family) => write!(f, "{}:{}/{}", self.kind(), self.sensor(), family),
            None => write!(f, "{}:{}", self.kind(), self.sensor()),
        }
    }
}

/// Map a sensor name onto a safe file stem.
///
/// Percent-encoding keeps distinct names on distinct paths ("FIT 101" and
/// "FIT_101" must not share artifacts) and is reversed by [`sensor_from_stem`].
fn file_stem(sensor: &str) -> String {
    urlencoding::encode(sensor).into_owned()
}

fn sensor_from_stem(stem: &str) -> String {
    urlencoding::decode(stem)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| stem.to_string())
}

/// Sidecar metadata written next to each packed artifact as `<file>.meta.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub kind: String,
    pub sensor: String,
    pub family: Option<AnomalyFamily>,
    pub size_bytes: u64,
    pub raw_bytes: u64,
    pub run_id: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a write-once attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The artifact was written by this call.
    Written { size_bytes: u64 },
    /// The artifact already existed; nothing was touched.
    AlreadyPresent,
    /// Another worker holds the claim: a sibling of this run, or a
    /// concurrent run whose lock has not gone stale.
    ClaimedElsewhere,
}

/// Write-once store for per-sensor pipeline artifacts.
///
/// Each artifact is written at most once: writers check for the file,
/// claim it, write to a temp file and rename into place. Existing artifacts
/// are never rewritten, which is what makes an interrupted run resumable.
pub struct ArtifactStore {
    storage: StorageConfig,
    run_id: String,
}

impl ArtifactStore {
    /// Open the store rooted at `storage.data_dir`, creating the tree.
    pub fn open(storage: &StorageConfig) -> Result<Self, StoreError> {
        storage.ensure_dirs()?;
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(data_dir = %storage.data_dir.display(), run_id = %run_id, "ArtifactStore opened");
        Ok(Self {
            storage: storage.clone(),
            run_id,
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn path_of(&self, key: &ArtifactKey) -> PathBuf {
        key.path(&self.storage)
    }

    pub fn exists(&self, key: &ArtifactKey) -> bool {
        self.path_of(key).is_file()
    }

    /// Persist `value` under `key` unless it is already present or claimed.
    pub fn write_once<T: Serialize>(
        &self,
        key: &ArtifactKey,
        value: &T,
    ) -> Result<WriteOutcome, StoreError> {
        let path = self.path_of(key);
        if path.is_file() {
            debug!(artifact = %key, "Artifact already present, skipping write");
            return Ok(WriteOutcome::AlreadyPresent);
        }

        let Some(_claim) = Claim::acquire(&path, &self.run_id, self.storage.lock_timeout())? else {
            return Ok(WriteOutcome::ClaimedElsewhere);
        };

        // Re-check under the claim: a sibling may have finished between the
        // existence check and the claim.
        if path.is_file() {
            return Ok(WriteOutcome::AlreadyPresent);
        }

        let (bytes, raw_bytes) = if key.is_json() {
            let json = serde_json::to_vec_pretty(value)
                .map_err(|e| StoreError::Serialize(e.to_string()))?;
            let len = json.len() as u64;
            (json, len)
        } else {
            codec::encode(value)?
        };

        write_atomic(&path, &bytes, &self.run_id)?;

        if !key.is_json() {
            let meta = ArtifactMeta {
                kind: key.kind().to_string(),
                sensor: key.sensor().to_string(),
                family: key.family(),
                size_bytes: bytes.len() as u64,
                raw_bytes,
                run_id: self.run_id.clone(),
                created_at: Utc::now(),
            };
            let meta_json = serde_json::to_string_pretty(&meta)
                .map_err(|e| StoreError::Serialize(e.to_string()))?;
            fs::write(meta_path_for(&path), meta_json)?;
        }

        debug!(artifact = %key, size_bytes = bytes.len(), "Artifact written");
        Ok(WriteOutcome::Written {
            size_bytes: bytes.len() as u64,
        })
    }

    /// Load the artifact stored under `key`.
    pub fn read<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<T, StoreError> {
        let path = self.path_of(key);
        if !path.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        let bytes = fs::read(&path)?;
        if key.is_json() {
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Deserialize(e.to_string()))
        } else {
            codec::decode(&bytes)
        }
    }

    /// Like [`read`](Self::read) but maps a missing artifact to `None`.
    pub fn read_opt<T: DeserializeOwned>(&self, key: &ArtifactKey) -> Result<Option<T>, StoreError> {
        match self.read(key) {
            Ok(v) => Ok(Some(v)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn read_meta(&self, key: &ArtifactKey) -> Result<ArtifactMeta, StoreError> {
        let meta_path = meta_path_for(&self.path_of(key));
        if !meta_path.is_file() {
            return Err(StoreError::NotFound(format!("{} (meta)", key)));
        }
        let content = fs::read_to_string(meta_path)?;
        serde_json::from_str(&content).map_err(|e| StoreError::Deserialize(e.to_string()))
    }

    /// Write a run-level JSON report. Reports are overwritten on every run.
    pub fn write_report<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, StoreError> {
        let path = self
            .storage
            .reports_dir()
            .join(format!("{}.json", file_stem(name)));
        let json = serde_json::to_vec_pretty(value).map_err(|e| StoreError::Serialize(e.to_string()))?;
        write_atomic(&path, &json, &self.run_id)?;
        info!(path = %path.display(), "Report written");
        Ok(path)
    }

    /// Sensors with a persisted motif array, in file-name order.
    pub fn list_segmented_sensors(&self) -> Vec<String> {
        self.list_sensors_with_suffix(".motifs")
    }

    /// Sensors with a persisted exclusion marker, in file-name order.
    pub fn list_excluded_sensors(&self) -> Vec<String> {
        self.list_sensors_with_suffix(".excluded.json")
    }

    fn list_sensors_with_suffix(&self, suffix: &str) -> Vec<String> {
        let mut sensors: Vec<String> = walkdir::WalkDir::new(self.storage.sensors_dir())
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.file_name()
                    .to_str()
                    .and_then(|n| n.strip_suffix(suffix))
                    .map(sensor_from_stem)
            })
            .collect();
        sensors.sort();
        sensors
    }
}

fn meta_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".meta.json");
    PathBuf::from(name)
}

/// Write to a run-scoped temp file and rename into place.
fn write_atomic(path: &Path, bytes: &[u8], run_id: &str) -> Result<(), StoreError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(format!(".tmp-{}", run_id));
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}
