use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::GuardError;
use crate::family::AnomalyFamily;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_list(profile: &str, key: &str, default: &[&str]) -> Vec<String> {
    match profiled_env_opt(profile, key) {
        Some(v) => v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => default.iter().map(|s| s.to_string()).collect(),
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub storage: StorageConfig,
    pub segmentation: SegmentationConfig,
    pub synthesis: SynthesisConfig,
    pub classifier: ClassifierConfig,
    pub worker: WorkerConfig,
    pub ingest: IngestConfig,
    pub evaluation: EvaluationConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `MOTIFGUARD_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("MOTIFGUARD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            storage: StorageConfig::from_env_profiled(p),
            segmentation: SegmentationConfig::from_env_profiled(p),
            synthesis: SynthesisConfig::from_env_profiled(p),
            classifier: ClassifierConfig::from_env_profiled(p),
            worker: WorkerConfig::from_env_profiled(p),
            ingest: IngestConfig::from_env_profiled(p),
            evaluation: EvaluationConfig::from_env_profiled(p),
        }
    }

    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, GuardError> {
        toml::from_str(content).map_err(|e| GuardError::InvalidConfig(e.to_string()))
    }

    /// Load from a TOML file when given, otherwise from the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, GuardError> {
        let config = match path {
            Some(p) => {
                tracing::debug!(path = %p.display(), "Loading config file");
                let content = std::fs::read_to_string(p)?;
                Self::from_toml_str(&content)?
            }
            None => Self::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), GuardError> {
        let seg = &self.segmentation;
        if seg.window_size == 0 {
            return Err(GuardError::InvalidConfig("window_size must be at least 1".into()));
        }
        if seg.n_states == 0 {
            return Err(GuardError::InvalidConfig("n_states must be at least 1".into()));
        }
        if seg.max_iterations == 0 {
            return Err(GuardError::InvalidConfig("max_iterations must be at least 1".into()));
        }
        if !(seg.tolerance.is_finite() && seg.tolerance > 0.0) {
            return Err(GuardError::InvalidConfig("tolerance must be positive".into()));
        }

        for family in AnomalyFamily::ALL {
            let alpha = self.synthesis.alpha_for(family);
            if !alpha.is_finite() || alpha < 0.0 {
                return Err(GuardError::InvalidConfig(format!(
                    "alpha for {} must be a non-negative number, got {}",
                    family, alpha
                )));
            }
        }
        if self.synthesis.alpha_pms >= 1.0 {
            return Err(GuardError::InvalidConfig(
                "alpha_pms is a fraction of the motif and must be below 1.0".into(),
            ));
        }
        if self.synthesis.min_training_motifs == 0 {
            return Err(GuardError::InvalidConfig(
                "min_training_motifs must be at least 1".into(),
            ));
        }

        if self.classifier.n_trees == 0 {
            return Err(GuardError::InvalidConfig("n_trees must be at least 1".into()));
        }
        if self.classifier.min_samples_split < 2 {
            return Err(GuardError::InvalidConfig("min_samples_split must be at least 2".into()));
        }

        if self.evaluation.window <= self.segmentation.min_motif_len {
            return Err(GuardError::InvalidConfig(format!(
                "evaluation window ({}) must exceed min_motif_len ({})",
                self.evaluation.window, self.segmentation.min_motif_len
            )));
        }
        if self.evaluation.stride == 0 {
            return Err(GuardError::InvalidConfig("evaluation stride must be at least 1".into()));
        }
        if self.storage.lock_timeout_secs == 0 {
            return Err(GuardError::InvalidConfig("lock_timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  storage:      data_dir={} lock_timeout={}s",
            self.storage.data_dir.display(),
            self.storage.lock_timeout_secs
        );
        tracing::info!(
            "  segmentation: window={}, states={}, min_motif_len={}, max_iter={}, retries={}",
            self.segmentation.window_size,
            self.segmentation.n_states,
            self.segmentation.min_motif_len,
            self.segmentation.max_iterations,
            self.segmentation.max_retries
        );
        tracing::info!(
            "  synthesis:    alpha spike={} ln={} pms={} psd={}, seed={}",
            self.synthesis.alpha_spike,
            self.synthesis.alpha_ln,
            self.synthesis.alpha_pms,
            self.synthesis.alpha_psd,
            self.synthesis.seed
        );
        tracing::info!(
            "  classifier:   trees={}, max_depth={}",
            self.classifier.n_trees,
            self.classifier.max_depth
        );
        tracing::info!("  worker:       threads={}", self.worker.resolved_threads());
    }
}

// ── Storage ───────────────────────────────────────────────────

/// Artifact locations. Every directory hangs off `data_dir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Age after which an artifact lock left by another run counts as
    /// abandoned and may be taken over.
    pub lock_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            lock_timeout_secs: 3600,
        }
    }
}

impl StorageConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            data_dir: PathBuf::from(profiled_env_or(p, "DATA_DIR", "data")),
            lock_timeout_secs: profiled_env_parse(p, "LOCK_TIMEOUT_SECS", d.lock_timeout_secs),
        }
    }

    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    /// Per-sensor motif arrays.
    pub fn sensors_dir(&self) -> PathBuf {
        self.data_dir.join("Sensors")
    }

    /// Per-(sensor, family) synthetic datasets.
    pub fn datasets_dir(&self, family: AnomalyFamily) -> PathBuf {
        self.data_dir.join("Datasets").join(family.dir_name())
    }

    /// Per-(sensor, family) trained classifiers.
    pub fn classifiers_dir(&self, family: AnomalyFamily) -> PathBuf {
        self.data_dir.join("Classifiers").join(family.dir_name())
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_dir.join("Reports")
    }

    /// Create the whole artifact tree. Idempotent.
    pub fn ensure_dirs(&self) -> Result<(), GuardError> {
        std::fs::create_dir_all(self.sensors_dir())?;
        std::fs::create_dir_all(self.reports_dir())?;
        for family in AnomalyFamily::ALL {
            std::fs::create_dir_all(self.datasets_dir(family))?;
            std::fs::create_dir_all(self.classifiers_dir(family))?;
        }
        Ok(())
    }
}

// ── Segmentation ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Trailing window length feeding each HMM observation.
    pub window_size: usize,
    /// Number of hidden behavioral states.
    pub n_states: usize,
    /// Runs of this length or shorter are discarded.
    pub min_motif_len: usize,
    /// Baum-Welch iteration cap.
    pub max_iterations: usize,
    /// Log-likelihood improvement below which Baum-Welch stops.
    pub tolerance: f64,
    /// Re-initialisations attempted after a numerical failure.
    pub max_retries: u32,
    pub fit_timeout_secs: u64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            n_states: 3,
            min_motif_len: 10,
            max_iterations: 100,
            tolerance: 1e-4,
            max_retries: 3,
            fit_timeout_secs: 300,
        }
    }
}

impl SegmentationConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            window_size: profiled_env_parse(p, "WINDOW_SIZE", d.window_size),
            n_states: profiled_env_parse(p, "N_STATES", d.n_states),
            min_motif_len: profiled_env_parse(p, "MIN_MOTIF_LEN", d.min_motif_len),
            max_iterations: profiled_env_parse(p, "HMM_MAX_ITERATIONS", d.max_iterations),
            tolerance: profiled_env_parse(p, "HMM_TOLERANCE", d.tolerance),
            max_retries: profiled_env_parse(p, "HMM_MAX_RETRIES", d.max_retries),
            fit_timeout_secs: profiled_env_parse(p, "HMM_FIT_TIMEOUT_SECS", d.fit_timeout_secs),
        }
    }
}

// ── Synthetic anomalies ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub alpha_spike: f64,
    pub alpha_ln: f64,
    /// Fraction of the motif that goes missing.
    pub alpha_pms: f64,
    pub alpha_psd: f64,
    pub seed: u64,
    /// Minimum surviving motifs needed to build a family dataset.
    pub min_training_motifs: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            alpha_spike: 3.0,
            alpha_ln: 1.0,
            alpha_pms: 0.3,
            alpha_psd: 2.0,
            seed: 42,
            min_training_motifs: 2,
        }
    }
}

impl SynthesisConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            alpha_spike: profiled_env_parse(p, "ALPHA_SPIKE", d.alpha_spike),
            alpha_ln: profiled_env_parse(p, "ALPHA_LN", d.alpha_ln),
            alpha_pms: profiled_env_parse(p, "ALPHA_PMS", d.alpha_pms),
            alpha_psd: profiled_env_parse(p, "ALPHA_PSD", d.alpha_psd),
            seed: profiled_env_parse(p, "RANDOM_SEED", d.seed),
            min_training_motifs: profiled_env_parse(p, "MIN_TRAINING_MOTIFS", d.min_training_motifs),
        }
    }

    pub fn alpha_for(&self, family: AnomalyFamily) -> f64 {
        match family {
            AnomalyFamily::Spike => self.alpha_spike,
            AnomalyFamily::LevelNoise => self.alpha_ln,
            AnomalyFamily::PartialMissingSegment => self.alpha_pms,
            AnomalyFamily::PowerSpectralDistortion => self.alpha_psd,
        }
    }
}

// ── Classifier ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Forest growth stops at this deadline; trees grown so far are kept.
    pub fit_timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            n_trees: 50,
            max_depth: 8,
            min_samples_split: 2,
            fit_timeout_secs: 300,
        }
    }
}

impl ClassifierConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            n_trees: profiled_env_parse(p, "FOREST_TREES", d.n_trees),
            max_depth: profiled_env_parse(p, "FOREST_MAX_DEPTH", d.max_depth),
            min_samples_split: profiled_env_parse(p, "FOREST_MIN_SAMPLES_SPLIT", d.min_samples_split),
            fit_timeout_secs: profiled_env_parse(p, "FOREST_FIT_TIMEOUT_SECS", d.fit_timeout_secs),
        }
    }
}

// ── Worker pool ───────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of worker threads. 0 = available parallelism.
    pub threads: usize,
}

impl WorkerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            threads: profiled_env_parse(p, "WORKER_THREADS", 0),
        }
    }

    /// Resolve worker thread count (0 means use available parallelism).
    pub fn resolved_threads(&self) -> usize {
        if self.threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        } else {
            self.threads
        }
    }
}

// ── Ingest ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Binary anomaly label column in the anomalous table.
    pub label_column: String,
    /// Vendor prefix stripped from every column name.
    pub strip_prefix: String,
    /// Columns that never carry sensor data.
    pub non_sensor_columns: Vec<String>,
    /// Sensors missing more than this fraction of samples are dropped.
    pub max_missing_fraction: f64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            label_column: "label".to_string(),
            strip_prefix: String::new(),
            non_sensor_columns: vec!["Row".into(), "Date".into(), "Time".into()],
            max_missing_fraction: 0.5,
        }
    }
}

impl IngestConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            label_column: profiled_env_or(p, "LABEL_COLUMN", &d.label_column),
            strip_prefix: profiled_env_or(p, "COLUMN_STRIP_PREFIX", ""),
            non_sensor_columns: profiled_env_list(p, "NON_SENSOR_COLUMNS", &["Row", "Date", "Time"]),
            max_missing_fraction: profiled_env_parse(p, "MAX_MISSING_FRACTION", d.max_missing_fraction),
        }
    }
}

// ── Evaluation ────────────────────────────────────────────────

/// Sliding-window evaluation over the anomalous table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    pub window: usize,
    pub stride: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            window: 60,
            stride: 60,
        }
    }
}

impl EvaluationConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            window: profiled_env_parse(p, "EVAL_WINDOW", d.window),
            stride: profiled_env_parse(p, "EVAL_STRIDE", d.stride),
        }
    }
}
