use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Sensor anomaly detection trained on synthetic faults.
///
/// Segments normal-operation sensor data into motifs, trains one classifier
/// per sensor and anomaly family on synthetic corruptions of those motifs,
/// and evaluates the fused detectors against labeled data.
#[derive(Parser, Debug)]
#[command(name = "motifguard", version, about)]
pub struct CliArgs {
    /// TOML config file. Without it, configuration comes from the environment.
    #[arg(long, global = true, env = "MOTIFGUARD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override the artifact directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Segment, synthesize and train from a normal-operation table.
    Train {
        /// Parquet file with one column per sensor.
        #[arg(long)]
        input: PathBuf,

        /// Worker threads (0 = available parallelism).
        #[arg(long)]
        threads: Option<usize>,
    },
    /// Score trained detectors against a labeled anomalous-operation table.
    Evaluate {
        /// Parquet file with sensor columns and the label column.
        #[arg(long)]
        input: PathBuf,

        /// How per-family votes are fused.
        #[arg(long, value_enum, default_value_t = Policy::Any)]
        policy: Policy,

        /// Decision threshold for the weighted policy.
        #[arg(long, default_value_t = 0.5)]
        threshold: f64,
    },
    /// Show which artifacts exist for each sensor.
    Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Policy {
    /// Anomalous when any family flags.
    Any,
    /// Mean family probability against a threshold.
    Weighted,
}
