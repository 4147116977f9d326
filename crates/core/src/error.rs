use thiserror::Error;

#[derive(Error, Debug)]
pub enum GuardError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Series for sensor {0} is empty")]
    EmptySeries(String),

    #[error("Series for sensor {sensor} has a non-finite sample at index {index}")]
    NonFiniteSample { sensor: String, index: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown anomaly family: {0}")]
    UnknownFamily(String),

    #[error("{0}")]
    Other(String),
}
