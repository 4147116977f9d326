pub mod config;
pub mod error;
pub mod family;
pub mod series;

pub use config::Config;
pub use error::*;
pub use family::AnomalyFamily;
pub use series::*;
