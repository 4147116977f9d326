//! Data-access collaborator: loads normal/anomalous operation tables and
//! hands the core one [`Series`](motifguard_core::Series) per sensor column.

pub mod error;
pub mod parquet_import;
pub mod preprocess;
pub mod table;

pub use error::IngestError;
pub use parquet_import::ParquetImporter;
pub use preprocess::{preprocess, DroppedSensor, Preprocessed};
pub use table::SensorTable;
