use std::path::Path;

use arrow::array::{Array, Float64Array};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use indexmap::IndexMap;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use tracing::{debug, info};

use motifguard_core::config::IngestConfig;

use crate::error::IngestError;
use crate::table::SensorTable;

/// Strip backslashes and the vendor prefix from a raw column name.
pub fn normalize_column_name(raw: &str, strip_prefix: &str) -> String {
    let mut name = raw.replace('\\', "");
    if !strip_prefix.is_empty() {
        name = name.replace(strip_prefix, "");
    }
    name.trim().to_string()
}

pub struct ParquetImporter;

impl ParquetImporter {
    /// Load a sensor table from a Parquet file.
    ///
    /// Every numeric (or numeric-looking string) column becomes a sensor column
    /// after name normalization; configured non-sensor columns are dropped and
    /// the label column, when present, is split out as 0/1 labels.
    pub fn import(path: &Path, config: &IngestConfig) -> Result<SensorTable, IngestError> {
        let file = std::fs::File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| IngestError::Parquet(e.to_string()))?;
        let reader = builder.build().map_err(|e| IngestError::Parquet(e.to_string()))?;

        let mut columns: IndexMap<String, Vec<f64>> = IndexMap::new();
        let mut labels: Option<Vec<u8>> = None;
        let mut rows = 0usize;

        for batch_result in reader {
            let batch = batch_result.map_err(|e| IngestError::Parquet(e.to_string()))?;
            let schema = batch.schema();
            let num_rows = batch.num_rows();

            for (i, field) in schema.fields().iter().enumerate() {
                let name = normalize_column_name(field.name(), &config.strip_prefix);
                let is_label = name == config.label_column;
                if !is_label && config.non_sensor_columns.iter().any(|c| c == &name) {
                    continue;
                }

                let casted = match cast(batch.column(i), &DataType::Float64) {
                    Ok(arr) => arr,
                    Err(e) => {
                        debug!(column = %name, error = %e, "Skipping non-numeric column");
                        continue;
                    }
                };
                let Some(values) = casted.as_any().downcast_ref::<Float64Array>() else {
                    continue;
                };

                if is_label {
                    let out = labels.get_or_insert_with(Vec::new);
                    out.extend((0..num_rows).map(|r| {
                        u8::from(!values.is_null(r) && values.value(r) != 0.0)
                    }));
                } else {
                    let out = columns.entry(name).or_default();
                    out.extend((0..num_rows).map(|r| {
                        if values.is_null(r) {
                            f64::NAN
                        } else {
                            values.value(r)
                        }
                    }));
                }
            }
            rows += num_rows;
        }

        info!(
            "Imported {} rows x {} sensors from {}",
            rows,
            columns.len(),
            path.display()
        );
        SensorTable::from_columns(columns.into_iter().collect(), labels)
    }

    /// Like [`import`](Self::import) but requires the label column.
    pub fn import_labeled(path: &Path, config: &IngestConfig) -> Result<SensorTable, IngestError> {
        let table = Self::import(path, config)?;
        if table.labels().is_none() {
            return Err(IngestError::MissingLabel(config.label_column.clone()));
        }
        Ok(table)
    }
}
