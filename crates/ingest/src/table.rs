use indexmap::IndexMap;

use motifguard_core::Series;

use crate::error::IngestError;

/// A time-indexed table of named sensor columns with an optional label column.
///
/// Missing samples are stored as NaN until [`preprocess`](crate::preprocess) fills them.
#[derive(Debug, Clone, Default)]
pub struct SensorTable {
    columns: IndexMap<String, Vec<f64>>,
    labels: Option<Vec<u8>>,
    rows: usize,
}

impl SensorTable {
    /// Build a table from columns in order. Every column must have the same length.
    pub fn from_columns(
        columns: Vec<(String, Vec<f64>)>,
        labels: Option<Vec<u8>>,
    ) -> Result<Self, IngestError> {
        let rows = columns
            .first()
            .map(|(_, v)| v.len())
            .or_else(|| labels.as_ref().map(Vec::len))
            .unwrap_or(0);

        let mut map = IndexMap::with_capacity(columns.len());
        for (name, values) in columns {
            if values.len() != rows {
                return Err(IngestError::RaggedColumn {
                    column: name,
                    expected: rows,
                    actual: values.len(),
                });
            }
            map.insert(name, values);
        }
        if let Some(l) = &labels {
            if l.len() != rows {
                return Err(IngestError::RaggedColumn {
                    column: "label".to_string(),
                    expected: rows,
                    actual: l.len(),
                });
            }
        }

        Ok(Self {
            columns: map,
            labels,
            rows,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn sensor_count(&self) -> usize {
        self.columns.len()
    }

    /// Sensor names in column order.
    pub fn sensors(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, sensor: &str) -> Option<&[f64]> {
        self.columns.get(sensor).map(Vec::as_slice)
    }

    pub fn labels(&self) -> Option<&[u8]> {
        self.labels.as_deref()
    }

    /// Copy one column out as a [`Series`].
    pub fn series(&self, sensor: &str) -> Option<Series> {
        self.columns
            .get(sensor)
            .map(|values| Series::new(sensor, values.clone()))
    }

    /// All columns as series, in column order.
    pub fn to_series(&self) -> Vec<Series> {
        self.columns
            .iter()
            .map(|(name, values)| Series::new(name.clone(), values.clone()))
            .collect()
    }

    /// Remove a sensor column, returning its samples.
    pub fn drop_sensor(&mut self, sensor: &str) -> Option<Vec<f64>> {
        self.columns.shift_remove(sensor)
    }

    pub(crate) fn column_mut(&mut self, sensor: &str) -> Option<&mut Vec<f64>> {
        self.columns.get_mut(sensor)
    }
}
