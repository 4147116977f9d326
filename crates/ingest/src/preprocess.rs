//! Sensor preprocessing ahead of segmentation.
//!
//! Drops sensors that cannot be used at all and fills remaining gaps so the
//! core only ever sees finite samples.

use tracing::{info, warn};

use crate::table::SensorTable;

/// A sensor removed during preprocessing, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedSensor {
    pub sensor: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub table: SensorTable,
    pub dropped: Vec<DroppedSensor>,
}

/// Drop sensors missing more than `max_missing_fraction` of their samples,
/// then forward-fill gaps (back-filling a leading gap).
pub fn preprocess(mut table: SensorTable, max_missing_fraction: f64) -> Preprocessed {
    let rows = table.rows();
    let mut dropped = Vec::new();

    let sensors: Vec<String> = table.sensors().map(str::to_string).collect();
    for sensor in sensors {
        let Some(values) = table.column_mut(&sensor) else {
            continue;
        };
        let missing = values.iter().filter(|v| !v.is_finite()).count();

        if rows == 0 || missing == rows {
            dropped.push(DroppedSensor {
                sensor: sensor.clone(),
                reason: "no samples".to_string(),
            });
            table.drop_sensor(&sensor);
            continue;
        }

        let fraction = missing as f64 / rows as f64;
        if fraction > max_missing_fraction {
            dropped.push(DroppedSensor {
                sensor: sensor.clone(),
                reason: format!("{:.1}% of samples missing", fraction * 100.0),
            });
            table.drop_sensor(&sensor);
            continue;
        }

        if missing > 0 {
            fill_gaps(values);
        }
    }

    for d in &dropped {
        warn!(sensor = %d.sensor, reason = %d.reason, "Sensor dropped during preprocessing");
    }
    info!(
        kept = table.sensor_count(),
        dropped = dropped.len(),
        "Preprocessing complete"
    );

    Preprocessed { table, dropped }
}

/// Forward-fill non-finite samples; a leading gap takes the first finite value.
fn fill_gaps(values: &mut [f64]) {
    let Some(first) = values.iter().copied().find(|v| v.is_finite()) else {
        return;
    };
    let mut last = first;
    for v in values.iter_mut() {
        if v.is_finite() {
            last = *v;
        } else {
            *v = last;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: Vec<(&str, Vec<f64>)>) -> SensorTable {
        SensorTable::from_columns(
            columns
                .into_iter()
                .map(|(n, v)| (n.to_string(), v))
                .collect(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn gaps_are_filled() {
        let nan = f64::NAN;
        let out = preprocess(table(vec![("a", vec![nan, 1.0, nan, nan, 4.0])]), 0.9);
        assert!(out.dropped.is_empty());
        assert_eq!(out.table.column("a").unwrap(), &[1.0, 1.0, 1.0, 1.0, 4.0]);
    }

    #[test]
    fn empty_and_sparse_sensors_dropped() {
        let nan = f64::NAN;
        let out = preprocess(
            table(vec![
                ("empty", vec![nan, nan, nan, nan]),
                ("sparse", vec![1.0, nan, nan, nan]),
                ("ok", vec![1.0, 2.0, 3.0, 4.0]),
            ]),
            0.5,
        );
        let names: Vec<&str> = out.dropped.iter().map(|d| d.sensor.as_str()).collect();
        assert_eq!(names, vec!["empty", "sparse"]);
        let kept: Vec<&str> = out.table.sensors().collect();
        assert_eq!(kept, vec!["ok"]);
    }
}
