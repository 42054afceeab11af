//! (H2) Per-driver effort regressor (§4.9).
//!
//! §9 redesign flag ("Pickled per-driver ML models"): rather than
//! language-specific object serialization, the trained model is a
//! versioned feature schema plus an explicit, opaque payload carrying the
//! regressor weights.

use serde::{Deserialize, Serialize};

pub const FEATURE_NAMES: [&str; 8] = [
    "num_packages",
    "total_weight_kg",
    "num_stops",
    "route_difficulty_score",
    "estimated_time_minutes",
    "experience_days",
    "recent_avg_workload",
    "recent_hard_days",
];

pub const CURRENT_SCHEMA_VERSION: u32 = 1;
const MIN_TRAINING_SAMPLES: usize = 10;
const MAX_TRAINING_ROWS: usize = 100;

/// One training row: 8 features plus the observed effort target.
#[derive(Debug, Clone, Copy)]
pub struct TrainingRow {
    pub features: [f64; 8],
    pub observed_effort: f64,
}

/// A trained model: versioned schema plus an opaque weights blob, per the
/// §9 redesign note. `payload_bytes` is the little-endian f64 weight
/// vector (bias + one coefficient per feature).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverEffortModel {
    pub version: u32,
    pub feature_names: Vec<String>,
    pub payload_format: String,
    pub payload_bytes: Vec<u8>,
    pub training_mse: f64,
}

/// The `metrics` argument of `Store::save_driver_model` (§6.1): everything
/// about a trained model except the opaque weights blob, so a store can
/// index/report on models without deserializing `payload_bytes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverModelMetrics {
    pub version: u32,
    pub feature_names: Vec<String>,
    pub payload_format: String,
    pub training_mse: f64,
}

impl DriverEffortModel {
    pub fn metrics(&self) -> DriverModelMetrics {
        DriverModelMetrics {
            version: self.version,
            feature_names: self.feature_names.clone(),
            payload_format: self.payload_format.clone(),
            training_mse: self.training_mse,
        }
    }

    fn weights(&self) -> Vec<f64> {
        self.payload_bytes
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
            .collect()
    }

    pub fn predict(&self, features: &[f64; 8]) -> f64 {
        let w = self.weights();
        if w.len() != FEATURE_NAMES.len() + 1 {
            return 0.0;
        }
        let mut y = w[0];
        for (i, f) in features.iter().enumerate() {
            y += w[i + 1] * f;
        }
        y
    }
}

/// Trains a per-driver regressor via ordinary least squares (normal
/// equations) over the driver's last up to 100 `DailyStats` rows with an
/// observed effort. Training is skipped when there are fewer than 10
/// samples.
pub fn train(rows: &[TrainingRow]) -> Option<DriverEffortModel> {
    let rows = if rows.len() > MAX_TRAINING_ROWS {
        &rows[rows.len() - MAX_TRAINING_ROWS..]
    } else {
        rows
    };
    if rows.len() < MIN_TRAINING_SAMPLES {
        return None;
    }

    let num_features = FEATURE_NAMES.len() + 1; // + bias
    let mut xtx = vec![vec![0.0; num_features]; num_features];
    let mut xty = vec![0.0; num_features];

    for row in rows {
        let mut x = vec![1.0; num_features];
        x[1..].copy_from_slice(&row.features);
        for i in 0..num_features {
            xty[i] += x[i] * row.observed_effort;
            for j in 0..num_features {
                xtx[i][j] += x[i] * x[j];
            }
        }
    }

    let weights = solve_linear_system(xtx, xty)?;

    let mse = rows
        .iter()
        .map(|row| {
            let mut x = vec![1.0; num_features];
            x[1..].copy_from_slice(&row.features);
            let predicted: f64 = x.iter().zip(&weights).map(|(a, b)| a * b).sum();
            (predicted - row.observed_effort).powi(2)
        })
        .sum::<f64>()
        / rows.len() as f64;

    let mut payload_bytes = Vec::with_capacity(weights.len() * 8);
    for w in &weights {
        payload_bytes.extend_from_slice(&w.to_le_bytes());
    }

    Some(DriverEffortModel {
        version: CURRENT_SCHEMA_VERSION,
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        payload_format: "f64le_weights_v1".to_string(),
        payload_bytes,
        training_mse: mse,
    })
}

/// Gaussian elimination with partial pivoting. Returns `None` on a
/// (near-)singular system rather than panicking, leaving the caller to
/// treat the driver as having no trainable model yet.
fn solve_linear_system(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot_row = (col..n).max_by(|&r1, &r2| a[r1][col].abs().partial_cmp(&a[r2][col].abs()).unwrap())?;
        if a[pivot_row][col].abs() < 1e-10 {
            return None;
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        for j in col..n {
            a[col][j] /= pivot;
        }
        b[col] /= pivot;

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[row][col];
            for j in col..n {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }
    Some(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_skipped_below_minimum_samples() {
        let rows = vec![
            TrainingRow { features: [1.0; 8], observed_effort: 10.0 };
            5
        ];
        assert!(train(&rows).is_none());
    }

    #[test]
    fn recovers_a_simple_linear_relationship() {
        let mut rows = Vec::new();
        for i in 0..20 {
            let packages = i as f64;
            let mut features = [0.0; 8];
            features[0] = packages;
            rows.push(TrainingRow { features, observed_effort: 5.0 + 2.0 * packages });
        }
        let model = train(&rows).expect("enough samples to train");
        let prediction = model.predict(&[10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!((prediction - 25.0).abs() < 1e-6);
        assert!(model.training_mse < 1e-6);
    }
}
