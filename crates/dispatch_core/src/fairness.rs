//! Agent C — Fairness Evaluator (§4.4).

use crate::config::FairnessConfig;
use crate::model::{AssignmentProposal, DriverId, FairnessRecommendations, FairnessReport, FairnessStatus};

pub struct FairnessEvaluator;

impl FairnessEvaluator {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, proposal: &AssignmentProposal, config: &FairnessConfig) -> FairnessReport {
        let efforts: Vec<(DriverId, f64)> =
            proposal.assignments.iter().map(|a| (a.driver_id, a.effort)).collect();
        let values: Vec<f64> = efforts.iter().map(|(_, e)| *e).collect();

        let (avg, std_dev, min, max, gini) = fairness_stats(&values);
        let max_gap = max - min;
        let outlier_count = values.iter().filter(|&&e| e > avg + 2.0 * std_dev).count();
        let pct_above_avg = if values.is_empty() {
            0.0
        } else {
            100.0 * values.iter().filter(|&&e| e > avg).count() as f64 / values.len() as f64
        };

        let status = if gini <= config.gini_threshold
            && std_dev <= config.stddev_threshold
            && max_gap <= config.max_gap_threshold
        {
            FairnessStatus::Accept
        } else {
            FairnessStatus::Reoptimize
        };

        let recommendations = if status == FairnessStatus::Reoptimize {
            Some(build_recommendations(&efforts, avg, std_dev, gini, config))
        } else {
            None
        };

        FairnessReport {
            avg_effort: avg,
            std_dev,
            max_gap,
            gini,
            min,
            max,
            outlier_count,
            pct_above_avg,
            status,
            recommendations,
        }
    }
}

impl Default for FairnessEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns `(avg, std_dev, min, max, gini)`. `std_dev` is the sample
/// standard deviation for n>1, 0 for n≤1 (§4.4).
pub fn fairness_stats(values: &[f64]) -> (f64, f64, f64, f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0, 0.0, 0.0, 0.0);
    }
    let n = values.len();
    let avg = values.iter().sum::<f64>() / n as f64;
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let std_dev = if n > 1 {
        let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / (n - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    let gini = compute_gini(values, avg);

    (avg, std_dev, min, max, gini)
}

/// `gini = Σ|xᵢ−xⱼ| / (2·n²·mean)`, 0 when mean=0 or n≤1, clamped to
/// [0,1] and rounded to 4 decimals (§4.4, invariant 10).
pub fn compute_gini(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n <= 1 || mean == 0.0 {
        return 0.0;
    }
    let mut sum_abs_diff = 0.0;
    for &xi in values {
        for &xj in values {
            sum_abs_diff += (xi - xj).abs();
        }
    }
    let gini = sum_abs_diff / (2.0 * (n * n) as f64 * mean);
    let clamped = gini.clamp(0.0, 1.0);
    (clamped * 10_000.0).round() / 10_000.0
}

/// Legacy fairness-score formula, preserved as-is per the §9 Open Question:
/// `1 - |w - avg| / max(avg, 1)`. Its boundary behavior at `avg=0` is
/// untested upstream and is not "fixed" here; callers outside this module
/// only ever see `avg > 0` in practice (an empty proposal never reaches the
/// explainer/response layer).
pub fn legacy_fairness_score(workload: f64, avg: f64) -> f64 {
    1.0 - (workload - avg).abs() / avg.max(1.0)
}

fn build_recommendations(
    efforts: &[(DriverId, f64)],
    avg: f64,
    std: f64,
    gini: f64,
    config: &FairnessConfig,
) -> FairnessRecommendations {
    let threshold = if std > 0.0 { avg + std } else { avg + 0.15 * avg };
    let ids_to_penalize: Vec<DriverId> = efforts
        .iter()
        .filter(|(_, e)| *e > threshold)
        .map(|(id, _)| *id)
        .collect();

    let penalty_factor = if config.gini_threshold > 0.0 {
        (1.0 + 0.5 * (gini / config.gini_threshold - 1.0)).clamp(1.2, 2.0)
    } else {
        1.2
    };
    let penalty_factor = (penalty_factor * 100.0).round() / 100.0;

    FairnessRecommendations {
        ids_to_penalize,
        penalty_factor,
        target_max_gap: config.max_gap_threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Assignment, RouteId};

    fn proposal(efforts: &[f64]) -> AssignmentProposal {
        let assignments = efforts
            .iter()
            .map(|&e| Assignment {
                driver_id: DriverId::new(),
                route_id: RouteId::new(),
                effort: e,
            })
            .collect();
        AssignmentProposal { assignments }
    }

    #[test]
    fn equal_efforts_yield_zero_gini_and_accept() {
        let evaluator = FairnessEvaluator::new();
        let p = proposal(&[50.0, 50.0, 50.0]);
        let report = evaluator.evaluate(&p, &FairnessConfig::default());
        assert_eq!(report.gini, 0.0);
        assert_eq!(report.std_dev, 0.0);
        assert_eq!(report.max_gap, 0.0);
        assert_eq!(report.status, FairnessStatus::Accept);
    }

    #[test]
    fn skewed_efforts_trigger_reoptimize_with_recommendations() {
        let evaluator = FairnessEvaluator::new();
        let mut config = FairnessConfig::default();
        config.gini_threshold = 0.15;
        let p = proposal(&[10.0, 10.0, 90.0, 90.0]);
        let report = evaluator.evaluate(&p, &config);
        assert_eq!(report.status, FairnessStatus::Reoptimize);
        assert!(report.recommendations.is_some());
        assert!(!report.recommendations.unwrap().ids_to_penalize.is_empty());
    }

    #[test]
    fn gini_is_bounded_in_unit_interval() {
        let (_, _, _, _, gini) = fairness_stats(&[1.0, 1000.0, 2.0]);
        assert!((0.0..=1.0).contains(&gini));
    }

    #[test]
    fn legacy_fairness_score_is_one_at_the_average() {
        assert_eq!(legacy_fairness_score(50.0, 50.0), 1.0);
    }

    #[test]
    fn legacy_fairness_score_degrades_with_distance_from_average() {
        let near = legacy_fairness_score(55.0, 50.0);
        let far = legacy_fairness_score(90.0, 50.0);
        assert!(near > far);
    }
}
