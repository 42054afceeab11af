//! Service G — Recovery Bookkeeper (§4.8).

use std::collections::HashMap;

use crate::config::FairnessConfig;
use crate::fairness::fairness_stats;
use crate::model::{AssignmentProposal, DailyStats, DriverId, RunId};
use chrono::NaiveDate;

pub struct RecoveryBookkeeper;

impl RecoveryBookkeeper {
    pub fn new() -> Self {
        Self
    }

    /// `recovery_targets`. Reads the last 7 `DailyStats` rows per driver
    /// (passed in, most-recent-first) and returns a target effort per
    /// driver, or `None` when recovery mode is off, no stats exist, or the
    /// driver isn't in a hard-debt state.
    pub fn recovery_targets(
        &self,
        recent_stats: &HashMap<DriverId, Vec<DailyStats>>,
        config: &FairnessConfig,
    ) -> HashMap<DriverId, Option<f64>> {
        recent_stats
            .iter()
            .map(|(&driver_id, history)| {
                let target = self.target_for_driver(history, config);
                (driver_id, target)
            })
            .collect()
    }

    fn target_for_driver(&self, history: &[DailyStats], config: &FairnessConfig) -> Option<f64> {
        if !config.recovery_mode_enabled || history.is_empty() {
            return None;
        }
        let latest_debt = history[0].complexity_debt;
        if latest_debt < config.complexity_debt_hard_threshold {
            return None;
        }
        let recent_avg = history.iter().map(|s| s.avg_workload).sum::<f64>() / history.len() as f64;
        Some(recent_avg * config.recovery_lightening_factor)
    }

    /// `update_daily_stats`. Computes today's per-driver `DailyStats` rows
    /// from the run's final assignments and each driver's previous debt.
    pub fn update_daily_stats(
        &self,
        run_id: RunId,
        date: NaiveDate,
        proposal: &AssignmentProposal,
        previous: &HashMap<DriverId, DailyStats>,
        config: &FairnessConfig,
    ) -> Vec<DailyStats> {
        let efforts: Vec<f64> = proposal.assignments.iter().map(|a| a.effort).collect();
        let (avg, std, _, _, _) = fairness_stats(&efforts);
        let hard_threshold = avg + 0.5 * std;

        proposal
            .assignments
            .iter()
            .map(|assignment| {
                let prev = previous.get(&assignment.driver_id);
                let prev_debt = prev.map(|p| p.complexity_debt).unwrap_or(0.0);
                let is_hard = assignment.effort > hard_threshold;

                let mut new_debt = if is_hard { prev_debt + 1.0 } else { (prev_debt - 0.5).max(0.0) };
                let mut is_recovery_day = false;

                if let Some(prev) = prev {
                    if prev.complexity_debt >= config.complexity_debt_hard_threshold {
                        let recovery_target = prev.avg_workload * config.recovery_lightening_factor;
                        if assignment.effort <= recovery_target {
                            is_recovery_day = true;
                            new_debt = (prev_debt - 1.0).max(0.0);
                        }
                    }
                }

                DailyStats {
                    driver_id: assignment.driver_id,
                    date,
                    avg_workload: assignment.effort,
                    is_hard_day: is_hard,
                    complexity_debt: new_debt,
                    is_recovery_day,
                    predicted_effort: None,
                    actual_effort: Some(assignment.effort),
                    model_version: None,
                    run_id,
                }
            })
            .collect()
    }
}

impl Default for RecoveryBookkeeper {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Assignment;

    fn stats(debt: f64, avg: f64) -> DailyStats {
        DailyStats {
            driver_id: DriverId::new(),
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            avg_workload: avg,
            is_hard_day: false,
            complexity_debt: debt,
            is_recovery_day: false,
            predicted_effort: None,
            actual_effort: None,
            model_version: None,
            run_id: RunId::new(),
        }
    }

    #[test]
    fn recovery_target_is_none_when_mode_disabled() {
        let bookkeeper = RecoveryBookkeeper::new();
        let driver = DriverId::new();
        let mut history = HashMap::new();
        history.insert(driver, vec![stats(3.5, 80.0)]);
        let config = FairnessConfig { recovery_mode_enabled: false, ..Default::default() };
        let targets = bookkeeper.recovery_targets(&history, &config);
        assert_eq!(targets[&driver], None);
    }

    #[test]
    fn hard_debt_driver_gets_lightened_target() {
        let bookkeeper = RecoveryBookkeeper::new();
        let driver = DriverId::new();
        let mut history = HashMap::new();
        history.insert(driver, vec![stats(3.5, 80.0)]);
        let config = FairnessConfig { recovery_mode_enabled: true, recovery_lightening_factor: 0.7, ..Default::default() };
        let targets = bookkeeper.recovery_targets(&history, &config);
        assert_eq!(targets[&driver], Some(56.0));
    }

    #[test]
    fn hard_day_increases_debt_by_one() {
        let bookkeeper = RecoveryBookkeeper::new();
        let hard_driver = DriverId::new();
        let light_driver = DriverId::new();
        let run_id = RunId::new();
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).unwrap();
        let proposal = AssignmentProposal {
            assignments: vec![
                Assignment { driver_id: hard_driver, route_id: crate::model::RouteId::new(), effort: 150.0 },
                Assignment { driver_id: light_driver, route_id: crate::model::RouteId::new(), effort: 50.0 },
            ],
        };
        let previous = HashMap::new();
        let config = FairnessConfig::default();
        let updated = bookkeeper.update_daily_stats(run_id, date, &proposal, &previous, &config);
        let hard_entry = updated.iter().find(|s| s.driver_id == hard_driver).unwrap();
        assert_eq!(hard_entry.complexity_debt, 1.0);
        assert!(hard_entry.is_hard_day);
    }
}
