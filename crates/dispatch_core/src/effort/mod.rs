//! Agent A — Effort Model (§4.2).
//!
//! Builds the driver×route effort matrix and marks EV-infeasible pairs.
//! Grounded on the source's `MLEffortAgent.compute_effort_matrix` formula;
//! structurally it is a pure scoring function over owned slices, in the
//! style of the teacher's `matching::cost_based::CostBasedMatching`.

mod ev;

pub use ev::ev_adjustment;

use std::collections::HashMap;
use std::collections::HashSet;

use crate::config::{EffortWeights, EvConfig};
use crate::model::{Driver, DriverId, EffortBreakdown, EffortMatrix, EffortStats, Route, RouteId};

/// Per-driver recent stats consumed by the effort formula's fatigue term.
#[derive(Debug, Clone, Copy, Default)]
pub struct DriverEffortStats {
    pub fatigue_level: f64,
}

pub struct EffortModel {
    weights: EffortWeights,
}

impl EffortModel {
    pub fn new(weights: EffortWeights) -> Self {
        Self { weights }
    }

    /// Computes the full effort matrix. Driver/route ordering in the
    /// result fixes row/column order for every downstream agent.
    pub fn compute_effort_matrix(
        &self,
        drivers: &[Driver],
        routes: &[Route],
        driver_stats: &HashMap<DriverId, DriverEffortStats>,
        ev_config: &EvConfig,
    ) -> EffortMatrix {
        let driver_ids: Vec<DriverId> = drivers.iter().map(|d| d.id).collect();
        let route_ids: Vec<RouteId> = routes.iter().map(|r| r.id).collect();

        let mut matrix = Vec::with_capacity(drivers.len());
        let mut breakdown = Vec::with_capacity(drivers.len());
        let mut infeasible_pairs: HashSet<(DriverId, RouteId)> = HashSet::new();
        let mut feasible_efforts = Vec::new();

        for driver in drivers {
            let stats = driver_stats.get(&driver.id).copied().unwrap_or_default();
            let mut row = Vec::with_capacity(routes.len());
            let mut breakdown_row = Vec::with_capacity(routes.len());

            for route in routes {
                let mut b = self.compute_breakdown(driver, route, stats);

                let (feasible, overhead) = ev_adjustment(driver, route, ev_config);
                let final_effort = if !feasible {
                    infeasible_pairs.insert((driver.id, route.id));
                    99999.0
                } else {
                    b.capacity_penalty += overhead;
                    b.total += overhead;
                    b.total
                };

                b.total = round2(final_effort);
                b.physical_effort = round2(b.physical_effort);
                b.route_complexity = round2(b.route_complexity);
                b.time_pressure = round2(b.time_pressure);
                b.capacity_penalty = round2(b.capacity_penalty);

                if feasible {
                    feasible_efforts.push(b.total);
                }

                row.push(b.total);
                breakdown_row.push(b);
            }

            matrix.push(row);
            breakdown.push(breakdown_row);
        }

        let stats = EffortStats {
            min: feasible_efforts.iter().cloned().fold(f64::INFINITY, f64::min).min_or_zero(),
            max: feasible_efforts.iter().cloned().fold(f64::NEG_INFINITY, f64::max).min_or_zero(),
            avg: if feasible_efforts.is_empty() {
                0.0
            } else {
                feasible_efforts.iter().sum::<f64>() / feasible_efforts.len() as f64
            },
            num_cells: feasible_efforts.len(),
            num_infeasible: infeasible_pairs.len(),
        };

        EffortMatrix {
            driver_ids,
            route_ids,
            matrix,
            breakdown,
            infeasible_pairs,
            stats,
        }
    }

    fn compute_breakdown(
        &self,
        driver: &Driver,
        route: &Route,
        stats: DriverEffortStats,
    ) -> EffortBreakdown {
        let w = &self.weights;

        let packages = route.num_packages as f64;
        let weight_kg = route.total_weight_kg;
        let stops = route.num_stops as f64;
        let difficulty = route.route_difficulty_score;
        let estimated_minutes = route.estimated_time_minutes;
        let capacity = driver.vehicle_capacity_kg;

        let mut physical_effort =
            w.alpha_packages * packages + w.beta_weight_kg * weight_kg + 0.4 * w.gamma_difficulty * difficulty;

        let route_complexity = 0.6 * w.gamma_difficulty * difficulty + 0.5 * stops;
        let time_pressure = w.delta_time * estimated_minutes;

        let capacity_penalty = if capacity > 0.0 {
            let load_ratio = weight_kg / capacity;
            if load_ratio > 1.0 {
                10.0 * w.epsilon_capacity_mismatch * (load_ratio - 1.0)
            } else if load_ratio > 0.9 {
                2.0 * w.epsilon_capacity_mismatch * (load_ratio - 0.9)
            } else {
                0.0
            }
        } else {
            0.0
        };

        if stats.fatigue_level > 0.0 {
            physical_effort *= 1.0 + 0.1 * stats.fatigue_level;
        }

        let total = physical_effort + route_complexity + time_pressure + capacity_penalty;

        EffortBreakdown {
            physical_effort,
            route_complexity,
            time_pressure,
            capacity_penalty,
            total,
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

trait MinOrZero {
    fn min_or_zero(self) -> f64;
}

impl MinOrZero for f64 {
    fn min_or_zero(self) -> f64 {
        if self.is_finite() {
            self
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VehicleKind;

    fn driver(id: DriverId, kind: VehicleKind) -> Driver {
        Driver {
            id,
            external_id: None,
            name: "d".into(),
            vehicle_capacity_kg: 100.0,
            vehicle_kind: kind,
            battery_range_km: None,
            charging_time_minutes: None,
            preferred_language: "EN".into(),
        }
    }

    fn route(id: RouteId) -> Route {
        Route {
            id,
            cluster_id: "c".into(),
            num_packages: 10,
            total_weight_kg: 20.0,
            num_stops: 5,
            route_difficulty_score: 2.0,
            estimated_time_minutes: 60.0,
            total_distance_km: Some(10.0),
        }
    }

    #[test]
    fn identical_inputs_round_to_identical_matrices() {
        let model = EffortModel::new(EffortWeights::default());
        let d = driver(DriverId::new(), VehicleKind::Combustion);
        let r = route(RouteId::new());
        let m1 = model.compute_effort_matrix(&[d.clone()], &[r.clone()], &HashMap::new(), &EvConfig::default());
        let m2 = model.compute_effort_matrix(&[d], &[r], &HashMap::new(), &EvConfig::default());
        assert_eq!(m1.matrix, m2.matrix);
    }

    #[test]
    fn overloaded_route_gets_capacity_penalty() {
        let model = EffortModel::new(EffortWeights::default());
        let mut d = driver(DriverId::new(), VehicleKind::Combustion);
        d.vehicle_capacity_kg = 10.0;
        let r = route(RouteId::new());
        let m = model.compute_effort_matrix(&[d], &[r], &HashMap::new(), &EvConfig::default());
        assert!(m.breakdown[0][0].capacity_penalty > 0.0);
    }
}
