//! Agent E — Final Resolver (§4.6).
//!
//! Honors `COUNTER` liaison decisions through constrained, greedy,
//! non-backtracking 1-for-1 swaps.

use std::collections::HashMap;

use crate::fairness::fairness_stats;
use crate::model::{AssignmentProposal, DriverId, EffortMatrix, LiaisonDecision, LiaisonVerdict, RouteId, SwapRecord};

const TOLERANCE_EPS: f64 = 0.02;

pub struct FinalResolver;

pub struct ResolutionOutcome {
    pub current_routes: HashMap<DriverId, RouteId>,
    pub current_efforts: HashMap<DriverId, f64>,
    pub swaps: Vec<SwapRecord>,
    pub unfulfilled_counters: Vec<DriverId>,
}

impl FinalResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(
        &self,
        proposal: &AssignmentProposal,
        decisions: &[LiaisonDecision],
        effort: &EffortMatrix,
    ) -> ResolutionOutcome {
        let mut current_route: HashMap<DriverId, crate::model::RouteId> =
            proposal.assignments.iter().map(|a| (a.driver_id, a.route_id)).collect();
        let mut current_efforts = proposal.per_driver_efforts();

        let mut swaps = Vec::new();
        let mut unfulfilled_counters = Vec::new();

        for decision in decisions {
            if decision.verdict != LiaisonVerdict::Counter {
                continue;
            }
            let driver_a = decision.driver_id;
            let Some(route_b) = decision.preferred_route_id else {
                unfulfilled_counters.push(driver_a);
                continue;
            };
            let Some(&route_a) = current_route.get(&driver_a) else {
                unfulfilled_counters.push(driver_a);
                continue;
            };
            let Some(driver_b) = current_route
                .iter()
                .find(|&(_, &r)| r == route_b)
                .map(|(&d, _)| d)
            else {
                unfulfilled_counters.push(driver_a);
                continue;
            };
            if driver_a == driver_b {
                unfulfilled_counters.push(driver_a);
                continue;
            }

            let (Some(e_a_new), Some(e_b_new)) =
                (effort.effort(driver_a, route_b), effort.effort(driver_b, route_a))
            else {
                unfulfilled_counters.push(driver_a);
                continue;
            };

            let e_a_old = current_efforts[&driver_a];
            let e_b_old = current_efforts[&driver_b];

            let old_values: Vec<f64> = current_efforts.values().copied().collect();
            let (old_avg, old_std, old_min, old_max, old_gini) = fairness_stats(&old_values);
            let old_gap = old_max - old_min;

            let mut tentative = current_efforts.clone();
            tentative.insert(driver_a, e_a_new);
            tentative.insert(driver_b, e_b_new);
            let new_values: Vec<f64> = tentative.values().copied().collect();
            let (_new_avg, new_std, new_min, new_max, new_gini) = fairness_stats(&new_values);
            let new_gap = new_max - new_min;
            let _ = old_avg;

            let strictly_improves = new_gini < old_gini || new_std < old_std || new_gap < old_gap;
            let within_tolerance = new_gini <= old_gini * (1.0 + TOLERANCE_EPS)
                && new_std <= old_std * (1.0 + TOLERANCE_EPS) + 0.5
                && new_gap <= old_gap * (1.0 + TOLERANCE_EPS) + 0.5;

            let b_impact_bounded = e_b_new <= 1.30 * e_b_old + 5.0;

            if (strictly_improves || within_tolerance) && b_impact_bounded {
                current_route.insert(driver_a, route_b);
                current_route.insert(driver_b, route_a);
                current_efforts.insert(driver_a, e_a_new);
                current_efforts.insert(driver_b, e_b_new);
                swaps.push(SwapRecord {
                    driver_a,
                    driver_b,
                    route_a,
                    route_b,
                    effort_a_before: e_a_old,
                    effort_b_before: e_b_old,
                    effort_a_after: e_a_new,
                    effort_b_after: e_b_new,
                });
            } else {
                unfulfilled_counters.push(driver_a);
            }
        }

        ResolutionOutcome { current_routes: current_route, current_efforts, swaps, unfulfilled_counters }
    }
}

impl Default for FinalResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Assignment, EffortBreakdown};
    use std::collections::HashSet;

    fn matrix_2x2(m: [[f64; 2]; 2]) -> (EffortMatrix, DriverId, DriverId, crate::model::RouteId, crate::model::RouteId) {
        let da = DriverId::new();
        let db = DriverId::new();
        let ra = crate::model::RouteId::new();
        let rb = crate::model::RouteId::new();
        let matrix = EffortMatrix {
            driver_ids: vec![da, db],
            route_ids: vec![ra, rb],
            matrix: vec![vec![m[0][0], m[0][1]], vec![m[1][0], m[1][1]]],
            breakdown: vec![vec![EffortBreakdown::default(); 2]; 2],
            infeasible_pairs: HashSet::new(),
            stats: Default::default(),
        };
        (matrix, da, db, ra, rb)
    }

    #[test]
    fn swap_accepted_when_fairness_improves_and_b_bounded() {
        let (matrix, da, db, ra, rb) = matrix_2x2([[70.0, 55.0], [60.0, 50.0]]);
        let proposal = AssignmentProposal {
            assignments: vec![
                Assignment { driver_id: da, route_id: ra, effort: 70.0 },
                Assignment { driver_id: db, route_id: rb, effort: 50.0 },
            ],
        };
        let decisions = vec![LiaisonDecision {
            driver_id: da,
            verdict: LiaisonVerdict::Counter,
            preferred_route_id: Some(rb),
            reason: "lighter".into(),
        }];
        let resolver = FinalResolver::new();
        let outcome = resolver.resolve(&proposal, &decisions, &matrix);
        assert_eq!(outcome.swaps.len(), 1);
        assert_eq!(outcome.current_efforts[&da], 55.0);
        assert_eq!(outcome.current_efforts[&db], 60.0);
    }

    #[test]
    fn swap_rejected_when_b_impact_exceeds_bound() {
        let (matrix, da, db, ra, rb) = matrix_2x2([[55.0, 40.0], [90.0, 45.0]]);
        let proposal = AssignmentProposal {
            assignments: vec![
                Assignment { driver_id: da, route_id: ra, effort: 55.0 },
                Assignment { driver_id: db, route_id: rb, effort: 45.0 },
            ],
        };
        let decisions = vec![LiaisonDecision {
            driver_id: da,
            verdict: LiaisonVerdict::Counter,
            preferred_route_id: Some(rb),
            reason: "lighter".into(),
        }];
        let resolver = FinalResolver::new();
        let outcome = resolver.resolve(&proposal, &decisions, &matrix);
        assert!(outcome.swaps.is_empty());
        assert_eq!(outcome.unfulfilled_counters, vec![da]);
    }
}
