//! Agent B — Route Planner (§4.3).

pub mod solver;

use std::collections::HashMap;

use crate::error::InfeasibleAssignmentError;
use crate::model::{Assignment, AssignmentProposal, DriverId, EffortMatrix, FairnessRecommendations};
use solver::SolverChain;

const INFEASIBLE_COST: f64 = 99999.0;

pub struct RoutePlanner {
    chain: SolverChain,
}

impl RoutePlanner {
    pub fn new() -> Self {
        Self { chain: SolverChain::new() }
    }

    /// Builds `penalties[d] = penalty_factor` for every driver named by a
    /// `FairnessReport`'s recommendations, 1.0 elsewhere.
    pub fn penalties_from_recommendations(
        drivers: &[DriverId],
        recommendations: &FairnessRecommendations,
    ) -> HashMap<DriverId, f64> {
        drivers
            .iter()
            .map(|&d| {
                let factor = if recommendations.ids_to_penalize.contains(&d) {
                    recommendations.penalty_factor
                } else {
                    1.0
                };
                (d, factor)
            })
            .collect()
    }

    /// Solves the rectangular assignment problem, returning a single
    /// proposal. `penalties` and `targets` are optional per-driver
    /// multipliers/recovery targets (§4.3).
    pub fn plan(
        &self,
        effort: &EffortMatrix,
        penalties: &HashMap<DriverId, f64>,
        targets: &HashMap<DriverId, f64>,
        recovery_penalty_weight: f64,
    ) -> Result<AssignmentProposal, InfeasibleAssignmentError> {
        if effort.driver_ids.is_empty() || effort.route_ids.is_empty() {
            return Ok(AssignmentProposal::default());
        }

        let mut cost = vec![vec![0.0; effort.route_ids.len()]; effort.driver_ids.len()];
        for (di, &driver_id) in effort.driver_ids.iter().enumerate() {
            let penalty = penalties.get(&driver_id).copied().unwrap_or(1.0);
            let target = targets.get(&driver_id).copied();

            for (ri, &route_id) in effort.route_ids.iter().enumerate() {
                if effort.is_infeasible(driver_id, route_id) {
                    cost[di][ri] = INFEASIBLE_COST;
                    continue;
                }
                let raw_effort = effort.matrix[di][ri];
                let mut c = raw_effort * penalty;
                if let Some(t) = target {
                    c += (raw_effort - t).max(0.0) * recovery_penalty_weight;
                }
                cost[di][ri] = c;
            }
        }

        let (pairs, _tier) = self.chain.solve(&cost);

        if pairs.len() < effort.route_ids.len() {
            return Err(InfeasibleAssignmentError {
                reason: format!(
                    "solver covered {}/{} routes",
                    pairs.len(),
                    effort.route_ids.len()
                ),
            });
        }

        let assignments = pairs
            .into_iter()
            .map(|(di, ri)| Assignment {
                driver_id: effort.driver_ids[di],
                route_id: effort.route_ids[ri],
                effort: effort.matrix[di][ri],
            })
            .collect();

        Ok(AssignmentProposal { assignments })
    }
}

impl Default for RoutePlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RouteId;
    use std::collections::HashSet;

    fn simple_matrix(costs: Vec<Vec<f64>>) -> EffortMatrix {
        let driver_ids: Vec<DriverId> = (0..costs.len()).map(|_| DriverId::new()).collect();
        let route_ids: Vec<RouteId> = (0..costs[0].len()).map(|_| RouteId::new()).collect();
        EffortMatrix {
            driver_ids,
            route_ids,
            breakdown: costs
                .iter()
                .map(|r| r.iter().map(|_| Default::default()).collect())
                .collect(),
            matrix: costs,
            infeasible_pairs: HashSet::new(),
            stats: Default::default(),
        }
    }

    #[test]
    fn empty_drivers_or_routes_yields_empty_proposal() {
        let planner = RoutePlanner::new();
        let effort = EffortMatrix {
            driver_ids: vec![],
            route_ids: vec![],
            matrix: vec![],
            breakdown: vec![],
            infeasible_pairs: HashSet::new(),
            stats: Default::default(),
        };
        let proposal = planner.plan(&effort, &HashMap::new(), &HashMap::new(), 3.0).unwrap();
        assert_eq!(proposal.total_effort(), 0.0);
    }

    #[test]
    fn every_route_covered_exactly_once() {
        let planner = RoutePlanner::new();
        let effort = simple_matrix(vec![vec![10.0, 20.0], vec![15.0, 5.0]]);
        let proposal = planner.plan(&effort, &HashMap::new(), &HashMap::new(), 3.0).unwrap();
        assert_eq!(proposal.assignments.len(), 2);
        let routes: HashSet<_> = proposal.assignments.iter().map(|a| a.route_id).collect();
        assert_eq!(routes.len(), 2);
    }
}
