//! Agent D — Driver Liaison (§4.5).

use std::collections::HashMap;

use crate::model::{DriverContext, DriverId, LiaisonDecision, LiaisonVerdict, RouteId};

/// Alternative route available to a driver, excluding its current
/// assignment.
#[derive(Debug, Clone, Copy)]
pub struct Alternative {
    pub route_id: RouteId,
    pub effort: f64,
}

pub struct DriverLiaison;

impl DriverLiaison {
    pub fn new() -> Self {
        Self
    }

    /// `rank_in_team`: 1 for the highest-effort driver, N for the lowest,
    /// ties broken by driver id ordering.
    pub fn rank_drivers(efforts: &HashMap<DriverId, f64>) -> HashMap<DriverId, usize> {
        let mut ordered: Vec<(DriverId, f64)> = efforts.iter().map(|(&id, &e)| (id, e)).collect();
        ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        ordered.into_iter().enumerate().map(|(i, (id, _))| (id, i + 1)).collect()
    }

    pub fn decide(
        &self,
        driver_id: DriverId,
        assigned_effort: f64,
        context: &DriverContext,
        global_avg: f64,
        global_std: f64,
        rank_in_team: usize,
        alternatives: &[Alternative],
    ) -> LiaisonDecision {
        let mut comfort_upper = context.recent_avg_effort + global_std.max(context.recent_std_effort);
        if context.recent_hard_days >= 3 {
            comfort_upper -= 0.3 * global_std;
        }
        if context.fatigue_score >= 4.0 {
            comfort_upper -= 0.2 * global_std;
        }
        comfort_upper = comfort_upper.max(0.7 * context.recent_avg_effort);

        if assigned_effort <= comfort_upper {
            return LiaisonDecision {
                driver_id,
                verdict: LiaisonVerdict::Accept,
                preferred_route_id: None,
                reason: "assigned effort within comfort range".into(),
            };
        }

        let mut sorted_alternatives = alternatives.to_vec();
        sorted_alternatives.sort_by(|a, b| a.effort.partial_cmp(&b.effort).unwrap_or(std::cmp::Ordering::Equal));

        for alt in &sorted_alternatives {
            let is_lighter = alt.effort <= assigned_effort * 0.9;
            let guards_top_rank = rank_in_team > 2 || alt.effort >= 0.5 * global_avg;
            if is_lighter && guards_top_rank {
                return LiaisonDecision {
                    driver_id,
                    verdict: LiaisonVerdict::Counter,
                    preferred_route_id: Some(alt.route_id),
                    reason: "found a lighter alternative route".into(),
                };
            }
        }

        LiaisonDecision {
            driver_id,
            verdict: LiaisonVerdict::ForceAccept,
            preferred_route_id: None,
            reason: "no acceptable alternative found".into(),
        }
    }
}

impl Default for DriverLiaison {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_when_within_comfort_range() {
        let liaison = DriverLiaison::new();
        let context = DriverContext { recent_avg_effort: 50.0, recent_std_effort: 5.0, ..Default::default() };
        let decision = liaison.decide(DriverId::new(), 52.0, &context, 50.0, 10.0, 3, &[]);
        assert_eq!(decision.verdict, LiaisonVerdict::Accept);
    }

    #[test]
    fn counters_with_lighter_alternative() {
        let liaison = DriverLiaison::new();
        let context = DriverContext { recent_avg_effort: 50.0, recent_std_effort: 5.0, ..Default::default() };
        let alt = Alternative { route_id: RouteId::new(), effort: 30.0 };
        let decision = liaison.decide(DriverId::new(), 100.0, &context, 50.0, 5.0, 5, &[alt]);
        assert_eq!(decision.verdict, LiaisonVerdict::Counter);
        assert_eq!(decision.preferred_route_id, Some(alt.route_id));
    }

    #[test]
    fn force_accepts_when_no_alternative_qualifies() {
        let liaison = DriverLiaison::new();
        let context = DriverContext { recent_avg_effort: 50.0, recent_std_effort: 5.0, ..Default::default() };
        let decision = liaison.decide(DriverId::new(), 100.0, &context, 50.0, 5.0, 5, &[]);
        assert_eq!(decision.verdict, LiaisonVerdict::ForceAccept);
    }

    #[test]
    fn ranking_breaks_ties_by_driver_id() {
        let a = DriverId::new();
        let b = DriverId::new();
        let mut efforts = HashMap::new();
        efforts.insert(a, 50.0);
        efforts.insert(b, 50.0);
        let ranks = DriverLiaison::rank_drivers(&efforts);
        assert_eq!(ranks.len(), 2);
    }
}
