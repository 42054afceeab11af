//! EV feasibility and charging-overhead adjustment (§4.2).

use crate::config::EvConfig;
use crate::model::{Driver, Route, VehicleKind};

/// Returns `(feasible, overhead)`. `overhead` is added to both
/// `capacity_penalty` and `total` when the pair is feasible but the route
/// eats into the driver's charging buffer.
pub fn ev_adjustment(driver: &Driver, route: &Route, ev_config: &EvConfig) -> (bool, f64) {
    if driver.vehicle_kind != VehicleKind::Electric {
        return (true, 0.0);
    }
    let battery_range = match driver.battery_range_km {
        Some(r) if r > 0.0 => r,
        _ => return (true, 0.0),
    };
    let distance = match route.total_distance_km {
        Some(d) => d,
        None => return (true, 0.0),
    };

    let effective_range = battery_range * (1.0 - ev_config.safety_margin_pct / 100.0);
    if distance > effective_range {
        return (false, 0.0);
    }

    let ratio = distance / battery_range;
    if ratio > 0.7 {
        let charging_time = driver.charging_time_minutes.unwrap_or(0.0);
        let overhead = (ratio - 0.7) * charging_time * ev_config.charging_penalty_weight;
        (true, overhead)
    } else {
        (true, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DriverId, RouteId};

    fn ev_driver(battery_range_km: Option<f64>) -> Driver {
        Driver {
            id: DriverId::new(),
            external_id: None,
            name: "ev".into(),
            vehicle_capacity_kg: 100.0,
            vehicle_kind: VehicleKind::Electric,
            battery_range_km,
            charging_time_minutes: Some(30.0),
            preferred_language: "EN".into(),
        }
    }

    fn route_with_distance(km: Option<f64>) -> Route {
        Route {
            id: RouteId::new(),
            cluster_id: "c".into(),
            num_packages: 1,
            total_weight_kg: 1.0,
            num_stops: 1,
            route_difficulty_score: 1.0,
            estimated_time_minutes: 10.0,
            total_distance_km: km,
        }
    }

    #[test]
    fn route_beyond_effective_range_is_infeasible() {
        let d = ev_driver(Some(100.0));
        let r = route_with_distance(Some(95.0));
        let (feasible, _) = ev_adjustment(&d, &r, &EvConfig { safety_margin_pct: 10.0, ..EvConfig::default() });
        assert!(!feasible);
    }

    #[test]
    fn no_battery_range_is_treated_as_feasible() {
        let d = ev_driver(None);
        let r = route_with_distance(Some(9999.0));
        let (feasible, overhead) = ev_adjustment(&d, &r, &EvConfig::default());
        assert!(feasible);
        assert_eq!(overhead, 0.0);
    }

    #[test]
    fn high_utilization_adds_charging_overhead() {
        let d = ev_driver(Some(100.0));
        let r = route_with_distance(Some(80.0));
        let (feasible, overhead) = ev_adjustment(&d, &r, &EvConfig::default());
        assert!(feasible);
        assert!(overhead > 0.0);
    }

    #[test]
    fn combustion_driver_is_always_feasible() {
        let mut d = ev_driver(Some(10.0));
        d.vehicle_kind = VehicleKind::Combustion;
        let r = route_with_distance(Some(99999.0));
        let (feasible, overhead) = ev_adjustment(&d, &r, &EvConfig::default());
        assert!(feasible);
        assert_eq!(overhead, 0.0);
    }
}
