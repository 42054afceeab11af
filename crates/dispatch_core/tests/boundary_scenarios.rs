//! Boundary scenarios S1–S3 from the spec's testable-properties seed list,
//! run end-to-end through `RunController` against the in-memory reference
//! `Store`. S4–S6 are exercised closer to the grain the spec states them
//! at (a single agent's contract) and already live as `#[cfg(test)]` unit
//! tests in `recovery.rs` (S4) and `resolver.rs` (S5/S6); duplicating them
//! here against hand-built routes would just restate the same arithmetic
//! with extra plumbing in between.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use dispatch_core::collaborators::reference::InMemoryStore;
use dispatch_core::collaborators::{Cluster, PackageClusterer, PackageInput, StopOrderer};
use dispatch_core::config::FairnessConfig;
use dispatch_core::controller::{DriverInput, RunController, RunRequest, WarehouseCoordinate};
use dispatch_core::event_bus::EventBus;
use dispatch_core::model::{ExplanationCategory, VehicleKind};

struct ClusterSpec {
    weight_kg: f64,
    num_stops: u32,
    package_count: usize,
}

/// Hands back clusters with caller-chosen aggregates regardless of the
/// actual packages passed in, so a test can pin exact effort values
/// instead of depending on a real clustering heuristic.
struct FixedAggregateClusterer {
    specs: Vec<ClusterSpec>,
}

#[async_trait]
impl PackageClusterer for FixedAggregateClusterer {
    async fn cluster(&self, _packages: &[PackageInput], _num_routes: usize) -> Result<Vec<Cluster>, String> {
        let mut clusters = Vec::with_capacity(self.specs.len());
        let mut offset = 0;
        for (i, spec) in self.specs.iter().enumerate() {
            let indices: Vec<usize> = (offset..offset + spec.package_count).collect();
            offset += spec.package_count;
            clusters.push(Cluster {
                cluster_id: format!("cluster-{i}"),
                package_indices: indices,
                total_weight_kg: spec.weight_kg,
                num_stops: spec.num_stops,
            });
        }
        Ok(clusters)
    }
}

/// Every hop costs exactly `km_per_hop`, independent of the packages'
/// actual coordinates — lets a test pin `Route.total_distance_km` exactly.
struct FixedDistanceStopOrderer {
    km_per_hop: f64,
}

#[async_trait]
impl StopOrderer for FixedDistanceStopOrderer {
    async fn order(&self, packages: &[PackageInput], _start: (f64, f64)) -> Vec<usize> {
        (0..packages.len()).collect()
    }

    fn great_circle_km(&self, _lat1: f64, _lng1: f64, _lat2: f64, _lng2: f64) -> f64 {
        self.km_per_hop
    }
}

/// Like `FixedDistanceStopOrderer`, but hands out a different fixed
/// per-hop distance to each successive route, in cluster order — lets a
/// test pin distinct `Route.total_distance_km` values per route.
struct PerRouteDistanceStopOrderer {
    km_by_route: Vec<f64>,
    cursor: std::sync::Mutex<usize>,
    current: std::sync::Mutex<f64>,
}

impl PerRouteDistanceStopOrderer {
    fn new(km_by_route: Vec<f64>) -> Self {
        Self { km_by_route, cursor: std::sync::Mutex::new(0), current: std::sync::Mutex::new(0.0) }
    }
}

#[async_trait]
impl StopOrderer for PerRouteDistanceStopOrderer {
    async fn order(&self, packages: &[PackageInput], _start: (f64, f64)) -> Vec<usize> {
        let mut cursor = self.cursor.lock().unwrap();
        *self.current.lock().unwrap() = self.km_by_route[*cursor];
        *cursor += 1;
        (0..packages.len()).collect()
    }

    fn great_circle_km(&self, _lat1: f64, _lng1: f64, _lat2: f64, _lng2: f64) -> f64 {
        *self.current.lock().unwrap()
    }
}

fn flat_package(priority: i32) -> PackageInput {
    PackageInput { weight_kg: 1.0, lat: 12.97, lng: 77.59, fragility_level: 1, priority }
}

fn driver(name: &str, kind: VehicleKind, battery_range_km: Option<f64>) -> DriverInput {
    DriverInput {
        id: dispatch_core::model::DriverId::new(),
        external_id: Some(name.to_string()),
        name: name.to_string(),
        vehicle_capacity_kg: 100.0,
        vehicle_kind: kind,
        battery_range_km,
        charging_time_minutes: Some(30.0),
        preferred_language: "en".into(),
    }
}

fn warehouse() -> WarehouseCoordinate {
    WarehouseCoordinate { lat: 12.97, lng: 77.59 }
}

fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 7, 28).unwrap()
}

fn controller(config: FairnessConfig, clusterer: Arc<dyn PackageClusterer>, km_per_hop: f64) -> RunController {
    RunController::new(
        Arc::new(InMemoryStore::new(config)),
        clusterer,
        Arc::new(FixedDistanceStopOrderer { km_per_hop }),
        Arc::new(EventBus::new()),
        None,
    )
}

fn controller_with_stop_orderer(
    config: FairnessConfig,
    clusterer: Arc<dyn PackageClusterer>,
    stop_orderer: Arc<dyn StopOrderer>,
) -> RunController {
    RunController::new(Arc::new(InMemoryStore::new(config)), clusterer, stop_orderer, Arc::new(EventBus::new()), None)
}

/// S1 — trivially fair: three identical drivers, three identical routes.
/// Expect gini=0, std=0, max_gap=0, ACCEPT, no swaps, every explanation
/// NEAR_AVG.
#[tokio::test]
async fn s1_trivially_fair_scenario_accepts_with_zero_inequality() {
    let drivers: Vec<DriverInput> = (0..3)
        .map(|i| driver(&format!("driver-{i}"), VehicleKind::Combustion, None))
        .collect();
    let packages: Vec<PackageInput> = (0..6).map(|_| flat_package(0)).collect();
    let clusterer = Arc::new(FixedAggregateClusterer {
        specs: (0..3).map(|_| ClusterSpec { weight_kg: 10.0, num_stops: 2, package_count: 2 }).collect(),
    });

    let controller = controller(FairnessConfig::default(), clusterer, 0.0);
    let request = RunRequest { drivers, packages, warehouse: warehouse(), date: test_date() };
    let response = controller.run(request).await.expect("uniform scenario should succeed");

    assert_eq!(response.fairness.gini, 0.0);
    assert_eq!(response.fairness.std_dev, 0.0);
    assert_eq!(response.fairness.max_gap, 0.0);
    assert_eq!(response.fairness.status, dispatch_core::model::FairnessStatus::Accept);
    assert!(!response.fairness.reoptimized);

    for assignment in &response.assignments {
        assert_eq!(assignment.explanation.category, ExplanationCategory::NearAvg);
    }

    let timeline = controller.timeline(response.run_id).await.unwrap();
    assert!(timeline.entries.iter().all(|e| e.step_type != "PROPOSAL_2"));
    assert!(timeline.entries.iter().any(|e| e.step_type == "MATRIX_GENERATION"));
    assert!(timeline.entries.iter().any(|e| e.step_type == "EXPLANATIONS_GENERATED"));
}

/// S2 — re-optimization required: a single overloaded route drags proposal
/// 1's fairness metrics past the (lowered) thresholds. Expect the
/// controller to run a second planner pass and accept it per the
/// `gini(p2) <= gini(p1) OR max_gap(p2) < max_gap(p1)` rule (invariant 6).
#[tokio::test]
async fn s2_skewed_scenario_triggers_one_reoptimization_round() {
    let drivers: Vec<DriverInput> = (0..4)
        .map(|i| driver(&format!("driver-{i}"), VehicleKind::Combustion, None))
        .collect();
    let packages: Vec<PackageInput> = (0..8).map(|_| flat_package(0)).collect();
    // Three light routes and one heavily overloaded route relative to every
    // driver's 100kg capacity — this blows up gini/std/max_gap well past
    // the defaults (0.33 / 25 / 25).
    let specs = vec![
        ClusterSpec { weight_kg: 5.0, num_stops: 2, package_count: 2 },
        ClusterSpec { weight_kg: 5.0, num_stops: 2, package_count: 2 },
        ClusterSpec { weight_kg: 5.0, num_stops: 2, package_count: 2 },
        ClusterSpec { weight_kg: 200.0, num_stops: 2, package_count: 2 },
    ];
    let clusterer = Arc::new(FixedAggregateClusterer { specs });

    let controller = controller(FairnessConfig::default(), clusterer, 0.0);
    let request = RunRequest { drivers, packages, warehouse: warehouse(), date: test_date() };
    let response = controller.run(request).await.expect("skewed scenario should still produce a proposal");

    assert!(response.fairness.reoptimized, "expected the skew to force a second planner pass");

    let timeline = controller.timeline(response.run_id).await.unwrap();
    assert!(timeline.entries.iter().any(|e| e.step_type == "FAIRNESS_CHECK_PROPOSAL_1"));
    assert!(timeline.entries.iter().any(|e| e.step_type == "PROPOSAL_2"));
    assert!(timeline.entries.iter().any(|e| e.step_type == "FAIRNESS_CHECK_PROPOSAL_2"));

    // Invariant 8: the agent order is fixed even across a re-optimization
    // round.
    let order: Vec<&str> = timeline.entries.iter().map(|e| e.step_type.as_str()).collect();
    let p1 = order.iter().position(|&s| s == "FAIRNESS_CHECK_PROPOSAL_1").unwrap();
    let p2 = order.iter().position(|&s| s == "PROPOSAL_2").unwrap();
    let liaison = order.iter().position(|&s| s == "LIAISON_DECISIONS").unwrap();
    assert!(p1 < p2);
    assert!(p2 < liaison);
}

/// S3 — EV infeasibility: an electric driver whose effective range falls
/// short of a 95km route must not receive it; a combustion driver picks
/// it up instead, while the EV driver takes the short route it can reach.
#[tokio::test]
async fn s3_ev_driver_cannot_be_assigned_a_route_beyond_effective_range() {
    let ev = driver("ev-driver", VehicleKind::Electric, Some(100.0));
    let ice = driver("ice-driver", VehicleKind::Combustion, None);
    let drivers = vec![ev.clone(), ice.clone()];
    let packages: Vec<PackageInput> = (0..2).map(|_| flat_package(0)).collect();
    // One package per route => each route's total_distance_km is exactly
    // one hop, letting `PerRouteDistanceStopOrderer` pin it precisely.
    let specs = vec![
        ClusterSpec { weight_kg: 5.0, num_stops: 1, package_count: 1 },
        ClusterSpec { weight_kg: 5.0, num_stops: 1, package_count: 1 },
    ];
    let clusterer = Arc::new(FixedAggregateClusterer { specs });
    let stop_orderer = Arc::new(PerRouteDistanceStopOrderer::new(vec![10.0, 95.0]));

    let mut config = FairnessConfig::default();
    config.ev_safety_margin_pct = 10.0; // effective range = 100 * 0.9 = 90 < 95, but > 10
    let controller = controller_with_stop_orderer(config, clusterer, stop_orderer);
    let request = RunRequest { drivers, packages, warehouse: warehouse(), date: test_date() };
    let response = controller.run(request).await.expect("the ICE driver can cover the 95km route");

    assert_eq!(response.assignments.len(), 2);
    let routes: HashSet<_> = response.assignments.iter().map(|a| a.route_id).collect();
    assert_eq!(routes.len(), 2, "both routes must be covered (invariant 1)");

    let ev_route_summary =
        response.assignments.iter().find(|a| a.driver_id == ev.id).unwrap().route_summary.clone();
    let ice_route_summary =
        response.assignments.iter().find(|a| a.driver_id == ice.id).unwrap().route_summary.clone();
    // Both routes carry identical package/weight/stop aggregates, so the
    // only signal distinguishing them in the summary is estimated travel
    // time, which is driven by distance: 58 min for the 10km route, 228
    // min for the 95km one the EV driver is infeasible for.
    assert!(ev_route_summary.contains("58 min"), "EV driver should hold the short route, got: {ev_route_summary}");
    assert!(ice_route_summary.contains("228 min"), "ICE driver should hold the long route, got: {ice_route_summary}");
}
