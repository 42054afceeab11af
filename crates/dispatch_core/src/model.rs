//! Core data model (§3).
//!
//! IDs are newtypes over `uuid::Uuid` rather than raw handles: unlike an
//! in-process entity handle, these must survive a round trip through the
//! `Store` collaborator across process boundaries.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

macro_rules! uuid_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_newtype!(DriverId);
uuid_newtype!(RouteId);
uuid_newtype!(RunId);

/// Vehicle kind a driver operates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleKind {
    Combustion,
    Electric,
    Bicycle,
}

impl VehicleKind {
    pub fn is_electric(self) -> bool {
        matches!(self, VehicleKind::Electric)
    }
}

/// A driver known to the core. Created externally; the core only reads it.
///
/// Invariant: an electric driver without a positive `battery_range_km` is
/// treated by the Effort Model as "no distance info, hence feasible" for
/// every EV check (§3, §4.2).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    /// Id in an upstream system of record, if any.
    pub external_id: Option<String>,
    pub name: String,
    pub vehicle_capacity_kg: f64,
    pub vehicle_kind: VehicleKind,
    pub battery_range_km: Option<f64>,
    pub charging_time_minutes: Option<f64>,
    pub preferred_language: String,
}

/// A route, computed once by the package clusterer before agent A runs and
/// immutable across the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    pub id: RouteId,
    pub cluster_id: String,
    pub num_packages: u32,
    pub total_weight_kg: f64,
    pub num_stops: u32,
    pub route_difficulty_score: f64,
    pub estimated_time_minutes: f64,
    pub total_distance_km: Option<f64>,
}

/// Per-driver feedback gathered out of band, consumed by the Learning
/// Agent's reward computation (§4.9 H2). Read-only input to the core; the
/// core never writes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverFeedback {
    pub driver_id: DriverId,
    pub fairness_rating: Option<u8>,
    pub stress_level: Option<u8>,
    pub tiredness_level: Option<u8>,
    pub completed: bool,
}

/// Per-(driver, route) effort breakdown components (§9: replaces the
/// source's `"driver_id:route_id"`-keyed dict with a dense 2-D array).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EffortBreakdown {
    pub physical_effort: f64,
    pub route_complexity: f64,
    pub time_pressure: f64,
    pub capacity_penalty: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffortStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub num_cells: usize,
    pub num_infeasible: usize,
}

/// Dense driver×route effort matrix plus a sparse infeasible set (§9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffortMatrix {
    pub driver_ids: Vec<DriverId>,
    pub route_ids: Vec<RouteId>,
    /// `matrix[driver_idx][route_idx]`
    pub matrix: Vec<Vec<f64>>,
    pub breakdown: Vec<Vec<EffortBreakdown>>,
    pub infeasible_pairs: std::collections::HashSet<(DriverId, RouteId)>,
    pub stats: EffortStats,
}

impl EffortMatrix {
    pub fn driver_index(&self, id: DriverId) -> Option<usize> {
        self.driver_ids.iter().position(|d| *d == id)
    }

    pub fn route_index(&self, id: RouteId) -> Option<usize> {
        self.route_ids.iter().position(|r| *r == id)
    }

    pub fn effort(&self, driver: DriverId, route: RouteId) -> Option<f64> {
        let di = self.driver_index(driver)?;
        let ri = self.route_index(route)?;
        Some(self.matrix[di][ri])
    }

    pub fn is_infeasible(&self, driver: DriverId, route: RouteId) -> bool {
        self.infeasible_pairs.contains(&(driver, route))
    }
}

/// One (driver, route, effort) assignment triple.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub driver_id: DriverId,
    pub route_id: RouteId,
    pub effort: f64,
}

/// A candidate assignment for the whole driver/route set (§3 invariants:
/// each driver at most once, each route exactly once, no infeasible pair).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentProposal {
    pub assignments: Vec<Assignment>,
}

impl AssignmentProposal {
    pub fn total_effort(&self) -> f64 {
        self.assignments.iter().map(|a| a.effort).sum()
    }

    pub fn effort_for(&self, driver: DriverId) -> Option<f64> {
        self.assignments
            .iter()
            .find(|a| a.driver_id == driver)
            .map(|a| a.effort)
    }

    pub fn route_for(&self, driver: DriverId) -> Option<RouteId> {
        self.assignments
            .iter()
            .find(|a| a.driver_id == driver)
            .map(|a| a.route_id)
    }

    pub fn per_driver_efforts(&self) -> HashMap<DriverId, f64> {
        self.assignments.iter().map(|a| (a.driver_id, a.effort)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FairnessStatus {
    Accept,
    Reoptimize,
}

/// Recommendation produced alongside a `REOPTIMIZE` verdict, used to build
/// the penalty map for proposal 2 (§4.3, §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FairnessRecommendations {
    pub ids_to_penalize: Vec<DriverId>,
    pub penalty_factor: f64,
    pub target_max_gap: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairnessReport {
    pub avg_effort: f64,
    pub std_dev: f64,
    pub max_gap: f64,
    pub gini: f64,
    pub min: f64,
    pub max: f64,
    pub outlier_count: usize,
    pub pct_above_avg: f64,
    pub status: FairnessStatus,
    pub recommendations: Option<FairnessRecommendations>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiaisonVerdict {
    Accept,
    Counter,
    ForceAccept,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiaisonDecision {
    pub driver_id: DriverId,
    pub verdict: LiaisonVerdict,
    pub preferred_route_id: Option<RouteId>,
    pub reason: String,
}

/// A swap applied by the Final Resolver (§4.6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SwapRecord {
    pub driver_a: DriverId,
    pub driver_b: DriverId,
    pub route_a: RouteId,
    pub route_b: RouteId,
    pub effort_a_before: f64,
    pub effort_b_before: f64,
    pub effort_a_after: f64,
    pub effort_b_after: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationCategory {
    NearAvg,
    Heavy,
    HeavyWithSwap,
    HeavyNoSwap,
    Recovery,
    LightRecovery,
    Light,
    LearningOptimized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationPair {
    pub driver_id: DriverId,
    pub driver_text: String,
    pub admin_text: String,
    pub category: ExplanationCategory,
}

/// Per-driver context consumed by the Driver Liaison and Explainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverContext {
    pub recent_avg_effort: f64,
    pub recent_std_effort: f64,
    pub recent_hard_days: u32,
    pub fatigue_score: f64,
    pub complexity_debt: f64,
    pub preferences: HashMap<String, bool>,
}

impl Default for DriverContext {
    fn default() -> Self {
        Self {
            recent_avg_effort: 0.0,
            recent_std_effort: 0.0,
            recent_hard_days: 0,
            fatigue_score: 1.0,
            complexity_debt: 0.0,
            preferences: HashMap::new(),
        }
    }
}

/// One record per (driver, date) (§3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStats {
    pub driver_id: DriverId,
    pub date: NaiveDate,
    pub avg_workload: f64,
    pub is_hard_day: bool,
    pub complexity_debt: f64,
    pub is_recovery_day: bool,
    pub predicted_effort: Option<f64>,
    pub actual_effort: Option<f64>,
    pub model_version: Option<u32>,
    pub run_id: RunId,
}

/// One per allocation run, viewed as a bandit pull (§4.9, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningEpisode {
    pub run_id: RunId,
    pub config_hash: String,
    pub config_snapshot: serde_json::Value,
    pub arm_index: i32,
    pub num_drivers: usize,
    pub num_routes: usize,
    pub alpha_prior: f64,
    pub beta_prior: f64,
    pub samples_at_selection: u64,
    pub is_experimental: bool,
    pub episode_reward: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Success,
    Failed,
}
