//! Collaborator contracts consumed by the core (§6.1), plus minimal
//! in-memory/haversine reference implementations used by the CLI demo and
//! the boundary-scenario tests.
//!
//! Each trait is an `#[async_trait]` boundary, in the spirit of the
//! teacher's `matching::MatchingAlgorithm` trait-object pattern
//! (`Box<dyn MatchingAlgorithm>`), generalized to `Box<dyn Store>` etc.,
//! injected into the `RunController` at construction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::FairnessConfig;
use crate::decision_log::DecisionLogEntry;
use crate::event_bus::Event;
use crate::learning::regressor::{DriverEffortModel, DriverModelMetrics};
use crate::model::{
    Assignment, DailyStats, Driver, DriverId, ExplanationPair, LearningEpisode, Route, RouteId, RunId, RunStatus,
};

#[derive(Debug, Clone)]
pub struct PackageInput {
    pub weight_kg: f64,
    pub lat: f64,
    pub lng: f64,
    /// 1 (NORMAL) – 5 (most fragile), matching `original_source
    /// app/models/package.py::Package.fragility_level`.
    pub fragility_level: u8,
    pub priority: i32,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub cluster_id: String,
    pub package_indices: Vec<usize>,
    pub total_weight_kg: f64,
    pub num_stops: u32,
}

/// Summary fairness metrics for one run, passed to `finalize_run` on
/// success (§6.1). `None` on a failed run, which never reaches a final
/// `FairnessReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub avg_effort: f64,
    pub std_dev: f64,
    pub gini: f64,
    pub max_gap: f64,
    pub num_assignments: usize,
}

/// Typed read/write operations backing the run controller (§6.1). All
/// operations are async; failures surface as `CollaboratorError`.
#[async_trait]
pub trait Store: Send + Sync {
    async fn active_fairness_config(&self) -> Result<Option<FairnessConfig>, String>;
    async fn upsert_drivers(&self, drivers: Vec<Driver>) -> Result<(), String>;
    async fn upsert_packages(&self, packages: Vec<PackageInput>) -> Result<(), String>;
    async fn create_routes(&self, routes: Vec<Route>) -> Result<(), String>;
    async fn create_run(&self, run_id: RunId) -> Result<(), String>;
    async fn finalize_run(
        &self,
        run_id: RunId,
        status: RunStatus,
        metrics: Option<RunMetrics>,
        error: Option<String>,
    ) -> Result<(), String>;
    async fn recent_daily_stats(&self, driver_id: DriverId, days: u32) -> Result<Vec<DailyStats>, String>;
    async fn upsert_daily_stats(&self, stats: Vec<DailyStats>) -> Result<(), String>;
    async fn append_decision_log(&self, entry: DecisionLogEntry) -> Result<(), String>;
    async fn decision_log(&self, run_id: RunId) -> Result<Vec<DecisionLogEntry>, String>;
    async fn persist_assignments(
        &self,
        run_id: RunId,
        assignments: Vec<Assignment>,
        explanations: Vec<ExplanationPair>,
    ) -> Result<(), String>;
    async fn create_learning_episode(&self, episode: LearningEpisode) -> Result<(), String>;
    async fn load_recent_episodes(&self, window_days: u32) -> Result<Vec<LearningEpisode>, String>;
    async fn load_driver_model(&self, driver_id: DriverId) -> Result<Option<DriverEffortModel>, String>;
    async fn save_driver_model(
        &self,
        driver_id: DriverId,
        blob: Vec<u8>,
        metrics: DriverModelMetrics,
    ) -> Result<(), String>;
}

/// Geographic clustering of packages into routes. The core only requires
/// `num_routes <= num_drivers` and stable cluster ids; K-means-like
/// grouping is an acceptable implementation.
#[async_trait]
pub trait PackageClusterer: Send + Sync {
    async fn cluster(&self, packages: &[PackageInput], num_routes: usize) -> Result<Vec<Cluster>, String>;
}

/// Stop ordering and scalar distance. Road-graph routing is explicitly
/// out of scope; distances are consumed as scalars (§1 Non-goals).
#[async_trait]
pub trait StopOrderer: Send + Sync {
    async fn order(&self, packages: &[PackageInput], start: (f64, f64)) -> Vec<usize>;
    fn great_circle_km(&self, lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64;
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: Event);
}

/// Optional LLM post-processor. If disabled or failing, the templated
/// `driver_text` from the Explainer is used unchanged.
#[async_trait]
pub trait LlmPostprocessor: Send + Sync {
    async fn rewrite(&self, context: &str) -> Result<String, String>;
}

/// Great-circle haversine distance, lifted from the teacher's
/// `spatial::distance_km_between_cells_uncached` shape, minus the H3
/// cell-index conversion this crate has no use for (§0 ambient stack).
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1, lng1) = (lat1.to_radians(), lng1.to_radians());
    let (lat2, lng2) = (lat2.to_radians(), lng2.to_radians());
    let dlat = lat2 - lat1;
    let dlng = lng2 - lng1;
    let sin_dlat = (dlat * 0.5).sin();
    let sin_dlng = (dlng * 0.5).sin();
    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlng * sin_dlng;
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    6371.0 * c
}

pub mod reference {
    //! In-memory reference implementations, for the CLI demo and tests.

    use super::*;

    #[derive(Default)]
    pub struct InMemoryStore {
        inner: Mutex<InMemoryStoreState>,
    }

    #[derive(Default)]
    struct InMemoryStoreState {
        config: Option<FairnessConfig>,
        drivers: HashMap<DriverId, Driver>,
        packages: Vec<PackageInput>,
        routes: HashMap<RouteId, Route>,
        daily_stats: HashMap<DriverId, Vec<DailyStats>>,
        decision_log: HashMap<RunId, Vec<DecisionLogEntry>>,
        run_status: HashMap<RunId, RunStatus>,
        run_metrics: HashMap<RunId, RunMetrics>,
        assignments: HashMap<RunId, Vec<Assignment>>,
        explanations: HashMap<RunId, Vec<ExplanationPair>>,
        episodes: Vec<LearningEpisode>,
        driver_models: HashMap<DriverId, DriverEffortModel>,
    }

    impl InMemoryStore {
        pub fn new(config: FairnessConfig) -> Self {
            Self { inner: Mutex::new(InMemoryStoreState { config: Some(config), ..Default::default() }) }
        }
    }

    #[async_trait]
    impl Store for InMemoryStore {
        async fn active_fairness_config(&self) -> Result<Option<FairnessConfig>, String> {
            Ok(self.inner.lock().unwrap().config)
        }

        async fn upsert_drivers(&self, drivers: Vec<Driver>) -> Result<(), String> {
            let mut guard = self.inner.lock().unwrap();
            for driver in drivers {
                guard.drivers.insert(driver.id, driver);
            }
            Ok(())
        }

        async fn upsert_packages(&self, packages: Vec<PackageInput>) -> Result<(), String> {
            self.inner.lock().unwrap().packages.extend(packages);
            Ok(())
        }

        async fn create_routes(&self, routes: Vec<Route>) -> Result<(), String> {
            let mut guard = self.inner.lock().unwrap();
            for route in routes {
                guard.routes.insert(route.id, route);
            }
            Ok(())
        }

        async fn create_run(&self, run_id: RunId) -> Result<(), String> {
            self.inner.lock().unwrap().run_status.insert(run_id, RunStatus::Pending);
            Ok(())
        }

        async fn finalize_run(
            &self,
            run_id: RunId,
            status: RunStatus,
            metrics: Option<RunMetrics>,
            _error: Option<String>,
        ) -> Result<(), String> {
            let mut guard = self.inner.lock().unwrap();
            guard.run_status.insert(run_id, status);
            if let Some(metrics) = metrics {
                guard.run_metrics.insert(run_id, metrics);
            }
            Ok(())
        }

        async fn recent_daily_stats(&self, driver_id: DriverId, days: u32) -> Result<Vec<DailyStats>, String> {
            let guard = self.inner.lock().unwrap();
            let mut history = guard.daily_stats.get(&driver_id).cloned().unwrap_or_default();
            history.sort_by(|a, b| b.date.cmp(&a.date));
            history.truncate(days as usize);
            Ok(history)
        }

        async fn upsert_daily_stats(&self, stats: Vec<DailyStats>) -> Result<(), String> {
            let mut guard = self.inner.lock().unwrap();
            for stat in stats {
                guard.daily_stats.entry(stat.driver_id).or_default().push(stat);
            }
            Ok(())
        }

        async fn append_decision_log(&self, entry: DecisionLogEntry) -> Result<(), String> {
            self.inner.lock().unwrap().decision_log.entry(entry.run_id).or_default().push(entry);
            Ok(())
        }

        async fn decision_log(&self, run_id: RunId) -> Result<Vec<DecisionLogEntry>, String> {
            Ok(self.inner.lock().unwrap().decision_log.get(&run_id).cloned().unwrap_or_default())
        }

        async fn persist_assignments(
            &self,
            run_id: RunId,
            assignments: Vec<Assignment>,
            explanations: Vec<ExplanationPair>,
        ) -> Result<(), String> {
            let mut guard = self.inner.lock().unwrap();
            guard.assignments.insert(run_id, assignments);
            guard.explanations.insert(run_id, explanations);
            Ok(())
        }

        async fn create_learning_episode(&self, episode: LearningEpisode) -> Result<(), String> {
            self.inner.lock().unwrap().episodes.push(episode);
            Ok(())
        }

        async fn load_recent_episodes(&self, _window_days: u32) -> Result<Vec<LearningEpisode>, String> {
            Ok(self.inner.lock().unwrap().episodes.clone())
        }

        async fn load_driver_model(&self, driver_id: DriverId) -> Result<Option<DriverEffortModel>, String> {
            Ok(self.inner.lock().unwrap().driver_models.get(&driver_id).cloned())
        }

        async fn save_driver_model(
            &self,
            driver_id: DriverId,
            blob: Vec<u8>,
            metrics: DriverModelMetrics,
        ) -> Result<(), String> {
            let model = DriverEffortModel {
                version: metrics.version,
                feature_names: metrics.feature_names,
                payload_format: metrics.payload_format,
                payload_bytes: blob,
                training_mse: metrics.training_mse,
            };
            self.inner.lock().unwrap().driver_models.insert(driver_id, model);
            Ok(())
        }
    }

    /// Geographic K-means-like package clusterer (§6.1: "the core only
    /// requires `num_routes <= num_drivers` and stable cluster ids;
    /// K-means-like grouping is acceptable"). Seeds centroids by spreading
    /// them evenly over the package list, then runs a fixed number of
    /// Lloyd iterations over haversine distance.
    pub struct GeoKMeansClusterer {
        pub iterations: u32,
    }

    impl Default for GeoKMeansClusterer {
        fn default() -> Self {
            Self { iterations: 5 }
        }
    }

    #[async_trait]
    impl PackageClusterer for GeoKMeansClusterer {
        async fn cluster(&self, packages: &[PackageInput], num_routes: usize) -> Result<Vec<Cluster>, String> {
            if packages.is_empty() {
                return Ok(Vec::new());
            }
            let k = num_routes.max(1).min(packages.len());

            let stride = packages.len() as f64 / k as f64;
            let mut centroids: Vec<(f64, f64)> = (0..k)
                .map(|i| {
                    let p = &packages[((i as f64 * stride) as usize).min(packages.len() - 1)];
                    (p.lat, p.lng)
                })
                .collect();

            let mut assignment = vec![0usize; packages.len()];
            for _ in 0..self.iterations.max(1) {
                for (i, p) in packages.iter().enumerate() {
                    let (best, _) = centroids
                        .iter()
                        .enumerate()
                        .map(|(ci, &(clat, clng))| (ci, haversine_km(p.lat, p.lng, clat, clng)))
                        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
                        .unwrap();
                    assignment[i] = best;
                }

                for (ci, centroid) in centroids.iter_mut().enumerate() {
                    let members: Vec<&PackageInput> =
                        packages.iter().enumerate().filter(|(i, _)| assignment[*i] == ci).map(|(_, p)| p).collect();
                    if members.is_empty() {
                        continue;
                    }
                    let lat = members.iter().map(|p| p.lat).sum::<f64>() / members.len() as f64;
                    let lng = members.iter().map(|p| p.lng).sum::<f64>() / members.len() as f64;
                    *centroid = (lat, lng);
                }
            }

            let mut clusters: Vec<Cluster> = (0..k)
                .map(|i| Cluster { cluster_id: format!("cluster-{i}"), package_indices: Vec::new(), total_weight_kg: 0.0, num_stops: 0 })
                .collect();
            for (i, &ci) in assignment.iter().enumerate() {
                clusters[ci].package_indices.push(i);
                clusters[ci].total_weight_kg += packages[i].weight_kg;
                clusters[ci].num_stops += 1;
            }
            Ok(clusters.into_iter().filter(|c| !c.package_indices.is_empty()).collect())
        }
    }

    /// Nearest-neighbor stop ordering over haversine distance.
    pub struct HaversineStopOrderer;

    #[async_trait]
    impl StopOrderer for HaversineStopOrderer {
        async fn order(&self, packages: &[PackageInput], start: (f64, f64)) -> Vec<usize> {
            let mut remaining: Vec<usize> = (0..packages.len()).collect();
            let mut ordered = Vec::with_capacity(packages.len());
            let (mut cur_lat, mut cur_lng) = start;

            while !remaining.is_empty() {
                let (pos, &idx) = remaining
                    .iter()
                    .enumerate()
                    .min_by(|(_, &a), (_, &b)| {
                        let da = haversine_km(cur_lat, cur_lng, packages[a].lat, packages[a].lng);
                        let db = haversine_km(cur_lat, cur_lng, packages[b].lat, packages[b].lng);
                        da.partial_cmp(&db).unwrap()
                    })
                    .unwrap();
                ordered.push(idx);
                cur_lat = packages[idx].lat;
                cur_lng = packages[idx].lng;
                remaining.remove(pos);
            }
            ordered
        }

        fn great_circle_km(&self, lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
            haversine_km(lat1, lng1, lat2, lng2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn haversine_of_identical_points_is_zero() {
        assert!(haversine_km(12.97, 77.59, 12.97, 77.59) < 1e-9);
    }

    #[test]
    fn haversine_matches_known_distance_within_tolerance() {
        // Bengaluru to Chennai, roughly 290 km as the crow flies.
        let km = haversine_km(12.9716, 77.5946, 13.0827, 80.2707);
        assert!((km - 290.0).abs() < 15.0);
    }
}
