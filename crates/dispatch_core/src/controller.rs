//! §4.1 Run Controller — the single entry point that drives agents A–H
//! through one allocation run.
//!
//! Structurally this replaces the teacher's ECS driving loop
//! (`runner::run_until_empty` stepping a `bevy_ecs::Schedule` until its
//! event queue drains) with a straight-line `async fn run`: there is no
//! schedule to advance, only a fixed sequence of agent calls per run, so a
//! plain function body is the more honest fit. Each step is still wrapped
//! in a `tracing::info_span!` the way the teacher wraps its own systems.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{info, info_span, warn};

use crate::collaborators::{Cluster, EventSink, LlmPostprocessor, PackageClusterer, PackageInput, RunMetrics, Store};
use crate::config::FairnessConfig;
use crate::decision_log::DecisionLogEntry;
use crate::effort::{ev_adjustment, DriverEffortStats, EffortModel};
use crate::error::{CollaboratorError, DispatchError, NonFatalLearningError, ValidationError};
use crate::event_bus::{Event, EventState};
use crate::explainer::{ExplanationInput, Explainer};
use crate::fairness::{legacy_fairness_score, FairnessEvaluator};
use crate::learning::bandit::{hash_config, load_priors};
use crate::learning::LearningAgent;
use crate::liaison::{Alternative, DriverLiaison};
use crate::model::{
    Assignment, AssignmentProposal, DailyStats, Driver, DriverContext, DriverId, EffortMatrix, ExplanationPair,
    FairnessStatus, LiaisonVerdict, Route, RouteId, RunId, RunStatus,
};
use crate::planner::RoutePlanner;
use crate::resolver::FinalResolver;

const KNOWN_LANGUAGE_TAGS: [&str; 5] = ["en", "ta", "hi", "te", "kn"];
const VALID_PRIORITY_RANGE: std::ops::RangeInclusive<i32> = 0..=2;

// ── workload formulas (original_source app/services/workload.py,
// constants from app/config.py); no counterpart lives in the teacher, so
// these follow the source exactly rather than inventing a shape. ──
const DIFFICULTY_BASE: f64 = 1.0;
const DIFFICULTY_WEIGHT_PER_KG: f64 = 0.01;
const DIFFICULTY_WEIGHT_PER_STOP: f64 = 0.1;
const BASE_ROUTE_TIME_MINUTES: f64 = 30.0;
const TIME_PER_PACKAGE_MINUTES: f64 = 5.0;
const TIME_PER_STOP_MINUTES: f64 = 3.0;
const AVG_SPEED_KMH: f64 = 30.0;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn route_difficulty(total_weight_kg: f64, num_stops: u32, avg_fragility: f64) -> f64 {
    let mut difficulty = DIFFICULTY_BASE;
    difficulty += total_weight_kg * DIFFICULTY_WEIGHT_PER_KG;
    difficulty += num_stops as f64 * DIFFICULTY_WEIGHT_PER_STOP;
    difficulty *= 1.0 + (avg_fragility - 1.0) * 0.1;
    round2(difficulty)
}

fn estimate_route_time(num_packages: u32, num_stops: u32, total_distance_km: f64) -> f64 {
    let mut minutes = BASE_ROUTE_TIME_MINUTES;
    minutes += num_packages as f64 * TIME_PER_PACKAGE_MINUTES;
    minutes += num_stops as f64 * TIME_PER_STOP_MINUTES;
    if total_distance_km > 0.0 {
        minutes += (total_distance_km / AVG_SPEED_KMH) * 60.0;
    }
    minutes.round()
}

#[derive(Debug, Clone)]
pub struct WarehouseCoordinate {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone)]
pub struct DriverInput {
    pub id: DriverId,
    pub external_id: Option<String>,
    pub name: String,
    pub vehicle_capacity_kg: f64,
    pub vehicle_kind: crate::model::VehicleKind,
    pub battery_range_km: Option<f64>,
    pub charging_time_minutes: Option<f64>,
    pub preferred_language: String,
}

/// One allocation-run request (§6.2). `packages` and `drivers` are
/// materialized by the caller; this core never reads a package or driver
/// store directly.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub drivers: Vec<DriverInput>,
    pub packages: Vec<PackageInput>,
    pub warehouse: WarehouseCoordinate,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct AssignmentView {
    pub driver_id: DriverId,
    pub driver_external_id: Option<String>,
    pub driver_name: String,
    pub route_id: RouteId,
    pub workload_score: f64,
    pub fairness_score: f64,
    pub route_summary: String,
    pub explanation: ExplanationPair,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GlobalFairness {
    pub avg_effort: f64,
    pub std_dev: f64,
    pub gini: f64,
    pub max_gap: f64,
    pub status: FairnessStatus,
    pub reoptimized: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RunResponse {
    pub run_id: RunId,
    pub assignments: Vec<AssignmentView>,
    pub fairness: GlobalFairness,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TimelineEntry {
    pub timestamp: chrono::DateTime<Utc>,
    pub agent_name: String,
    pub step_type: String,
    pub short_message: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct Timeline {
    pub run_id: RunId,
    pub entries: Vec<TimelineEntry>,
}

fn validate_request(request: &RunRequest) -> Result<(), ValidationError> {
    if request.drivers.is_empty() {
        return Err(ValidationError::EmptyDrivers);
    }
    if request.packages.is_empty() {
        return Err(ValidationError::EmptyPackages);
    }
    for package in &request.packages {
        if !VALID_PRIORITY_RANGE.contains(&package.priority) {
            return Err(ValidationError::InvalidPriority(package.priority));
        }
    }
    for driver in &request.drivers {
        if !KNOWN_LANGUAGE_TAGS.contains(&driver.preferred_language.as_str()) {
            return Err(ValidationError::InvalidLanguageTag(driver.preferred_language.clone()));
        }
    }
    Ok(())
}

/// Wires the eight agents and the cross-cutting services (§5) behind a
/// single `run` entry point. Collaborators are injected as trait objects
/// at construction, the way the teacher injects `Box<dyn MatchingAlgorithm>`
/// into its matching pipeline.
pub struct RunController {
    store: Arc<dyn Store>,
    clusterer: Arc<dyn PackageClusterer>,
    stop_orderer: Arc<dyn crate::collaborators::StopOrderer>,
    event_sink: Arc<dyn EventSink>,
    llm: Option<Arc<dyn LlmPostprocessor>>,

    planner: RoutePlanner,
    fairness: FairnessEvaluator,
    liaison: DriverLiaison,
    resolver: FinalResolver,
    explainer: Explainer,
    recovery: crate::recovery::RecoveryBookkeeper,
    learning: LearningAgent,
}

impl RunController {
    pub fn new(
        store: Arc<dyn Store>,
        clusterer: Arc<dyn PackageClusterer>,
        stop_orderer: Arc<dyn crate::collaborators::StopOrderer>,
        event_sink: Arc<dyn EventSink>,
        llm: Option<Arc<dyn LlmPostprocessor>>,
    ) -> Self {
        Self {
            store,
            clusterer,
            stop_orderer,
            event_sink,
            llm,
            planner: RoutePlanner::new(),
            fairness: FairnessEvaluator::new(),
            liaison: DriverLiaison::new(),
            resolver: FinalResolver::new(),
            explainer: Explainer::new(),
            recovery: crate::recovery::RecoveryBookkeeper::new(),
            learning: LearningAgent::new(),
        }
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunResponse, DispatchError> {
        validate_request(&request)?;

        let run_id = RunId::new();
        let span = info_span!("allocation_run", run_id = %run_id);
        let _guard = span.enter();

        self.store.create_run(run_id).await.map_err(CollaboratorError::new)?;

        match self.run_inner(run_id, &request).await {
            Ok(response) => {
                let metrics = RunMetrics {
                    avg_effort: response.fairness.avg_effort,
                    std_dev: response.fairness.std_dev,
                    gini: response.fairness.gini,
                    max_gap: response.fairness.max_gap,
                    num_assignments: response.assignments.len(),
                };
                self.store
                    .finalize_run(run_id, RunStatus::Success, Some(metrics), None)
                    .await
                    .map_err(CollaboratorError::new)?;
                Ok(response)
            }
            Err(err) => {
                let message = err.truncated_message();
                if let Err(finalize_err) =
                    self.store.finalize_run(run_id, RunStatus::Failed, None, Some(message)).await
                {
                    warn!(run_id = %run_id, error = %finalize_err, "failed to persist run failure");
                }
                self.publish_state(run_id, "RUN_CONTROLLER", "RUN_FAILED", EventState::Error).await;
                Err(err)
            }
        }
    }

    async fn run_inner(&self, run_id: RunId, request: &RunRequest) -> Result<RunResponse, DispatchError> {
        let config = self.store.active_fairness_config().await.map_err(CollaboratorError::new)?.unwrap_or_default();

        let drivers: Vec<Driver> = request
            .drivers
            .iter()
            .map(|d| Driver {
                id: d.id,
                external_id: d.external_id.clone(),
                name: d.name.clone(),
                vehicle_capacity_kg: d.vehicle_capacity_kg,
                vehicle_kind: d.vehicle_kind,
                battery_range_km: d.battery_range_km,
                charging_time_minutes: d.charging_time_minutes,
                preferred_language: d.preferred_language.clone(),
            })
            .collect();
        let drivers_by_id: HashMap<DriverId, &DriverInput> = request.drivers.iter().map(|d| (d.id, d)).collect();

        // Step 1: materialize Driver and Route rows via the Store.
        self.store.upsert_drivers(drivers.clone()).await.map_err(CollaboratorError::new)?;
        self.store.upsert_packages(request.packages.clone()).await.map_err(CollaboratorError::new)?;

        let num_routes = drivers.len().min(request.packages.len()).max(1);
        let clusters = self
            .clusterer
            .cluster(&request.packages, num_routes)
            .await
            .map_err(CollaboratorError::new)?;
        let routes = self
            .build_routes(
                (request.warehouse.lat, request.warehouse.lng),
                &request.packages,
                clusters,
            )
            .await;
        self.store.create_routes(routes.clone()).await.map_err(CollaboratorError::new)?;

        // Per-driver history: last 7 days feeds recovery targets, liaison
        // context, and the effort regressor's fatigue/workload features.
        let mut history: HashMap<DriverId, Vec<DailyStats>> = HashMap::new();
        for driver in &drivers {
            let recent = self.store.recent_daily_stats(driver.id, 7).await.map_err(CollaboratorError::new)?;
            history.insert(driver.id, recent);
        }
        let driver_contexts: HashMap<DriverId, DriverContext> =
            drivers.iter().map(|d| (d.id, context_from_history(&history[&d.id]))).collect();

        // Agent A: effort matrix. `fatigue_level` is agent A's own raw
        // input (original_source ml_effort_agent.py's `driver_stats.get
        // ("fatigue_level", 0)`), distinct from the liaison's
        // `fatigue_score` — no history means no fatigue signal yet.
        let driver_stats: HashMap<DriverId, DriverEffortStats> = drivers
            .iter()
            .map(|d| {
                let stats = if history[&d.id].is_empty() {
                    DriverEffortStats::default()
                } else {
                    DriverEffortStats { fatigue_level: driver_contexts[&d.id].recent_hard_days as f64 }
                };
                (d.id, stats)
            })
            .collect();
        let ev_config = config.ev_config();
        let effort_model = EffortModel::new(config.effort_weights());
        let effort = effort_model.compute_effort_matrix(&drivers, &routes, &driver_stats, &ev_config);
        self.record_step(
            run_id,
            "ML_EFFORT",
            "MATRIX_GENERATION",
            json!({"num_drivers": drivers.len(), "num_routes": routes.len()}),
            json!({
                "num_drivers": drivers.len(),
                "num_routes": routes.len(),
                "stats": &effort.stats,
            }),
        )
        .await?;

        // Service G (recovery targets): computed before agent B so the
        // first proposal already accounts for hard-debt drivers.
        let recovery_targets = self.recovery.recovery_targets(&history, &config);
        let targets: HashMap<DriverId, f64> =
            recovery_targets.iter().filter_map(|(&id, &t)| t.map(|v| (id, v))).collect();
        self.record_step(
            run_id,
            "RECOVERY_BOOKKEEPER",
            "RECOVERY_TARGETS",
            json!({}),
            json!({"num_targets": targets.len()}),
        )
        .await?;

        // Agent B, proposal 1.
        let no_penalties = HashMap::new();
        let proposal_1 = self
            .planner
            .plan(&effort, &no_penalties, &targets, config.recovery_penalty_weight)?;
        self.record_step(
            run_id,
            "ROUTE_PLANNER",
            "PROPOSAL_1",
            json!({}),
            json!({"total_effort": proposal_1.total_effort()}),
        )
        .await?;

        // Agent C, check 1.
        let report_1 = self.fairness.evaluate(&proposal_1, &config);
        self.record_step(
            run_id,
            "FAIRNESS_MANAGER",
            "FAIRNESS_CHECK_PROPOSAL_1",
            json!({}),
            json!({"status": report_1.status, "gini": report_1.gini, "std_dev": report_1.std_dev}),
        )
        .await?;

        // One re-optimization round (B→C→B→C) when proposal 1 is rejected
        // and the evaluator actually named drivers to penalize.
        let recommendations = report_1.recommendations.clone().unwrap_or_default();
        let (chosen_proposal, chosen_report, reoptimized) =
            if report_1.status == FairnessStatus::Reoptimize && !recommendations.ids_to_penalize.is_empty() {
                let penalties = RoutePlanner::penalties_from_recommendations(&effort.driver_ids, &recommendations);
                let proposal_2 = self.planner.plan(&effort, &penalties, &targets, config.recovery_penalty_weight)?;
                self.record_step(
                    run_id,
                    "ROUTE_PLANNER",
                    "PROPOSAL_2",
                    json!({"penalty_factor": recommendations.penalty_factor}),
                    json!({"total_effort": proposal_2.total_effort()}),
                )
                .await?;

                let report_2 = self.fairness.evaluate(&proposal_2, &config);
                self.record_step(
                    run_id,
                    "FAIRNESS_MANAGER",
                    "FAIRNESS_CHECK_PROPOSAL_2",
                    json!({}),
                    json!({"status": report_2.status, "gini": report_2.gini, "std_dev": report_2.std_dev}),
                )
                .await?;

                // Proposal 2 is kept iff gini(p2) <= gini(p1) OR max_gap(p2)
                // < max_gap(p1); otherwise proposal 1 is kept (invariant 6).
                if report_2.gini <= report_1.gini || report_2.max_gap < report_1.max_gap {
                    (proposal_2, report_2, true)
                } else {
                    (proposal_1, report_1, false)
                }
            } else {
                (proposal_1, report_1, false)
            };

        // Agent D: one liaison decision per driver in the chosen proposal.
        let ranks = DriverLiaison::rank_drivers(&chosen_proposal.per_driver_efforts());
        let mut decisions = Vec::with_capacity(chosen_proposal.assignments.len());
        for assignment in &chosen_proposal.assignments {
            let context = &driver_contexts[&assignment.driver_id];
            let alternatives = alternatives_for(&effort, assignment.driver_id, assignment.route_id);
            let rank = ranks.get(&assignment.driver_id).copied().unwrap_or(chosen_proposal.assignments.len());
            let decision = self.liaison.decide(
                assignment.driver_id,
                assignment.effort,
                context,
                chosen_report.avg_effort,
                chosen_report.std_dev,
                rank,
                &alternatives,
            );
            decisions.push(decision);
        }
        self.record_step(
            run_id,
            "DRIVER_LIAISON",
            "LIAISON_DECISIONS",
            json!({}),
            json!({
                "num_counter": decisions.iter().filter(|d| d.verdict == LiaisonVerdict::Counter).count(),
                "num_force_accept": decisions.iter().filter(|d| d.verdict == LiaisonVerdict::ForceAccept).count(),
            }),
        )
        .await?;

        // Agent E: resolve COUNTER verdicts into bounded swaps.
        let outcome = self.resolver.resolve(&chosen_proposal, &decisions, &effort);
        self.record_step(
            run_id,
            "FINAL_RESOLVER",
            "SWAP_RESOLUTION",
            json!({}),
            json!({"num_swaps": outcome.swaps.len(), "num_unfulfilled": outcome.unfulfilled_counters.len()}),
        )
        .await?;

        let final_assignments: Vec<Assignment> = outcome
            .current_routes
            .iter()
            .map(|(&driver_id, &route_id)| Assignment {
                driver_id,
                route_id,
                effort: outcome.current_efforts[&driver_id],
            })
            .collect();
        let final_proposal = AssignmentProposal { assignments: final_assignments.clone() };
        let final_report = self.fairness.evaluate(&final_proposal, &config);

        let swapped_drivers: std::collections::HashSet<DriverId> =
            outcome.swaps.iter().flat_map(|s| [s.driver_a, s.driver_b]).collect();
        let final_ranks = DriverLiaison::rank_drivers(&outcome.current_efforts);
        let routes_by_id: HashMap<RouteId, &Route> = routes.iter().map(|r| (r.id, r)).collect();

        let mut driver_models = HashMap::new();
        for driver in &drivers {
            if let Some(model) = self.store.load_driver_model(driver.id).await.map_err(CollaboratorError::new)? {
                driver_models.insert(driver.id, model);
            }
        }

        // Agent F: per-driver + admin explanations.
        let mut assignments_out = Vec::with_capacity(final_assignments.len());
        for assignment in &final_assignments {
            let driver_ref = drivers_by_id[&assignment.driver_id];
            let route = routes_by_id[&assignment.route_id];
            let di = effort.driver_index(assignment.driver_id);
            let ri = effort.route_index(assignment.route_id);
            let breakdown = match (di, ri) {
                (Some(di), Some(ri)) => Some(effort.breakdown[di][ri]),
                _ => None,
            };
            let ev_overhead = drivers
                .iter()
                .find(|d| d.id == assignment.driver_id)
                .map(|d| ev_adjustment(d, route, &ev_config).1);
            let context = &driver_contexts[&assignment.driver_id];
            let model = driver_models.get(&assignment.driver_id);

            let input = ExplanationInput {
                driver_id: assignment.driver_id,
                driver_name: &driver_ref.name,
                effort: assignment.effort,
                avg_effort: final_report.avg_effort,
                rank: final_ranks.get(&assignment.driver_id).copied().unwrap_or(1),
                num_drivers: drivers.len(),
                breakdown,
                gini: final_report.gini,
                std_dev: final_report.std_dev,
                max_gap: final_report.max_gap,
                num_packages: route.num_packages,
                total_weight_kg: route.total_weight_kg,
                num_stops: route.num_stops,
                estimated_time_minutes: route.estimated_time_minutes,
                is_recovery_day: recovery_targets.get(&assignment.driver_id).copied().flatten().is_some(),
                recovery_hard_days: context.recent_hard_days,
                swap_applied: swapped_drivers.contains(&assignment.driver_id),
                liaison_verdict: decisions
                    .iter()
                    .find(|d| d.driver_id == assignment.driver_id)
                    .map(|d| d.verdict)
                    .unwrap_or(LiaisonVerdict::Accept),
                ev_overhead,
                complexity_debt: if context.complexity_debt > 0.0 { Some(context.complexity_debt) } else { None },
                personalized_model_version: model.map(|m| m.version),
                personalized_model_mse: model.map(|m| m.training_mse),
                history_hard_days_last_7: context.recent_hard_days,
                manual_override: false,
            };
            let explanation = self.explainer.explain(&input);

            assignments_out.push(AssignmentView {
                driver_id: assignment.driver_id,
                driver_external_id: driver_ref.external_id.clone(),
                driver_name: driver_ref.name.clone(),
                route_id: assignment.route_id,
                workload_score: assignment.effort,
                fairness_score: legacy_fairness_score(assignment.effort, final_report.avg_effort),
                route_summary: format!(
                    "{} packages, {:.1} kg, {} stops, {:.0} min",
                    route.num_packages, route.total_weight_kg, route.num_stops, route.estimated_time_minutes
                ),
                explanation,
            });
        }

        if let Some(llm) = &self.llm {
            for view in &mut assignments_out {
                if let Ok(rewritten) = llm.rewrite(&view.explanation.driver_text).await {
                    view.explanation.driver_text = rewritten;
                }
            }
        }

        self.record_step(
            run_id,
            "EXPLAINABILITY",
            "EXPLANATIONS_GENERATED",
            json!({}),
            json!({"num_explanations": assignments_out.len()}),
        )
        .await?;

        // Step 5: persist the chosen proposal as Assignments plus the two
        // explanation texts per driver.
        let explanations: Vec<ExplanationPair> = assignments_out.iter().map(|a| a.explanation.clone()).collect();
        self.store
            .persist_assignments(run_id, final_assignments.clone(), explanations)
            .await
            .map_err(CollaboratorError::new)?;

        // Service G: persist today's daily stats from the final proposal.
        let previous: HashMap<DriverId, DailyStats> = history
            .iter()
            .filter_map(|(&id, stats)| stats.first().cloned().map(|s| (id, s)))
            .collect();
        let daily_stats = self.recovery.update_daily_stats(run_id, request.date, &final_proposal, &previous, &config);
        self.store.upsert_daily_stats(daily_stats).await.map_err(CollaboratorError::new)?;
        self.record_step(
            run_id,
            "RECOVERY_BOOKKEEPER",
            "DAILY_STATS_UPDATED",
            json!({}),
            json!({"num_drivers": drivers.len()}),
        )
        .await?;

        let response = RunResponse {
            run_id,
            assignments: assignments_out,
            fairness: GlobalFairness {
                avg_effort: final_report.avg_effort,
                std_dev: final_report.std_dev,
                gini: final_report.gini,
                max_gap: final_report.max_gap,
                status: final_report.status,
                reoptimized,
            },
        };

        // Service H: learning episode creation is non-fatal — a failure
        // here never turns a successful run into a failed one (§4.9).
        if let Err(err) = self.create_learning_episode(run_id, &config, drivers.len(), routes.len()).await {
            warn!(run_id = %run_id, error = %err, "learning episode creation failed; run still succeeds");
        }

        Ok(response)
    }

    async fn build_routes(&self, warehouse: (f64, f64), packages: &[PackageInput], clusters: Vec<Cluster>) -> Vec<Route> {
        let mut routes = Vec::with_capacity(clusters.len());
        for cluster in clusters {
            let members: Vec<PackageInput> = cluster.package_indices.iter().map(|&i| packages[i].clone()).collect();
            let ordered = self.stop_orderer.order(&members, warehouse).await;

            let mut total_distance = 0.0;
            let mut cur = warehouse;
            for &idx in &ordered {
                let p = &members[idx];
                total_distance += self.stop_orderer.great_circle_km(cur.0, cur.1, p.lat, p.lng);
                cur = (p.lat, p.lng);
            }

            let avg_fragility = if members.is_empty() {
                1.0
            } else {
                members.iter().map(|p| p.fragility_level as f64).sum::<f64>() / members.len() as f64
            };
            let difficulty = route_difficulty(cluster.total_weight_kg, cluster.num_stops, avg_fragility);
            let time = estimate_route_time(members.len() as u32, cluster.num_stops, total_distance);

            routes.push(Route {
                id: RouteId::new(),
                cluster_id: cluster.cluster_id,
                num_packages: members.len() as u32,
                total_weight_kg: cluster.total_weight_kg,
                num_stops: cluster.num_stops,
                route_difficulty_score: difficulty.max(1.0),
                estimated_time_minutes: time,
                total_distance_km: Some(round2(total_distance)),
            });
        }
        routes
    }

    async fn create_learning_episode(
        &self,
        run_id: RunId,
        config: &FairnessConfig,
        num_drivers: usize,
        num_routes: usize,
    ) -> Result<(), NonFatalLearningError> {
        let episodes =
            self.store.load_recent_episodes(30).await.map_err(NonFatalLearningError::BanditSelection)?;
        let arms_len = crate::learning::bandit::arm_space().len();
        let pairs: Vec<(usize, f64)> = episodes
            .iter()
            .filter(|e| e.arm_index >= 0)
            .filter_map(|e| e.episode_reward.map(|r| (e.arm_index as usize, r)))
            .collect();
        let priors = load_priors(arms_len, &pairs);

        let mut rng = rand::thread_rng();
        let episode =
            self.learning.create_episode(run_id, config, num_drivers, num_routes, &priors, &mut rng);
        self.store
            .create_learning_episode(episode)
            .await
            .map_err(NonFatalLearningError::EpisodePersistence)?;

        self.record_step(
            run_id,
            "LEARNING_AGENT",
            "EPISODE_CREATED",
            json!({}),
            json!({"config_hash": hash_config(config)}),
        )
        .await
        .map_err(|e| NonFatalLearningError::EpisodePersistence(e.message))?;
        Ok(())
    }

    async fn record_step(
        &self,
        run_id: RunId,
        agent_name: &str,
        step_type: &str,
        input: serde_json::Value,
        output: serde_json::Value,
    ) -> Result<(), CollaboratorError> {
        let entry = DecisionLogEntry::new(run_id, agent_name, step_type, input, output.clone());
        info!(run_id = %run_id, agent = agent_name, step = step_type, "{}", entry.short_message());
        self.store.append_decision_log(entry).await.map_err(CollaboratorError::new)?;
        self.event_sink
            .publish(Event {
                run_id,
                agent_name: agent_name.to_string(),
                step_type: step_type.to_string(),
                state: EventState::Completed,
                timestamp: Utc::now(),
                payload: output,
            })
            .await;
        Ok(())
    }

    async fn publish_state(&self, run_id: RunId, agent_name: &str, step_type: &str, state: EventState) {
        self.event_sink
            .publish(Event {
                run_id,
                agent_name: agent_name.to_string(),
                step_type: step_type.to_string(),
                state,
                timestamp: Utc::now(),
                payload: serde_json::Value::Null,
            })
            .await;
    }

    /// Decision-log timeline for a run (§6.2). Run-level metadata beyond
    /// the log entries themselves is not exposed here: `Store` has no
    /// "describe run" read, only decision-log and daily-stats reads.
    pub async fn timeline(&self, run_id: RunId) -> Result<Timeline, DispatchError> {
        let log = self.store.decision_log(run_id).await.map_err(CollaboratorError::new)?;
        let entries = log
            .iter()
            .map(|entry| TimelineEntry {
                timestamp: entry.timestamp,
                agent_name: entry.agent_name.clone(),
                step_type: entry.step_type.clone(),
                short_message: entry.short_message(),
            })
            .collect();
        Ok(Timeline { run_id, entries })
    }
}

fn context_from_history(history: &[DailyStats]) -> DriverContext {
    if history.is_empty() {
        return DriverContext::default();
    }
    let efforts: Vec<f64> = history.iter().filter_map(|s| s.actual_effort).collect();
    let (avg, std, ..) = crate::fairness::fairness_stats(&efforts);
    let recent_hard_days = history.iter().filter(|s| s.is_hard_day).count() as u32;
    let fatigue_score = 1.0 + recent_hard_days as f64;
    DriverContext {
        recent_avg_effort: avg,
        recent_std_effort: std,
        recent_hard_days,
        fatigue_score,
        complexity_debt: history[0].complexity_debt,
        preferences: HashMap::new(),
    }
}

fn alternatives_for(effort: &EffortMatrix, driver_id: DriverId, current_route: RouteId) -> Vec<Alternative> {
    let Some(di) = effort.driver_index(driver_id) else {
        return Vec::new();
    };
    effort
        .route_ids
        .iter()
        .enumerate()
        .filter_map(|(ri, &route_id)| {
            if route_id == current_route || effort.is_infeasible(driver_id, route_id) {
                return None;
            }
            Some(Alternative { route_id, effort: effort.matrix[di][ri] })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::reference::{HaversineStopOrderer, InMemoryStore};
    use crate::model::VehicleKind;
    use async_trait::async_trait;

    struct SingleClusterer;

    #[async_trait]
    impl PackageClusterer for SingleClusterer {
        async fn cluster(&self, packages: &[PackageInput], num_routes: usize) -> Result<Vec<Cluster>, String> {
            let chunk_size = (packages.len() + num_routes - 1) / num_routes.max(1);
            let mut clusters = Vec::new();
            for (i, chunk) in packages.chunks(chunk_size.max(1)).enumerate() {
                let indices: Vec<usize> = (0..chunk.len()).map(|j| i * chunk_size + j).collect();
                clusters.push(Cluster {
                    cluster_id: format!("cluster-{i}"),
                    total_weight_kg: chunk.iter().map(|p| p.weight_kg).sum(),
                    num_stops: chunk.len() as u32,
                    package_indices: indices,
                });
            }
            Ok(clusters)
        }
    }

    fn sample_request() -> RunRequest {
        let drivers = vec![
            DriverInput {
                id: DriverId::new(),
                external_id: Some("D1".into()),
                name: "Asha".into(),
                vehicle_capacity_kg: 100.0,
                vehicle_kind: VehicleKind::Combustion,
                battery_range_km: None,
                charging_time_minutes: None,
                preferred_language: "en".into(),
            },
            DriverInput {
                id: DriverId::new(),
                external_id: Some("D2".into()),
                name: "Ravi".into(),
                vehicle_capacity_kg: 100.0,
                vehicle_kind: VehicleKind::Combustion,
                battery_range_km: None,
                charging_time_minutes: None,
                preferred_language: "hi".into(),
            },
        ];
        let packages = (0..8)
            .map(|i| PackageInput {
                weight_kg: 5.0,
                lat: 12.97 + i as f64 * 0.01,
                lng: 77.59 + i as f64 * 0.01,
                fragility_level: 1,
                priority: 0,
            })
            .collect();
        RunRequest {
            drivers,
            packages,
            warehouse: WarehouseCoordinate { lat: 12.97, lng: 77.59 },
            date: NaiveDate::from_ymd_opt(2026, 7, 28).unwrap(),
        }
    }

    fn test_controller() -> RunController {
        RunController::new(
            Arc::new(InMemoryStore::new(FairnessConfig::default())),
            Arc::new(SingleClusterer),
            Arc::new(HaversineStopOrderer),
            Arc::new(crate::event_bus::EventBus::new()),
            None,
        )
    }

    #[tokio::test]
    async fn empty_drivers_are_rejected_before_a_run_is_created() {
        let controller = test_controller();
        let mut request = sample_request();
        request.drivers.clear();
        let err = controller.run(request).await.unwrap_err();
        assert!(matches!(err, DispatchError::Validation(ValidationError::EmptyDrivers)));
    }

    #[tokio::test]
    async fn a_valid_request_produces_one_assignment_per_driver() {
        let controller = test_controller();
        let request = sample_request();
        let num_drivers = request.drivers.len();
        let response = controller.run(request).await.unwrap();
        assert_eq!(response.assignments.len(), num_drivers);
        let routes: std::collections::HashSet<_> = response.assignments.iter().map(|a| a.route_id).collect();
        assert_eq!(routes.len(), num_drivers);
    }

    #[tokio::test]
    async fn timeline_reports_entries_in_fixed_agent_order() {
        let controller = test_controller();
        let request = sample_request();
        let response = controller.run(request).await.unwrap();
        let timeline = controller.timeline(response.run_id).await.unwrap();
        assert!(!timeline.entries.is_empty());
        assert_eq!(timeline.entries[0].agent_name, "ML_EFFORT");
    }
}
