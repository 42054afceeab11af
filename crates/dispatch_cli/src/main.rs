//! Developer-facing CLI for the dispatch core, grounded on the teacher's
//! `xtask` (the workspace's single operator-facing binary): where `xtask`
//! drives the simulation crate through `cargo run --example`, this binary
//! drives the allocation pipeline directly via `dispatch_core`'s public API.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use dispatch_core::collaborators::reference::{GeoKMeansClusterer, HaversineStopOrderer, InMemoryStore};
use dispatch_core::collaborators::PackageInput;
use dispatch_core::config::FairnessConfig;
use dispatch_core::controller::{DriverInput, RunController, RunRequest, WarehouseCoordinate};
use dispatch_core::event_bus::EventBus;
use dispatch_core::learning::regressor::{self, TrainingRow};
use dispatch_core::model::VehicleKind;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser)]
#[command(
    name = "dispatch-cli",
    about = "Drives the fair route-allocation core end to end",
    long_about = "A small CLI for exercising the allocation pipeline: generates a \
                  synthetic driver/package scenario, runs it through the eight-agent \
                  core, and prints the resulting assignments, fairness report, and \
                  decision timeline."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one allocation over a synthetic scenario
    Run {
        /// Number of drivers to generate
        #[arg(long, default_value_t = 6)]
        drivers: usize,
        /// Number of packages to generate
        #[arg(long, default_value_t = 40)]
        packages: usize,
        /// Fraction of drivers (0.0-1.0) assigned an electric vehicle
        #[arg(long, default_value_t = 0.2)]
        ev_fraction: f64,
        /// Enable recovery mode in the active fairness config
        #[arg(long, default_value_t = false)]
        recovery_mode: bool,
        /// Allocation date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
        /// Warehouse latitude
        #[arg(long, default_value_t = 12.9716)]
        warehouse_lat: f64,
        /// Warehouse longitude
        #[arg(long, default_value_t = 77.5946)]
        warehouse_lng: f64,
        /// RNG seed for scenario generation
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Also print the run's decision-log timeline
        #[arg(long, default_value_t = false)]
        timeline: bool,
        /// Pretty-print the JSON output
        #[arg(long, default_value_t = true)]
        pretty: bool,
    },
    /// Train a per-driver effort regressor over a synthetic history
    Train {
        /// Number of synthetic daily-stats rows to generate
        #[arg(long, default_value_t = 30)]
        samples: usize,
        /// RNG seed for synthetic history generation
        #[arg(long, default_value_t = 7)]
        seed: u64,
    },
}

const LANGUAGE_TAGS: [&str; 5] = ["en", "ta", "hi", "te", "kn"];

fn synth_drivers(count: usize, ev_fraction: f64, rng: &mut impl Rng) -> Vec<DriverInput> {
    (0..count)
        .map(|i| {
            let is_ev = rng.gen_bool(ev_fraction.clamp(0.0, 1.0));
            let vehicle_kind = if is_ev { VehicleKind::Electric } else { VehicleKind::Combustion };
            DriverInput {
                id: dispatch_core::model::DriverId::new(),
                external_id: Some(format!("D{i:03}")),
                name: format!("Driver {i}"),
                vehicle_capacity_kg: rng.gen_range(80.0..150.0),
                vehicle_kind,
                battery_range_km: if is_ev { Some(rng.gen_range(60.0..180.0)) } else { None },
                charging_time_minutes: if is_ev { Some(rng.gen_range(20.0..90.0)) } else { None },
                preferred_language: LANGUAGE_TAGS[i % LANGUAGE_TAGS.len()].to_string(),
            }
        })
        .collect()
}

fn synth_packages(count: usize, warehouse: (f64, f64), rng: &mut impl Rng) -> Vec<PackageInput> {
    (0..count)
        .map(|_| {
            let lat_jitter = rng.gen_range(-0.15..0.15);
            let lng_jitter = rng.gen_range(-0.15..0.15);
            PackageInput {
                weight_kg: rng.gen_range(0.5..25.0),
                lat: warehouse.0 + lat_jitter,
                lng: warehouse.1 + lng_jitter,
                fragility_level: rng.gen_range(1..=5),
                priority: rng.gen_range(0..=2),
            }
        })
        .collect()
}

async fn run_scenario(
    num_drivers: usize,
    num_packages: usize,
    ev_fraction: f64,
    recovery_mode: bool,
    date: Option<String>,
    warehouse_lat: f64,
    warehouse_lng: f64,
    seed: u64,
    show_timeline: bool,
    pretty: bool,
) {
    let mut rng = StdRng::seed_from_u64(seed);

    let warehouse = (warehouse_lat, warehouse_lng);
    let drivers = synth_drivers(num_drivers, ev_fraction, &mut rng);
    let packages = synth_packages(num_packages, warehouse, &mut rng);
    let date = match date {
        Some(s) => chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d").unwrap_or_else(|_| {
            eprintln!("warning: could not parse --date '{s}', falling back to today");
            chrono::Utc::now().date_naive()
        }),
        None => chrono::Utc::now().date_naive(),
    };

    let config = FairnessConfig { recovery_mode_enabled: recovery_mode, ..FairnessConfig::default() };
    let controller = RunController::new(
        Arc::new(InMemoryStore::new(config)),
        Arc::new(GeoKMeansClusterer::default()),
        Arc::new(HaversineStopOrderer),
        Arc::new(EventBus::new()),
        None,
    );

    let request = RunRequest {
        drivers,
        packages,
        warehouse: WarehouseCoordinate { lat: warehouse_lat, lng: warehouse_lng },
        date,
    };

    match controller.run(request).await {
        Ok(response) => {
            let body = if pretty {
                serde_json::to_string_pretty(&response)
            } else {
                serde_json::to_string(&response)
            };
            println!("{}", body.unwrap_or_else(|e| format!("{{\"error\": \"serialize failed: {e}\"}}")));

            if show_timeline {
                match controller.timeline(response.run_id).await {
                    Ok(timeline) => {
                        eprintln!("\n=== decision timeline ({} entries) ===", timeline.entries.len());
                        for entry in &timeline.entries {
                            eprintln!(
                                "[{}] {}/{}: {}",
                                entry.timestamp.to_rfc3339(),
                                entry.agent_name,
                                entry.step_type,
                                entry.short_message
                            );
                        }
                    }
                    Err(err) => eprintln!("failed to load timeline: {err}"),
                }
            }
        }
        Err(err) => {
            eprintln!("run failed: {err}");
            std::process::exit(1);
        }
    }
}

/// Synthesizes a history for one driver with a mild linear relationship
/// between package count and observed effort, trains the regressor, and
/// reports the fitted model.
fn train_demo(samples: usize, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut rows = Vec::with_capacity(samples);
    for day in 0..samples {
        let num_packages = rng.gen_range(5.0..25.0);
        let total_weight_kg = rng.gen_range(10.0..150.0);
        let num_stops = rng.gen_range(3.0..15.0);
        let difficulty = rng.gen_range(1.0..3.0);
        let time = rng.gen_range(30.0..180.0);
        let experience_days = day as f64;
        let recent_avg_workload = rng.gen_range(40.0..120.0);
        let recent_hard_days = rng.gen_range(0.0..4.0);
        let noise = rng.gen_range(-5.0..5.0);

        let observed_effort = num_packages * 2.0 + total_weight_kg * 0.3 + difficulty * 5.0 + noise;
        rows.push(TrainingRow {
            features: [
                num_packages,
                total_weight_kg,
                num_stops,
                difficulty,
                time,
                experience_days,
                recent_avg_workload,
                recent_hard_days,
            ],
            observed_effort,
        });
    }

    match regressor::train(&rows) {
        Some(model) => {
            println!(
                "trained model: version={} mse={:.3} features={:?}",
                model.version, model.training_mse, model.feature_names
            );
        }
        None => {
            println!("not enough samples to train (need at least 10, have {})", rows.len());
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            drivers,
            packages,
            ev_fraction,
            recovery_mode,
            date,
            warehouse_lat,
            warehouse_lng,
            seed,
            timeline,
            pretty,
        } => {
            run_scenario(
                drivers,
                packages,
                ev_fraction,
                recovery_mode,
                date,
                warehouse_lat,
                warehouse_lng,
                seed,
                timeline,
                pretty,
            )
            .await;
        }
        Commands::Train { samples, seed } => {
            train_demo(samples, seed);
        }
    }
}
