//! # Dispatch Core
//!
//! The fair route-allocation core for a last-mile delivery dispatch
//! system: a fixed pipeline of eight agents (Effort Model, Route Planner,
//! Fairness Evaluator, Driver Liaison, Final Resolver, Explainer, Recovery
//! Bookkeeper, Learning Agent) that turns a set of drivers and packages
//! into a fairness-checked assignment, plus the cross-cutting Decision Log
//! Sink and Event Bus that observe every step.
//!
//! ## Key concepts
//!
//! - **Run**: one allocation request driven end-to-end by [`controller::RunController`]
//! - **Effort**: the per-(driver, route) cost the Effort Model computes (§4.2)
//! - **Fairness**: Gini/std-dev/max-gap thresholds gating a single re-optimization round (§4.4)
//! - **Collaborators**: `Store`, `PackageClusterer`, `StopOrderer`, `EventSink`,
//!   `LlmPostprocessor` — injected trait objects, not owned by this crate (§6.1)
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use dispatch_core::collaborators::reference::{HaversineStopOrderer, InMemoryStore};
//! use dispatch_core::config::FairnessConfig;
//! use dispatch_core::controller::RunController;
//! use dispatch_core::event_bus::EventBus;
//!
//! let controller = RunController::new(
//!     Arc::new(InMemoryStore::new(FairnessConfig::default())),
//!     my_package_clusterer,
//!     Arc::new(HaversineStopOrderer),
//!     Arc::new(EventBus::new()),
//!     None,
//! );
//! let response = controller.run(request).await?;
//! ```

pub mod collaborators;
pub mod config;
pub mod controller;
pub mod decision_log;
pub mod error;
pub mod event_bus;
pub mod explainer;
pub mod fairness;
pub mod effort;
pub mod learning;
pub mod liaison;
pub mod model;
pub mod planner;
pub mod recovery;
pub mod resolver;
