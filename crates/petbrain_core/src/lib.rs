//! # Petbrain Core
//!
//! The deterministic simulation engine behind a pet's brain view.
//!
//! This crate contains everything that runs inside one tick:
//! - Toroidal grid construction with Moore-neighborhood wiring
//! - Cells with a single current state and a bounded outbound channel
//! - The action-potential phase machine and neighbor-weighted input
//! - Mapping from pet vitals to per-pet simulation parameters
//! - Configuration, metrics and structured logging
//!
//! Scheduling, subscriptions and the pet lifecycle live in `petbrain_engine`.
//!
//! ## Example
//!
//! ```
//! use petbrain_core::config::SynapticWeights;
//! use petbrain_core::grid::Grid;
//! use petbrain_core::mapper::map_parameters;
//! use petbrain_core::rules::RuleEngine;
//! use petbrain_data::PetVitals;
//!
//! let params = map_parameters(&PetVitals::default());
//! let mut grid = Grid::square(params.grid_size, 42, 16);
//! grid.seed_center();
//!
//! let engine = RuleEngine::new(SynapticWeights::default(), false);
//! let firing = grid.step(&engine, &params);
//! assert!(firing <= grid.cells().len());
//! ```

/// Grid cell with its state slot and outbound channel
pub mod cell;
/// Configuration management for global simulation knobs
pub mod config;
/// Toroidal grid construction and double-buffered stepping
pub mod grid;
/// Vitals to simulation parameter mapping
pub mod mapper;
/// Metrics collection and structured logging
pub mod metrics;
/// Per-cell transition rules and the phase state machine
pub mod rules;

pub use cell::Cell;
pub use config::{BrainConfig, SynapticWeights, MIN_GRID_SIZE};
pub use grid::Grid;
pub use mapper::map_parameters;
pub use metrics::{init_logging, Metrics};
pub use rules::RuleEngine;
