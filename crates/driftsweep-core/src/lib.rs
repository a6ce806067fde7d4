//! Simulation of a scanning-drone fleet and slow collection skimmers
//! working a drifting particle field over a bounded 2-D area.
//!
//! The field models concentration as ambient floor plus drifting Gaussian
//! clusters; drones sample it under their footprint and coordinate
//! decentrally; skimmers aggregate the drones' reports and steer under a
//! turn-rate limit. Everything is deterministic given a seed.

pub mod config;
pub mod drone;
pub mod field;
pub mod sim;
pub mod spatial;
pub mod vehicle;

pub use config::{NavStrategy, PatternKind, SimConfig, SimConfigError};
pub use field::{Cluster, DensityField};
pub use sim::{run_batch, RunSummary, Simulation, StepMetrics, StepStats};
pub use vehicle::Skimmer;
