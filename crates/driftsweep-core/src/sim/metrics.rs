use super::Simulation;
use serde::{Deserialize, Serialize};

/// Aggregate statistics for one tick. `detected` and `collected` are this
/// tick's contributions; the totals accumulate over the whole run. These
/// fields are the only aggregates external tooling may depend on.
#[derive(Clone, Copy, Debug, Default)]
pub struct StepStats {
    pub step: usize,
    pub detected: f64,
    pub collected: f64,
    pub total_detected: f64,
    pub total_collected: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct StepMetrics {
    pub step: usize,
    pub detected: f64,
    pub collected: f64,
    pub total_collected: f64,
    /// Effective mass over every cell the field has materialised so far.
    pub field_total: f64,
    /// Cluster tracks currently held across the adaptive fleet.
    pub tracked_clusters: usize,
    pub skimmer_positions: Vec<[f64; 2]>,
}

fn default_schema_version() -> u32 {
    1
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub steps: usize,
    pub sample_every: usize,
    pub total_detected: f64,
    pub total_collected: f64,
    pub samples: Vec<StepMetrics>,
}

impl Simulation {
    pub(crate) fn collect_step_metrics(&self, stats: &StepStats) -> StepMetrics {
        StepMetrics {
            step: stats.step,
            detected: stats.detected,
            collected: stats.collected,
            total_collected: stats.total_collected,
            field_total: self.field.total(),
            tracked_clusters: self
                .drones
                .iter()
                .filter_map(|drone| drone.adaptive())
                .map(|state| state.tracked_clusters())
                .sum(),
            skimmer_positions: self.skimmers.iter().map(|s| s.position).collect(),
        }
    }
}
