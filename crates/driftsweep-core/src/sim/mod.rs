pub mod metrics;

pub use metrics::*;

use crate::config::{PatternKind, SimConfig, SimConfigError};
use crate::drone::{
    swarm, AdaptiveState, Bounds, Drone, FlightPattern, LawnmowerState, OrbitState, ScanReport,
};
use crate::field::DensityField;
use crate::vehicle::Skimmer;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use rayon::prelude::*;
use std::f64::consts::{PI, TAU};
use std::{error::Error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum SimInitError {
    Config(SimConfigError),
}

impl fmt::Display for SimInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimInitError::Config(e) => write!(f, "{}", e),
        }
    }
}

impl From<SimConfigError> for SimInitError {
    fn from(err: SimConfigError) -> Self {
        SimInitError::Config(err)
    }
}

impl Error for SimInitError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SimInitError::Config(e) => Some(e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExperimentError {
    InvalidSampleEvery,
    TooManySteps { max: usize, actual: usize },
    TooManySamples { max: usize, actual: usize },
}

impl fmt::Display for ExperimentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentError::InvalidSampleEvery => write!(f, "sample_every must be positive"),
            ExperimentError::TooManySteps { max, actual } => {
                write!(f, "steps ({actual}) exceed supported maximum ({max})")
            }
            ExperimentError::TooManySamples { max, actual } => {
                write!(
                    f,
                    "sample count ({actual}) exceeds supported maximum ({max})"
                )
            }
        }
    }
}

impl Error for ExperimentError {}

#[derive(Debug, Clone, PartialEq)]
pub enum BatchError {
    Init(SimInitError),
    Experiment(ExperimentError),
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchError::Init(e) => write!(f, "{}", e),
            BatchError::Experiment(e) => write!(f, "{}", e),
        }
    }
}

impl Error for BatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BatchError::Init(e) => Some(e),
            BatchError::Experiment(e) => Some(e),
        }
    }
}

/// Discrete-time orchestrator: one drifting field, a drone fleet, one or
/// more skimmers. Each tick advances the field, then every drone, then
/// every skimmer, then applies the collection back into the field.
pub struct Simulation {
    pub(crate) field: DensityField,
    pub(crate) drones: Vec<Drone>,
    pub(crate) skimmers: Vec<Skimmer>,
    pub(crate) config: SimConfig,
    pub(crate) step_index: usize,
    pub(crate) total_detected: f64,
    pub(crate) total_collected: f64,
}

impl Simulation {
    pub const MAX_EXPERIMENT_STEPS: usize = 1_000_000;
    pub const MAX_EXPERIMENT_SAMPLES: usize = 50_000;

    pub fn new(config: SimConfig) -> Self {
        Self::try_new(config).unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_new(config: SimConfig) -> Result<Self, SimInitError> {
        config.validate()?;
        let field = DensityField::new(&config);
        let bounds = Bounds::of_map(config.width, config.height);

        let skimmers: Vec<Skimmer> = (0..config.num_skimmers)
            .map(|i| {
                let position = [
                    config.width * (i as f64 + 1.0) / (config.num_skimmers as f64 + 1.0),
                    config.height / 2.0,
                ];
                Skimmer::new(&config, position, config.seed.wrapping_add(1000 + i as u64))
            })
            .collect();

        let centre = [config.width / 2.0, config.height / 2.0];
        let drones = (0..config.num_drones as u32)
            .map(|index| Self::build_drone(&config, bounds, centre, index))
            .collect();

        Ok(Self {
            field,
            drones,
            skimmers,
            config,
            step_index: 0,
            total_detected: 0.0,
            total_collected: 0.0,
        })
    }

    fn build_drone(config: &SimConfig, bounds: Bounds, centre: [f64; 2], index: u32) -> Drone {
        let seed = config.seed.wrapping_add(index as u64 + 1);
        match config.pattern {
            PatternKind::Lawnmower => {
                // Alternate launch directions so paths fan out from the
                // skimmer instead of shadowing each other.
                let eastward = index % 2 == 0;
                let northward = index % 2 == 0;
                Drone::new(
                    index,
                    centre,
                    if eastward { 0.0 } else { PI },
                    config.scan_radius,
                    bounds,
                    FlightPattern::Lawnmower(LawnmowerState::new(
                        config.drone_step,
                        config.row_step,
                        eastward,
                        northward,
                    )),
                )
            }
            PatternKind::Orbit => Drone::new(
                index,
                centre,
                0.0,
                config.scan_radius,
                bounds,
                FlightPattern::Orbit(OrbitState::formation(centre, index, config.orbit_radius)),
            ),
            PatternKind::Adaptive => {
                let mut rng = ChaCha12Rng::seed_from_u64(seed);
                let heading = rng.random::<f64>() * TAU;
                Drone::new(
                    index,
                    centre,
                    heading,
                    config.scan_radius,
                    bounds,
                    FlightPattern::Adaptive(AdaptiveState::new(
                        config.drone_step,
                        config.cell_size,
                        (index % 4) as u8,
                        seed,
                    )),
                )
            }
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn field(&self) -> &DensityField {
        &self.field
    }

    pub fn drones(&self) -> &[Drone] {
        &self.drones
    }

    pub fn skimmers(&self) -> &[Skimmer] {
        &self.skimmers
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn total_detected(&self) -> f64 {
        self.total_detected
    }

    pub fn total_collected(&self) -> f64 {
        self.total_collected
    }

    /// Run a single tick and return its aggregate statistics.
    pub fn step(&mut self) -> StepStats {
        self.field.advance();

        // One atomic pairwise exchange per sync tick, before any drone of
        // this tick moves, so every pair sees a consistent snapshot.
        if self.step_index % self.config.sync_interval == 0 {
            swarm::sync(&mut self.drones);
        }

        let pose = self.skimmers.first().map(|s| s.pose());
        let mut detected = 0.0f64;
        for drone in &mut self.drones {
            detected += drone.step(&mut self.field, pose.as_ref()) as f64;
        }
        let reports: Vec<ScanReport> = self.drones.iter().map(|d| d.report()).collect();

        let mut collected = 0.0f64;
        let mut depletions: Vec<([f64; 2], f32)> = Vec::with_capacity(self.skimmers.len());
        let cell_area = self.field.cell_size * self.field.cell_size;
        for skimmer in &mut self.skimmers {
            let amount = skimmer.step(&reports, &mut self.field);
            collected += amount;
            if amount > 0.0 {
                // Collected mass divided by cell area gives the density
                // removed from the cell under the hull.
                depletions.push((skimmer.position, ((amount / cell_area) as f32).min(1.0)));
            }
        }
        for (position, amount) in depletions {
            self.field.deplete(position[0], position[1], amount);
        }

        self.step_index += 1;
        self.total_detected += detected;
        self.total_collected += collected;
        StepStats {
            step: self.step_index,
            detected,
            collected,
            total_detected: self.total_detected,
            total_collected: self.total_collected,
        }
    }

    /// Run `steps` ticks and return the final aggregate statistics.
    pub fn run(&mut self, steps: usize) -> StepStats {
        let mut last = StepStats {
            step: self.step_index,
            total_detected: self.total_detected,
            total_collected: self.total_collected,
            ..StepStats::default()
        };
        for _ in 0..steps {
            last = self.step();
        }
        last
    }

    pub fn run_experiment(&mut self, steps: usize, sample_every: usize) -> RunSummary {
        self.try_run_experiment(steps, sample_every)
            .unwrap_or_else(|e| panic!("{e}"))
    }

    pub fn try_run_experiment(
        &mut self,
        steps: usize,
        sample_every: usize,
    ) -> Result<RunSummary, ExperimentError> {
        if sample_every == 0 {
            return Err(ExperimentError::InvalidSampleEvery);
        }
        if steps > Self::MAX_EXPERIMENT_STEPS {
            return Err(ExperimentError::TooManySteps {
                max: Self::MAX_EXPERIMENT_STEPS,
                actual: steps,
            });
        }
        let estimated_samples = if steps == 0 {
            0
        } else {
            ((steps - 1) / sample_every) + 1
        };
        if estimated_samples > Self::MAX_EXPERIMENT_SAMPLES {
            return Err(ExperimentError::TooManySamples {
                max: Self::MAX_EXPERIMENT_SAMPLES,
                actual: estimated_samples,
            });
        }

        let mut samples = Vec::with_capacity(estimated_samples);
        for step in 1..=steps {
            let stats = self.step();
            if step % sample_every == 0 || step == steps {
                samples.push(self.collect_step_metrics(&stats));
            }
        }
        Ok(RunSummary {
            schema_version: 1,
            steps,
            sample_every,
            total_detected: self.total_detected,
            total_collected: self.total_collected,
            samples,
        })
    }
}

/// Run independent simulations in parallel. Parallelism is at whole-run
/// granularity only: each simulation owns its field and fleet outright.
pub fn run_batch(
    configs: &[SimConfig],
    steps: usize,
    sample_every: usize,
) -> Result<Vec<RunSummary>, BatchError> {
    configs
        .par_iter()
        .map(|config| {
            let mut sim = Simulation::try_new(config.clone()).map_err(BatchError::Init)?;
            sim.try_run_experiment(steps, sample_every)
                .map_err(BatchError::Experiment)
        })
        .collect()
}
