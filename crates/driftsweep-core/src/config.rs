use std::{error::Error, fmt};

/// Navigation strategy for a collection skimmer.
///
/// `Random` and `Greedy` navigate from drone-observed reports only;
/// `Optimal` is the omniscient baseline that samples the true field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavStrategy {
    Random,
    Greedy,
    Optimal,
}

impl NavStrategy {
    /// Parse a strategy name. Unknown names are a fatal configuration
    /// error, rejected here rather than mid-run.
    pub fn parse(name: &str) -> Result<Self, SimConfigError> {
        match name {
            "random" => Ok(NavStrategy::Random),
            "greedy" => Ok(NavStrategy::Greedy),
            "optimal" => Ok(NavStrategy::Optimal),
            _ => Err(SimConfigError::UnknownStrategy(name.to_string())),
        }
    }
}

/// Flight pattern flown by the drone fleet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatternKind {
    Lawnmower,
    Orbit,
    Adaptive,
}

impl PatternKind {
    /// Parse a pattern name ("circular" is accepted as an alias for the
    /// orbit pattern).
    pub fn parse(name: &str) -> Result<Self, SimConfigError> {
        match name {
            "lawnmower" => Ok(PatternKind::Lawnmower),
            "orbit" | "circular" => Ok(PatternKind::Orbit),
            "adaptive" => Ok(PatternKind::Adaptive),
            _ => Err(SimConfigError::UnknownPattern(name.to_string())),
        }
    }
}

/// Full simulation configuration.
///
/// Distances are in map units (one grid cell = one unit by default), speeds
/// in units per tick, headings in degrees for the skimmer and radians for
/// drones.
#[derive(Clone, Debug, PartialEq)]
pub struct SimConfig {
    pub width: f64,
    pub height: f64,
    pub cell_size: f64,
    /// Ambient density floor of the particle field.
    pub base_density: f32,
    pub num_clusters: usize,
    /// Constant wind speed driving cluster drift (units/tick).
    pub wind_speed: f64,
    /// Fraction of cached field cells refreshed per tick.
    pub resample_fraction: f64,
    /// Whether depleted cells may be overwritten by a fresh recomputation
    /// when their cell is refreshed. Off by default: collection leaves a
    /// lasting hole.
    pub regenerate_depleted: bool,

    pub pattern: PatternKind,
    pub num_drones: usize,
    pub scan_radius: f64,
    /// Horizontal step per tick for pattern drones, base step for adaptive.
    pub drone_step: f64,
    /// Row advance for the lawnmower pattern.
    pub row_step: f64,
    pub orbit_radius: f64,
    /// Ticks between swarm synchronisation exchanges.
    pub sync_interval: usize,

    pub num_skimmers: usize,
    pub skimmer_speed: f64,
    /// Maximum heading change per tick, degrees.
    pub max_turn_deg: f64,
    /// Width of the collection footprint swept each tick.
    pub sweep_width: f64,
    /// Fraction of encountered field mass actually captured.
    pub retention: f32,
    pub strategy: NavStrategy,
    /// Ticks between target recomputations.
    pub target_update_interval: usize,

    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 100.0,
            height: 100.0,
            cell_size: 1.0,
            base_density: 0.05,
            num_clusters: 8,
            // 0.5 knots expressed in km per 5-minute tick.
            wind_speed: 0.093,
            resample_fraction: 0.05,
            regenerate_depleted: false,
            pattern: PatternKind::Adaptive,
            num_drones: 3,
            scan_radius: 0.3,
            drone_step: 2.0,
            row_step: 2.0,
            orbit_radius: 2.0,
            sync_interval: 3,
            num_skimmers: 1,
            // 1.5 knots expressed in km per 5-minute tick.
            skimmer_speed: 0.278,
            max_turn_deg: 1.5,
            sweep_width: 0.9,
            retention: 0.85,
            strategy: NavStrategy::Greedy,
            target_update_interval: 10,
            seed: 42,
        }
    }
}

impl SimConfig {
    pub const MAX_WORLD_SIZE: f64 = 2048.0;
    pub const MAX_DRONES: usize = 64;
    pub const MAX_SKIMMERS: usize = 8;
    pub const MAX_CLUSTERS: usize = 256;

    pub fn validate(&self) -> Result<(), SimConfigError> {
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(SimConfigError::NonPositiveExtent {
                width: self.width,
                height: self.height,
            });
        }
        if self.width > Self::MAX_WORLD_SIZE || self.height > Self::MAX_WORLD_SIZE {
            return Err(SimConfigError::WorldTooLarge {
                max: Self::MAX_WORLD_SIZE,
                width: self.width,
                height: self.height,
            });
        }
        if self.cell_size <= 0.0 {
            return Err(SimConfigError::NonPositiveCellSize(self.cell_size));
        }
        if !(0.0..=1.0).contains(&self.base_density) {
            return Err(SimConfigError::UnitRange {
                name: "base_density",
                value: self.base_density as f64,
            });
        }
        if !(0.0..=1.0).contains(&self.retention) {
            return Err(SimConfigError::UnitRange {
                name: "retention",
                value: self.retention as f64,
            });
        }
        if !(0.0..=1.0).contains(&self.resample_fraction) {
            return Err(SimConfigError::UnitRange {
                name: "resample_fraction",
                value: self.resample_fraction,
            });
        }
        if self.num_clusters > Self::MAX_CLUSTERS {
            return Err(SimConfigError::TooManyClusters {
                max: Self::MAX_CLUSTERS,
                actual: self.num_clusters,
            });
        }
        if self.num_drones == 0 || self.num_drones > Self::MAX_DRONES {
            return Err(SimConfigError::DroneCountOutOfRange {
                max: Self::MAX_DRONES,
                actual: self.num_drones,
            });
        }
        if self.num_skimmers == 0 || self.num_skimmers > Self::MAX_SKIMMERS {
            return Err(SimConfigError::SkimmerCountOutOfRange {
                max: Self::MAX_SKIMMERS,
                actual: self.num_skimmers,
            });
        }
        if self.scan_radius <= 0.0 || self.drone_step <= 0.0 || self.row_step <= 0.0 {
            return Err(SimConfigError::NonPositiveDroneGeometry);
        }
        if self.skimmer_speed <= 0.0 || self.sweep_width <= 0.0 {
            return Err(SimConfigError::NonPositiveSkimmerGeometry);
        }
        if self.max_turn_deg <= 0.0 {
            return Err(SimConfigError::NonPositiveTurnRate(self.max_turn_deg));
        }
        if self.sync_interval == 0 || self.target_update_interval == 0 {
            return Err(SimConfigError::ZeroInterval);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimConfigError {
    NonPositiveExtent { width: f64, height: f64 },
    WorldTooLarge { max: f64, width: f64, height: f64 },
    NonPositiveCellSize(f64),
    UnitRange { name: &'static str, value: f64 },
    TooManyClusters { max: usize, actual: usize },
    DroneCountOutOfRange { max: usize, actual: usize },
    SkimmerCountOutOfRange { max: usize, actual: usize },
    NonPositiveDroneGeometry,
    NonPositiveSkimmerGeometry,
    NonPositiveTurnRate(f64),
    ZeroInterval,
    UnknownStrategy(String),
    UnknownPattern(String),
}

impl fmt::Display for SimConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimConfigError::NonPositiveExtent { width, height } => {
                write!(f, "map extent must be positive (got {width} x {height})")
            }
            SimConfigError::WorldTooLarge { max, width, height } => {
                write!(f, "map extent ({width} x {height}) exceeds supported maximum ({max})")
            }
            SimConfigError::NonPositiveCellSize(v) => {
                write!(f, "cell_size must be positive (got {v})")
            }
            SimConfigError::UnitRange { name, value } => {
                write!(f, "{name} must lie in [0, 1] (got {value})")
            }
            SimConfigError::TooManyClusters { max, actual } => {
                write!(f, "num_clusters ({actual}) exceeds supported maximum ({max})")
            }
            SimConfigError::DroneCountOutOfRange { max, actual } => {
                write!(f, "num_drones ({actual}) must be in 1..={max}")
            }
            SimConfigError::SkimmerCountOutOfRange { max, actual } => {
                write!(f, "num_skimmers ({actual}) must be in 1..={max}")
            }
            SimConfigError::NonPositiveDroneGeometry => {
                write!(f, "scan_radius, drone_step and row_step must be positive")
            }
            SimConfigError::NonPositiveSkimmerGeometry => {
                write!(f, "skimmer_speed and sweep_width must be positive")
            }
            SimConfigError::NonPositiveTurnRate(v) => {
                write!(f, "max_turn_deg must be positive (got {v})")
            }
            SimConfigError::ZeroInterval => {
                write!(f, "sync_interval and target_update_interval must be positive")
            }
            SimConfigError::UnknownStrategy(name) => {
                write!(f, "unknown navigation strategy '{name}' (expected random, greedy or optimal)")
            }
            SimConfigError::UnknownPattern(name) => {
                write!(f, "unknown flight pattern '{name}' (expected lawnmower, orbit or adaptive)")
            }
        }
    }
}

impl Error for SimConfigError {}
