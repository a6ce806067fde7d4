use crate::config::{NavStrategy, SimConfig};
use crate::drone::{Bounds, ScanReport, VehiclePose};
use crate::field::DensityField;
use crate::spatial;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;

/// Reports from drones further away than this never reach the skimmer.
const REPORT_RANGE: f64 = 15.0;
const HISTORY_CAP: usize = 1000;
/// Reaching a target this closely triggers an immediate retarget.
const CAPTURE_RADIUS: f64 = 0.5;
const DEFAULT_TARGET_DISTANCE: f64 = 10.0;
/// Coarse aggregation grid for the greedy strategy, in map units.
const GREEDY_GRID: f64 = 10.0;
/// Planning horizon for the feasible turn cone, in ticks.
const PLAN_HORIZON_TICKS: f64 = 50.0;
const PREFERRED_DISTANCE: f64 = 25.0;
const MIN_CELL_DISTANCE: f64 = 0.1;
const RAY_COUNT: usize = 16;
const RAY_RANGE: f64 = 30.0;
const RAY_DECAY: f64 = 0.05;

/// Slow, turn-rate-limited collection vehicle.
///
/// Collection physics always reads the true field under the hull; the
/// `random` and `greedy` strategies navigate exclusively from what the
/// drones reported, while `optimal` is the deliberately omniscient
/// baseline. Heading is in compass degrees (0 = north, 90 = east).
pub struct Skimmer {
    pub position: [f64; 2],
    pub heading: f64,
    speed: f64,
    max_turn_deg: f64,
    sweep_width: f64,
    retention: f32,
    strategy: NavStrategy,
    target: Option<[f64; 2]>,
    ticks_since_retarget: usize,
    target_update_interval: usize,
    bounds: Bounds,
    history: VecDeque<ScanReport>,
    total_collected: f64,
    last_collected: f64,
    rng: ChaCha12Rng,
}

impl Skimmer {
    pub fn new(config: &SimConfig, position: [f64; 2], seed: u64) -> Self {
        let bounds = Bounds::of_map(config.width, config.height);
        Self {
            position: bounds.clamp(position),
            heading: 0.0,
            speed: config.skimmer_speed,
            max_turn_deg: config.max_turn_deg,
            sweep_width: config.sweep_width,
            retention: config.retention,
            strategy: config.strategy,
            target: None,
            ticks_since_retarget: 0,
            target_update_interval: config.target_update_interval,
            bounds,
            history: VecDeque::new(),
            total_collected: 0.0,
            last_collected: 0.0,
            rng: ChaCha12Rng::seed_from_u64(seed),
        }
    }

    pub fn cumulative_collected(&self) -> f64 {
        self.total_collected
    }

    pub fn last_collected(&self) -> f64 {
        self.last_collected
    }

    pub fn pose(&self) -> VehiclePose {
        VehiclePose {
            position: self.position,
            heading_deg: self.heading,
        }
    }

    /// Advance one tick: ingest in-range drone reports, collect from the
    /// field under the hull, retarget on cadence, steer and move. Returns
    /// the amount collected this tick.
    pub fn step(&mut self, reports: &[ScanReport], field: &mut DensityField) -> f64 {
        self.ingest_reports(reports);

        let density = field.query_point(self.position[0], self.position[1]);
        let collected =
            (self.speed * self.sweep_width * self.retention as f64 * density as f64).max(0.0);
        self.total_collected += collected;
        self.last_collected = collected;

        self.ticks_since_retarget += 1;
        let near_target = self
            .target
            .map_or(true, |t| distance(t, self.position) < CAPTURE_RADIUS);
        if near_target || self.ticks_since_retarget >= self.target_update_interval {
            self.retarget(field);
            self.ticks_since_retarget = 0;
        }

        self.advance();
        collected
    }

    fn ingest_reports(&mut self, reports: &[ScanReport]) {
        if reports.is_empty() {
            return;
        }
        let tree = spatial::build_index(reports);
        for report in spatial::reports_within(&tree, self.position, REPORT_RANGE) {
            if self.history.len() == HISTORY_CAP {
                self.history.pop_front();
            }
            self.history.push_back(report);
        }
    }

    fn retarget(&mut self, field: &mut DensityField) {
        let target = match self.strategy {
            NavStrategy::Random => Some(self.random_target()),
            NavStrategy::Greedy => self.greedy_target(),
            NavStrategy::Optimal => self.radial_target(field),
        };
        self.target = Some(target.unwrap_or_else(|| self.default_target()));
    }

    fn random_target(&mut self) -> [f64; 2] {
        let heading = self.rng.random_range(0.0..360.0f64).to_radians();
        let reach = self.speed * self.target_update_interval as f64;
        self.bounds.clamp([
            self.position[0] + reach * heading.sin(),
            self.position[1] + reach * heading.cos(),
        ])
    }

    /// Aggregate observed reports into a coarse grid and pick the cell that
    /// best trades density against reachability within the turn cone.
    fn greedy_target(&self) -> Option<[f64; 2]> {
        if self.history.is_empty() {
            return None;
        }
        let mut grid: HashMap<(i64, i64), f32> = HashMap::new();
        for report in &self.history {
            let key = (
                (report.position[0] / GREEDY_GRID).floor() as i64,
                (report.position[1] / GREEDY_GRID).floor() as i64,
            );
            grid.entry(key)
                .and_modify(|d| *d = (*d + report.density) / 2.0)
                .or_insert(report.density);
        }

        let heading_rad = self.heading.to_radians();
        let forward = [heading_rad.sin(), heading_rad.cos()];
        let max_turn_rad = (PLAN_HORIZON_TICKS * self.max_turn_deg).to_radians();

        let mut best: Option<([f64; 2], f64)> = None;
        for (cell, density) in grid {
            let centre = [
                (cell.0 as f64 + 0.5) * GREEDY_GRID,
                (cell.1 as f64 + 0.5) * GREEDY_GRID,
            ];
            let dx = centre[0] - self.position[0];
            let dy = centre[1] - self.position[1];
            let dist = (dx * dx + dy * dy).sqrt();
            if dist < MIN_CELL_DISTANCE {
                continue;
            }
            let dot = (dx * forward[0] + dy * forward[1]) / dist;
            let angle = dot.clamp(-1.0, 1.0).acos();
            let direction_score = if dot > 0.0 && angle <= max_turn_rad {
                1.0
            } else if dot > 0.0 {
                (1.0 - (angle - max_turn_rad) / PI).max(0.1)
            } else {
                ((dot + 1.0) / 2.0).max(0.05) * 0.1
            };
            let distance_score =
                1.0 / (1.0 + (dist - PREFERRED_DISTANCE).abs() / PREFERRED_DISTANCE);
            let score = density as f64 * (0.7 * direction_score + 0.3 * distance_score);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((centre, score));
            }
        }
        best.map(|(centre, _)| self.bounds.clamp(centre))
    }

    /// Integrate distance-decayed true density along fixed radial headings
    /// and steer for the endpoint of the best ray.
    fn radial_target(&self, field: &mut DensityField) -> Option<[f64; 2]> {
        let sample_step = field.cell_size;
        let mut best: Option<(f64, f64)> = None;
        for i in 0..RAY_COUNT {
            let heading = (360.0 * i as f64 / RAY_COUNT as f64).to_radians();
            let dir = [heading.sin(), heading.cos()];
            let mut score = 0.0f64;
            let mut t = sample_step;
            while t <= RAY_RANGE {
                let point = [
                    self.position[0] + t * dir[0],
                    self.position[1] + t * dir[1],
                ];
                if !self.bounds.contains(point) {
                    break;
                }
                score += field.query_point(point[0], point[1]) as f64 / (1.0 + RAY_DECAY * t);
                t += sample_step;
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((heading, score));
            }
        }
        best.map(|(heading, _)| {
            self.bounds.clamp([
                self.position[0] + RAY_RANGE * heading.sin(),
                self.position[1] + RAY_RANGE * heading.cos(),
            ])
        })
    }

    /// Keep moving: a target straight ahead when nothing better is known.
    fn default_target(&self) -> [f64; 2] {
        let rad = self.heading.to_radians();
        self.bounds.clamp([
            self.position[0] + DEFAULT_TARGET_DISTANCE * rad.sin(),
            self.position[1] + DEFAULT_TARGET_DISTANCE * rad.cos(),
        ])
    }

    /// Turn toward the target, clamped to the per-tick turn budget, then
    /// advance exactly one tick of speed. The skimmer never stops.
    fn advance(&mut self) {
        let target = self.target.unwrap_or_else(|| self.default_target());
        let dx = target[0] - self.position[0];
        let dy = target[1] - self.position[1];
        let desired = dx.atan2(dy).to_degrees().rem_euclid(360.0);

        let mut diff = (desired - self.heading).rem_euclid(360.0);
        if diff > 180.0 {
            diff -= 360.0;
        }
        let turn = diff.clamp(-self.max_turn_deg, self.max_turn_deg);
        self.heading = (self.heading + turn).rem_euclid(360.0);

        let rad = self.heading.to_radians();
        self.position = self.bounds.clamp([
            self.position[0] + self.speed * rad.sin(),
            self.position[1] + self.speed * rad.cos(),
        ]);
    }
}

fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::Cluster;

    fn config_with(strategy: NavStrategy) -> SimConfig {
        SimConfig {
            strategy,
            base_density: 0.0,
            ..SimConfig::default()
        }
    }

    fn flat_field(base_density: f32) -> DensityField {
        let config = SimConfig {
            base_density,
            num_clusters: 0,
            ..SimConfig::default()
        };
        DensityField::new(&config)
    }

    #[test]
    fn turn_toward_a_target_directly_behind_is_clamped() {
        let config = SimConfig {
            max_turn_deg: 15.0,
            ..config_with(NavStrategy::Random)
        };
        let mut skimmer = Skimmer::new(&config, [0.0, 50.0], 1);
        skimmer.target = Some([0.0, 30.0]);

        let mut field = flat_field(0.0);
        skimmer.step(&[], &mut field);

        assert!((skimmer.heading - 15.0).abs() < 1e-9);
    }

    #[test]
    fn heading_change_per_tick_never_exceeds_the_turn_budget() {
        let config = config_with(NavStrategy::Random);
        let mut skimmer = Skimmer::new(&config, [50.0, 50.0], 7);
        let mut field = flat_field(0.3);
        let mut previous = skimmer.heading;
        for _ in 0..500 {
            skimmer.step(&[], &mut field);
            let mut delta = (skimmer.heading - previous).rem_euclid(360.0);
            if delta > 180.0 {
                delta = 360.0 - delta;
            }
            assert!(delta <= config.max_turn_deg + 1e-9, "turned {delta} degrees");
            previous = skimmer.heading;
        }
    }

    #[test]
    fn the_skimmer_advances_exactly_its_speed_every_tick() {
        let config = config_with(NavStrategy::Random);
        let mut skimmer = Skimmer::new(&config, [50.0, 50.0], 7);
        let mut field = flat_field(0.0);
        for _ in 0..50 {
            let before = skimmer.position;
            skimmer.step(&[], &mut field);
            let moved = distance(before, skimmer.position);
            // Only boundary clamping may shorten the stride.
            assert!(moved <= config.skimmer_speed + 1e-9);
            assert!(moved > 0.0, "the skimmer must never stop");
        }
    }

    #[test]
    fn collection_follows_the_physical_formula() {
        let config = SimConfig {
            base_density: 1.0,
            ..config_with(NavStrategy::Random)
        };
        let mut skimmer = Skimmer::new(&config, [50.0, 50.0], 3);
        let mut field = flat_field(1.0);
        let collected = skimmer.step(&[], &mut field);
        let expected =
            config.skimmer_speed * config.sweep_width * config.retention as f64;
        assert!((collected - expected).abs() < 1e-9);
        assert!((skimmer.cumulative_collected() - expected).abs() < 1e-9);
    }

    #[test]
    fn nothing_is_collected_over_barren_water() {
        let config = config_with(NavStrategy::Greedy);
        let mut skimmer = Skimmer::new(&config, [50.0, 50.0], 3);
        let mut field = flat_field(0.0);
        for _ in 0..20 {
            assert_eq!(skimmer.step(&[], &mut field), 0.0);
        }
    }

    #[test]
    fn greedy_prefers_dense_cells_ahead_of_the_beam() {
        let config = config_with(NavStrategy::Greedy);
        let mut skimmer = Skimmer::new(&config, [50.0, 40.0], 3);
        // Heading north. One dense report ahead, one equally dense behind.
        let reports = [
            ScanReport {
                drone_id: 0,
                position: [55.0, 52.0],
                density: 0.9,
            },
            ScanReport {
                drone_id: 1,
                position: [55.0, 28.0],
                density: 0.9,
            },
        ];
        skimmer.ingest_reports(&reports);
        let target = skimmer.greedy_target().expect("history is non-empty");
        assert!(
            target[1] > skimmer.position[1],
            "greedy picked the cell behind: {target:?}"
        );
    }

    #[test]
    fn radial_strategy_steers_toward_the_densest_ray() {
        let config = config_with(NavStrategy::Optimal);
        let skimmer = Skimmer::new(&config, [50.0, 50.0], 3);
        let mut field = DensityField::from_clusters(
            &config,
            vec![Cluster {
                position: [70.0, 50.0],
                strength: 1.0,
                radius: 6.0,
            }],
        );
        let target = skimmer.radial_target(&mut field).expect("rays were cast");
        assert!(
            target[0] > 60.0 && (target[1] - 50.0).abs() < 15.0,
            "expected an eastward target, got {target:?}"
        );
    }

    #[test]
    fn reports_beyond_range_are_never_ingested() {
        let config = config_with(NavStrategy::Greedy);
        let mut skimmer = Skimmer::new(&config, [50.0, 50.0], 3);
        let reports = [
            ScanReport {
                drone_id: 0,
                position: [52.0, 50.0],
                density: 0.5,
            },
            ScanReport {
                drone_id: 1,
                position: [90.0, 90.0],
                density: 0.5,
            },
        ];
        skimmer.ingest_reports(&reports);
        assert_eq!(skimmer.history.len(), 1);
    }
}
