use super::{angle_diff, DroneBody};
use crate::field::DensityField;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::collections::{HashMap, HashSet};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, FRAC_PI_6, PI, TAU};

/// Scans below this density count toward the anti-stall counter.
pub(crate) const LOW_DENSITY_THRESHOLD: f32 = 0.2;
/// Consecutive low-density scans before a forced exploration jump.
pub(crate) const MAX_LOW_DENSITY_SCANS: u32 = 5;
/// Cells scanned below this density are marked as worked-out ground.
const PROCESSED_THRESHOLD: f32 = 0.3;
const MOMENTUM: f64 = 0.8;
const MAX_STRAIGHT_STEPS: u32 = 10;
const REVISIT_PENALTY: f64 = 0.7;
const VISITED_AREA_PENALTY: f64 = 0.5;
const PROCESSED_PENALTY: f64 = 0.5;
/// Two tracks closer than this (in cells) are the same cluster.
pub(crate) const CLUSTER_RADIUS_CELLS: f64 = 3.0;
/// Minimum density for a scan to found or refresh a cluster track.
pub(crate) const MIN_CLUSTER_DENSITY: f32 = 0.8;
const CLUSTER_TIMEOUT: u32 = 10;
const AVOIDANCE_RADIUS_CELLS: f64 = 5.0;
const COORDINATION_WEIGHT: f64 = 0.8;
const SECTOR_BONUS: f64 = 0.5;
const EXPLORATION_WEIGHT_INIT: f64 = 0.7;
const EXPLORATION_WEIGHT_MIN: f64 = 0.3;
const WEIGHT_STEP: f64 = 0.05;
const EXPLOIT_SUCCESS_RUN: u32 = 5;
/// Another drone this much closer to a cluster halves its exploit score.
const PEER_CLAIM_MARGIN: f64 = 0.8;
const CLUSTER_JITTER: f64 = FRAC_PI_6;
const ESCAPE_STEP_FACTOR: f64 = 1.5;
const ESCAPE_STRAIGHT_RUN: u32 = 3;
const MOMENTUM_STEP_BONUS: f64 = 0.1;
const MOMENTUM_STEP_BONUS_CAP: f64 = 0.5;

/// A believed hotspot: centre, best observed density, ticks since update.
#[derive(Clone, Copy, Debug)]
pub struct ClusterTrack {
    pub center: [f64; 2],
    pub density: f32,
    pub age: u32,
}

/// Exploration/exploitation policy with cluster memory.
///
/// Per tick: sense, update cluster bookkeeping, then either escape a
/// low-density rut, pursue an assigned cluster, or score candidate headings
/// against momentum, sector affinity, revisit penalties and peer avoidance.
pub struct AdaptiveState {
    step_size: f64,
    grid_size: f64,
    visited: HashSet<(i64, i64)>,
    processed: HashSet<(i64, i64)>,
    clusters: HashMap<u64, ClusterTrack>,
    assigned: HashSet<u64>,
    next_cluster_id: u64,
    /// Last broadcast peer positions, refreshed on the sync cadence.
    peers: HashMap<u32, [f64; 2]>,
    /// Preferred map quadrant: 0 = SW, 1 = SE, 2 = NW, 3 = NE.
    sector: u8,
    low_density_run: u32,
    straight_run: u32,
    exploration_weight: f64,
    exploitation_run: u32,
    target: Option<[f64; 2]>,
    rng: ChaCha12Rng,
}

impl AdaptiveState {
    pub fn new(step_size: f64, grid_size: f64, sector: u8, seed: u64) -> Self {
        Self {
            step_size,
            grid_size,
            visited: HashSet::new(),
            processed: HashSet::new(),
            clusters: HashMap::new(),
            assigned: HashSet::new(),
            next_cluster_id: 0,
            peers: HashMap::new(),
            sector: sector % 4,
            low_density_run: 0,
            straight_run: 0,
            exploration_weight: EXPLORATION_WEIGHT_INIT,
            exploitation_run: 0,
            target: None,
            rng: ChaCha12Rng::seed_from_u64(seed),
        }
    }

    pub fn exploration_weight(&self) -> f64 {
        self.exploration_weight
    }

    pub fn tracked_clusters(&self) -> usize {
        self.clusters.len()
    }

    pub(crate) fn step(&mut self, body: &mut DroneBody, field: &mut DensityField) -> f32 {
        let density = body.scan(field);
        self.observe(body.position, density);
        self.track_cluster(body.position, density);
        self.age_clusters();
        self.plan(body, density);
        if let Some(target) = self.target.take() {
            body.position = target;
        }
        density
    }

    fn cell_of(&self, point: [f64; 2]) -> (i64, i64) {
        (
            (point[0] / self.grid_size).floor() as i64,
            (point[1] / self.grid_size).floor() as i64,
        )
    }

    fn observe(&mut self, position: [f64; 2], density: f32) {
        let cell = self.cell_of(position);
        self.visited.insert(cell);
        if density < PROCESSED_THRESHOLD {
            self.processed.insert(cell);
        }
    }

    /// Merge a high-density scan into a coincident track (density-weighted
    /// centre, best density, age reset) or open a new one, claiming it.
    fn track_cluster(&mut self, position: [f64; 2], density: f32) {
        if density < MIN_CLUSTER_DENSITY {
            return;
        }
        let merge_radius = CLUSTER_RADIUS_CELLS * self.grid_size;
        let existing = self
            .clusters
            .iter()
            .find(|(_, track)| distance(track.center, position) <= merge_radius)
            .map(|(&id, _)| id);

        match existing {
            Some(id) => {
                let track = self.clusters.get_mut(&id).expect("track id just found");
                let weight = (density / (density + track.density)) as f64;
                track.center = [
                    track.center[0] * (1.0 - weight) + position[0] * weight,
                    track.center[1] * (1.0 - weight) + position[1] * weight,
                ];
                track.density = track.density.max(density);
                track.age = 0;
                self.assigned.insert(id);
            }
            None => {
                let id = self.next_cluster_id;
                self.next_cluster_id += 1;
                self.clusters.insert(
                    id,
                    ClusterTrack {
                        center: position,
                        density,
                        age: 0,
                    },
                );
                self.assigned.insert(id);
            }
        }
    }

    fn age_clusters(&mut self) {
        let mut expired = Vec::new();
        for (&id, track) in &mut self.clusters {
            track.age += 1;
            if track.age > CLUSTER_TIMEOUT {
                expired.push(id);
            }
        }
        for id in expired {
            self.clusters.remove(&id);
            self.assigned.remove(&id);
        }
    }

    fn plan(&mut self, body: &mut DroneBody, density: f32) {
        if density < LOW_DENSITY_THRESHOLD {
            self.low_density_run += 1;
        } else {
            self.low_density_run = 0;
        }
        if self.low_density_run >= MAX_LOW_DENSITY_SCANS {
            self.plan_escape(body);
            return;
        }
        if !self.assigned.is_empty() && self.rng.random::<f64>() > self.exploration_weight {
            self.plan_exploit(body);
        } else {
            self.plan_explore(body);
        }
    }

    /// Head for the best assigned cluster, backing off when a peer is
    /// clearly better placed for it.
    fn plan_exploit(&mut self, body: &mut DroneBody) {
        let mut best: Option<(u64, f64)> = None;
        for &id in &self.assigned {
            let Some(track) = self.clusters.get(&id) else {
                continue;
            };
            let dist = distance(track.center, body.position);
            let mut score = track.density as f64 / (1.0 + 0.1 * dist);
            for peer in self.peers.values() {
                if distance(*peer, track.center) < dist * PEER_CLAIM_MARGIN {
                    score *= 0.5;
                }
            }
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((id, score));
            }
        }

        let Some((id, _)) = best else {
            // Nothing worth pursuing: drift back toward exploration.
            self.exploration_weight =
                (self.exploration_weight + WEIGHT_STEP).min(EXPLORATION_WEIGHT_INIT);
            self.plan_explore(body);
            return;
        };

        let track = self.clusters[&id];
        let dx = track.center[0] - body.position[0];
        let dy = track.center[1] - body.position[1];
        let dist = (dx * dx + dy * dy).sqrt();
        let angle = dy.atan2(dx) + self.rng.random_range(-CLUSTER_JITTER..=CLUSTER_JITTER);
        // Shrink the step while closing in so the drone combs the hotspot.
        let step = self.step_size.min((dist * 0.5).max(self.step_size * 0.5));

        self.target = Some(body.bounds.clamp([
            body.position[0] + step * angle.cos(),
            body.position[1] + step * angle.sin(),
        ]));
        body.heading = angle.rem_euclid(TAU);
        self.straight_run = 0;
        self.exploitation_run += 1;
        if self.exploitation_run > EXPLOIT_SUCCESS_RUN {
            self.exploration_weight =
                (self.exploration_weight - WEIGHT_STEP).max(EXPLORATION_WEIGHT_MIN);
            self.exploitation_run = 0;
        }
    }

    fn plan_explore(&mut self, body: &mut DroneBody) {
        if self.straight_run >= MAX_STRAIGHT_STEPS {
            self.straight_run = 0;
        }
        let momentum_bonus =
            (self.straight_run as f64 * MOMENTUM_STEP_BONUS).min(MOMENTUM_STEP_BONUS_CAP);
        let step = self.step_size * (1.0 + momentum_bonus);

        let candidates: Vec<f64> = if self.straight_run > 0 {
            vec![
                body.heading - FRAC_PI_4,
                body.heading,
                body.heading + FRAC_PI_4,
            ]
        } else {
            (0..8).map(|i| i as f64 * FRAC_PI_4).collect()
        };

        let sector_centre = self.sector_centre(&body.bounds);
        let sector_angle = (sector_centre[1] - body.position[1])
            .atan2(sector_centre[0] - body.position[0]);
        let avoid_radius = AVOIDANCE_RADIUS_CELLS * self.grid_size;

        let mut best: Option<(f64, f64)> = None;
        for angle in candidates {
            let next = [
                body.position[0] + step * angle.cos(),
                body.position[1] + step * angle.sin(),
            ];
            if !body.bounds.contains(next) {
                continue;
            }
            let cell = self.cell_of(next);

            let mut score = 1.0;
            score += (1.0 - angle_diff(angle, body.heading) / PI) * MOMENTUM;
            score += (1.0 - angle_diff(angle, sector_angle) / PI) * SECTOR_BONUS;
            if self.visited.contains(&cell) {
                score *= REVISIT_PENALTY;
            }
            if self.processed.contains(&cell) {
                score *= PROCESSED_PENALTY;
            }
            for dx in -1i64..=1 {
                for dy in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    if self.visited.contains(&(cell.0 + dx, cell.1 + dy)) {
                        score *= VISITED_AREA_PENALTY;
                    }
                }
            }
            for peer in self.peers.values() {
                let d = distance(*peer, next);
                if d < avoid_radius {
                    score *= (d / avoid_radius) * COORDINATION_WEIGHT;
                }
            }

            if best.map_or(true, |(_, s)| score > s) {
                best = Some((angle, score));
            }
        }

        match best {
            Some((angle, _)) => {
                if angle_diff(angle, body.heading) < 0.1 {
                    self.straight_run += 1;
                } else {
                    self.straight_run = 0;
                }
                body.heading = angle.rem_euclid(TAU);
                self.target = Some(body.bounds.clamp([
                    body.position[0] + step * angle.cos(),
                    body.position[1] + step * angle.sin(),
                ]));
            }
            None => self.plan_random(body),
        }
    }

    /// Anti-stall escape valve: turn hard away from the current heading and
    /// take an enlarged step out of the dead zone.
    fn plan_escape(&mut self, body: &mut DroneBody) {
        self.low_density_run = 0;
        let mut turn = self.rng.random_range(FRAC_PI_2..=PI);
        if self.rng.random_bool(0.5) {
            turn = -turn;
        }
        let angle = (body.heading + turn).rem_euclid(TAU);
        let step = self.step_size * ESCAPE_STEP_FACTOR;

        self.target = Some(body.bounds.clamp([
            body.position[0] + step * angle.cos(),
            body.position[1] + step * angle.sin(),
        ]));
        body.heading = angle;
        // Keep running straight for a few ticks so the escape sticks.
        self.straight_run = ESCAPE_STRAIGHT_RUN;
    }

    fn plan_random(&mut self, body: &mut DroneBody) {
        let angle = self.rng.random::<f64>() * TAU;
        self.target = Some(body.bounds.clamp([
            body.position[0] + self.step_size * angle.cos(),
            body.position[1] + self.step_size * angle.sin(),
        ]));
        body.heading = angle;
        self.straight_run = 0;
    }

    fn sector_centre(&self, bounds: &super::Bounds) -> [f64; 2] {
        let mid_x = (bounds.min_x + bounds.max_x) / 2.0;
        let mid_y = (bounds.min_y + bounds.max_y) / 2.0;
        let east = self.sector & 1 != 0;
        let north = self.sector & 2 != 0;
        [
            if east {
                (mid_x + bounds.max_x) / 2.0
            } else {
                (bounds.min_x + mid_x) / 2.0
            },
            if north {
                (mid_y + bounds.max_y) / 2.0
            } else {
                (bounds.min_y + mid_y) / 2.0
            },
        ]
    }

    // Swarm coordination surface: read-only snapshots in, reconciled
    // ownership and peer tables back.

    pub(crate) fn sector(&self) -> u8 {
        self.sector
    }

    pub(crate) fn set_sector(&mut self, sector: u8) {
        self.sector = sector % 4;
    }

    pub(crate) fn set_peers(&mut self, peers: HashMap<u32, [f64; 2]>) {
        self.peers = peers;
    }

    pub(crate) fn snapshot(&self) -> Vec<(u64, ClusterTrack)> {
        self.clusters.iter().map(|(&id, &track)| (id, track)).collect()
    }

    /// Id of a tracked cluster coincident with `center`, if any.
    pub(crate) fn coincident_cluster(&self, center: [f64; 2]) -> Option<u64> {
        let merge_radius = CLUSTER_RADIUS_CELLS * self.grid_size;
        self.clusters
            .iter()
            .find(|(_, track)| distance(track.center, center) <= merge_radius)
            .map(|(&id, _)| id)
    }

    /// Adopt a cluster learned from a peer under a fresh local id. The
    /// track arrives unassigned; ownership is settled separately.
    pub(crate) fn inject(&mut self, track: ClusterTrack) -> u64 {
        let id = self.next_cluster_id;
        self.next_cluster_id += 1;
        self.clusters.insert(id, track);
        id
    }

    pub(crate) fn assign(&mut self, id: u64) {
        if self.clusters.contains_key(&id) {
            self.assigned.insert(id);
        }
    }

    pub(crate) fn unassign(&mut self, id: u64) {
        self.assigned.remove(&id);
    }

    pub(crate) fn is_assigned(&self, id: u64) -> bool {
        self.assigned.contains(&id)
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
    use crate::config::SimConfig;
    use crate::drone::Bounds;
    use crate::field::{Cluster, DensityField};

    fn empty_field() -> DensityField {
        let config = SimConfig {
            base_density: 0.0,
            num_clusters: 0,
            ..SimConfig::default()
        };
        DensityField::new(&config)
    }

    fn body_at(x: f64, y: f64) -> DroneBody {
        DroneBody::new(0, [x, y], 0.0, 0.3, Bounds::of_map(100.0, 100.0))
    }

    #[test]
    fn position_stays_inside_the_map() {
        let mut field = DensityField::new(&SimConfig::default());
        let mut state = AdaptiveState::new(2.0, 1.0, 0, 7);
        let mut body = body_at(1.0, 1.0);
        for _ in 0..500 {
            state.step(&mut body, &mut field);
            assert!(body.bounds.contains(body.position));
        }
    }

    #[test]
    fn sustained_low_density_forces_a_hard_turn() {
        let mut field = empty_field();
        let mut state = AdaptiveState::new(2.0, 1.0, 0, 11);
        let mut body = body_at(50.0, 50.0);

        // Four low-density scans build the counter without triggering.
        for _ in 0..(MAX_LOW_DENSITY_SCANS - 1) {
            state.step(&mut body, &mut field);
        }
        assert_eq!(state.low_density_run, MAX_LOW_DENSITY_SCANS - 1);

        let heading_before = body.heading;
        state.step(&mut body, &mut field);
        let turn = angle_diff(heading_before, body.heading);
        assert!(
            (FRAC_PI_2 - 1e-9..=PI + 1e-9).contains(&turn),
            "expected a 90-180 degree escape turn, got {turn}"
        );
        assert_eq!(state.low_density_run, 0);
        assert_eq!(state.straight_run, ESCAPE_STRAIGHT_RUN);
    }

    #[test]
    fn high_density_scans_open_and_merge_cluster_tracks() {
        let mut state = AdaptiveState::new(1.0, 1.0, 0, 3);
        state.track_cluster([10.0, 10.0], 0.9);
        assert_eq!(state.tracked_clusters(), 1);

        // A second strong scan nearby merges instead of opening a track.
        state.track_cluster([11.0, 10.5], 0.95);
        assert_eq!(state.tracked_clusters(), 1);
        let (_, track) = state.snapshot()[0];
        assert!(track.density >= 0.95);
        assert!(track.center[0] > 10.0 && track.center[0] < 11.0);

        // A distant one opens a new track.
        state.track_cluster([40.0, 40.0], 0.9);
        assert_eq!(state.tracked_clusters(), 2);
    }

    #[test]
    fn stale_cluster_tracks_are_evicted() {
        let mut state = AdaptiveState::new(1.0, 1.0, 0, 3);
        state.track_cluster([10.0, 10.0], 0.9);
        for _ in 0..=CLUSTER_TIMEOUT {
            state.age_clusters();
        }
        assert_eq!(state.tracked_clusters(), 0);
        assert!(state.assigned.is_empty());
    }

    #[test]
    fn exploitation_pulls_the_drone_toward_its_cluster() {
        let config = SimConfig {
            base_density: 0.0,
            ..SimConfig::default()
        };
        let mut field = DensityField::from_clusters(
            &config,
            vec![Cluster {
                position: [60.0, 50.0],
                strength: 1.0,
                radius: 6.0,
            }],
        );
        let mut state = AdaptiveState::new(2.0, 1.0, 0, 5);
        // Known, claimed cluster and a weight that always exploits.
        state.track_cluster([60.0, 50.0], 0.95);
        state.exploration_weight = 0.0;

        let mut body = body_at(50.0, 50.0);
        let start_gap = 10.0;
        for _ in 0..6 {
            // Keep the track fresh so eviction does not interfere.
            state.track_cluster([60.0, 50.0], 0.95);
            state.step(&mut body, &mut field);
        }
        let gap = (body.position[0] - 60.0).hypot(body.position[1] - 50.0);
        assert!(gap < start_gap, "drone did not close in: {gap}");
    }

    #[test]
    fn visited_ground_scores_below_fresh_ground() {
        let mut state = AdaptiveState::new(2.0, 1.0, 3, 9);
        let mut field = empty_field();
        let mut body = body_at(50.0, 50.0);
        // Walk a while, then verify the drone has spread out instead of
        // oscillating over the same cells.
        for _ in 0..200 {
            state.step(&mut body, &mut field);
        }
        assert!(state.visited.len() > 40);
    }
}
