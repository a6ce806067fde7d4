use crate::config::SimConfig;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::collections::HashMap;
use std::f64::consts::TAU;

/// A Gaussian-shaped concentration source drifting with the wind.
#[derive(Clone, Copy, Debug)]
pub struct Cluster {
    pub position: [f64; 2],
    /// Peak contribution at the cluster centre, in [0, 1].
    pub strength: f32,
    pub radius: f64,
}

const STRENGTH_MIN: f32 = 0.05;
const STRENGTH_MAX: f32 = 1.0;
const RADIUS_MIN: f64 = 1.0;
const RADIUS_MAX: f64 = 10.0;
const STRENGTH_WALK: f32 = 0.02;
const RADIUS_WALK: f64 = 0.1;
const DRIFT_JITTER: f64 = 0.02;
const WIND_TURN: f64 = 0.05;

/// Linear falloff radius for secondary depletion, in cells. Cardinal
/// neighbours sit at distance 1, diagonal at sqrt(2); both stay inside.
const DEPLETE_FALLOFF_RADIUS: f64 = 2.0;
/// Share of the requested amount applied to each neighbouring cell.
const DEPLETE_NEIGHBOUR_SHARE: f32 = 0.5;

/// Discretized particle concentration over a bounded 2-D area.
///
/// Effective density at a point is the depleted override for its cell if
/// one exists, else the cached modeled value, else ambient floor plus the
/// Gaussian cluster contributions, always clamped to [0, 1].
pub struct DensityField {
    pub width: f64,
    pub height: f64,
    pub cell_size: f64,
    pub base_density: f32,
    clusters: Vec<Cluster>,
    /// Lazily populated density cache per grid cell.
    cache: HashMap<(i64, i64), f32>,
    /// Post-collection overrides. Entries shadow both cache and model.
    depleted: HashMap<(i64, i64), f32>,
    wind_direction: f64,
    wind_speed: f64,
    resample_fraction: f64,
    regenerate_depleted: bool,
    rng: ChaCha12Rng,
}

impl DensityField {
    /// Wall-clock seconds represented by one simulation tick.
    pub const SECONDS_PER_STEP: f64 = 300.0;

    /// Create a field with randomized clusters.
    pub fn new(config: &SimConfig) -> Self {
        let mut rng = ChaCha12Rng::seed_from_u64(config.seed);
        let clusters = (0..config.num_clusters)
            .map(|_| Cluster {
                position: [
                    rng.random::<f64>() * config.width,
                    rng.random::<f64>() * config.height,
                ],
                strength: rng.random_range(0.4..=1.0),
                radius: rng.random_range(2.0..=8.0),
            })
            .collect();
        Self::with_clusters_and_rng(config, clusters, rng)
    }

    /// Create a field with a fixed cluster layout. Used by deterministic
    /// setups and by external sources that precompute their slices.
    pub fn from_clusters(config: &SimConfig, clusters: Vec<Cluster>) -> Self {
        let rng = ChaCha12Rng::seed_from_u64(config.seed);
        Self::with_clusters_and_rng(config, clusters, rng)
    }

    fn with_clusters_and_rng(
        config: &SimConfig,
        clusters: Vec<Cluster>,
        mut rng: ChaCha12Rng,
    ) -> Self {
        let wind_direction = rng.random::<f64>() * TAU;
        Self {
            width: config.width,
            height: config.height,
            cell_size: config.cell_size,
            base_density: config.base_density,
            clusters,
            cache: HashMap::new(),
            depleted: HashMap::new(),
            wind_direction,
            wind_speed: config.wind_speed,
            resample_fraction: config.resample_fraction,
            regenerate_depleted: config.regenerate_depleted,
            rng,
        }
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn wind(&self) -> (f64, f64) {
        (self.wind_speed, self.wind_direction)
    }

    fn grid_extent(&self) -> (i64, i64) {
        (
            ((self.width / self.cell_size).ceil() as i64).max(1),
            ((self.height / self.cell_size).ceil() as i64).max(1),
        )
    }

    /// Map a point to its grid cell, clamping into the map rectangle.
    /// Out-of-bounds positions are expected transient states, not errors.
    fn cell_of(&self, x: f64, y: f64) -> (i64, i64) {
        let (w, h) = self.grid_extent();
        (
            ((x / self.cell_size).floor() as i64).clamp(0, w - 1),
            ((y / self.cell_size).floor() as i64).clamp(0, h - 1),
        )
    }

    fn cell_centre(&self, cell: (i64, i64)) -> [f64; 2] {
        [
            (cell.0 as f64 + 0.5) * self.cell_size,
            (cell.1 as f64 + 0.5) * self.cell_size,
        ]
    }

    /// Ambient floor plus Gaussian cluster contributions, clamped to [0, 1].
    /// Clusters beyond 3x their radius are skipped; at that distance the
    /// contribution is below exp(-4.5), so the truncation trades a
    /// negligible tail for a large constant factor.
    fn modeled_density(&self, x: f64, y: f64) -> f32 {
        let mut density = self.base_density;
        for cluster in &self.clusters {
            let dx = x - cluster.position[0];
            let dy = y - cluster.position[1];
            let d_sq = dx * dx + dy * dy;
            let cutoff = 3.0 * cluster.radius;
            if d_sq >= cutoff * cutoff {
                continue;
            }
            let contribution = (-d_sq / (2.0 * cluster.radius * cluster.radius)).exp();
            density += cluster.strength * contribution as f32;
        }
        density.clamp(0.0, 1.0)
    }

    fn modeled_at_cell(&self, cell: (i64, i64)) -> f32 {
        let centre = self.cell_centre(cell);
        self.modeled_density(centre[0], centre[1])
    }

    fn effective_at_cell(&self, cell: (i64, i64)) -> f32 {
        if let Some(&d) = self.depleted.get(&cell) {
            d
        } else if let Some(&d) = self.cache.get(&cell) {
            d
        } else {
            self.modeled_at_cell(cell)
        }
    }

    /// Density for a sample region, reduced to its centroid. Returns a
    /// value in [0, 1]; an empty region samples nothing.
    pub fn query(&mut self, region: &[[f64; 2]]) -> f32 {
        if region.is_empty() {
            return 0.0;
        }
        let inv = 1.0 / region.len() as f64;
        let cx = region.iter().map(|p| p[0]).sum::<f64>() * inv;
        let cy = region.iter().map(|p| p[1]).sum::<f64>() * inv;
        self.query_point(cx, cy)
    }

    /// Density at a single point, in [0, 1].
    pub fn query_point(&mut self, x: f64, y: f64) -> f32 {
        let cell = self.cell_of(x, y);
        if let Some(&d) = self.depleted.get(&cell) {
            return d;
        }
        if let Some(&d) = self.cache.get(&cell) {
            return d;
        }
        let d = self.modeled_at_cell(cell);
        self.cache.insert(cell, d);
        d
    }

    /// Remove up to `amount` of density at a point, plus a distance-weighted
    /// share from the 3x3 neighbourhood. Returns the total actually removed,
    /// bounded by what existed. Depleted cells stay reduced until their cell
    /// is refreshed by `advance` (and only if regeneration is enabled).
    pub fn deplete(&mut self, x: f64, y: f64, amount: f32) -> f32 {
        let amount = amount.clamp(0.0, 1.0);
        if amount == 0.0 {
            return 0.0;
        }
        let cell = self.cell_of(x, y);
        let current = self.effective_at_cell(cell);
        let mut removed = amount.min(current);
        self.depleted.insert(cell, (current - removed).max(0.0));

        for dx in -1i64..=1 {
            for dy in -1i64..=1 {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let neighbour = (cell.0 + dx, cell.1 + dy);
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                let falloff = (1.0 - distance / DEPLETE_FALLOFF_RADIUS).max(0.0) as f32;
                let available = self.effective_at_cell(neighbour);
                let take = (amount * falloff * DEPLETE_NEIGHBOUR_SHARE).min(available);
                if take > 0.0 {
                    self.depleted.insert(neighbour, available - take);
                    removed += take;
                }
            }
        }
        removed
    }

    /// Advance the field one tick: drift clusters with the wind, random-walk
    /// their shape, then refresh a sampled fraction of cached cells. The
    /// modeled function is continuous, so a stale cache entry is an accepted
    /// approximation rather than an error.
    pub fn advance(&mut self) {
        self.wind_direction = (self.wind_direction
            + self.rng.random_range(-WIND_TURN..=WIND_TURN))
        .rem_euclid(TAU);
        let drift_x = self.wind_speed * self.wind_direction.cos();
        let drift_y = self.wind_speed * self.wind_direction.sin();

        let width = self.width;
        let height = self.height;
        for cluster in &mut self.clusters {
            let jx = self.rng.random_range(-DRIFT_JITTER..=DRIFT_JITTER);
            let jy = self.rng.random_range(-DRIFT_JITTER..=DRIFT_JITTER);
            cluster.position[0] = (cluster.position[0] + drift_x + jx).rem_euclid(width);
            cluster.position[1] = (cluster.position[1] + drift_y + jy).rem_euclid(height);
            cluster.strength = (cluster.strength
                + self.rng.random_range(-STRENGTH_WALK..=STRENGTH_WALK))
            .clamp(STRENGTH_MIN, STRENGTH_MAX);
            cluster.radius = (cluster.radius
                + self.rng.random_range(-RADIUS_WALK..=RADIUS_WALK))
            .clamp(RADIUS_MIN, RADIUS_MAX);
        }

        self.refresh_cache();
    }

    fn refresh_cache(&mut self) {
        if self.cache.is_empty() {
            return;
        }
        let refreshes = ((self.cache.len() as f64) * self.resample_fraction).ceil() as usize;
        let keys: Vec<(i64, i64)> = self.cache.keys().copied().collect();
        for _ in 0..refreshes {
            let cell = keys[self.rng.random_range(0..keys.len())];
            if self.depleted.contains_key(&cell) {
                if !self.regenerate_depleted {
                    continue;
                }
                self.depleted.remove(&cell);
            }
            let fresh = self.modeled_at_cell(cell);
            self.cache.insert(cell, fresh);
        }
    }

    /// Total effective mass over all cells the field has materialised.
    pub fn total(&self) -> f64 {
        let mut sum = 0.0f64;
        for (cell, &d) in &self.cache {
            sum += *self.depleted.get(cell).unwrap_or(&d) as f64;
        }
        for (cell, &d) in &self.depleted {
            if !self.cache.contains_key(cell) {
                sum += d as f64;
            }
        }
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_config() -> SimConfig {
        SimConfig {
            base_density: 0.0,
            ..SimConfig::default()
        }
    }

    fn single_cluster_field() -> DensityField {
        DensityField::from_clusters(
            &bare_config(),
            vec![Cluster {
                position: [50.0, 50.0],
                strength: 1.0,
                radius: 5.0,
            }],
        )
    }

    #[test]
    fn query_is_always_a_unit_density() {
        let mut field = DensityField::new(&SimConfig::default());
        for &(x, y) in &[
            (0.0, 0.0),
            (50.0, 50.0),
            (99.9, 99.9),
            (-10.0, 30.0),
            (250.0, 250.0),
        ] {
            let d = field.query_point(x, y);
            assert!((0.0..=1.0).contains(&d), "density {d} at ({x}, {y})");
        }
    }

    #[test]
    fn single_cluster_peaks_at_centre_and_cuts_off_at_three_radii() {
        let mut field = single_cluster_field();
        assert!(field.query_point(50.0, 50.0) > 0.95);
        // 3x radius = 15 units: beyond the truncation distance.
        assert!(field.query_point(65.5, 50.0) < 1e-6);
    }

    #[test]
    fn centroid_reduction_matches_the_point_query() {
        let mut field = single_cluster_field();
        let square = [
            [49.0, 49.0],
            [51.0, 49.0],
            [51.0, 51.0],
            [49.0, 51.0],
        ];
        let from_region = field.query(&square);
        let from_point = field.query_point(50.0, 50.0);
        assert!((from_region - from_point).abs() < 1e-6);
    }

    #[test]
    fn deplete_never_removes_more_than_exists() {
        let mut field = single_cluster_field();
        // Empty corner: nothing to remove.
        assert_eq!(field.deplete(5.0, 5.0, 1.0), 0.0);
        // Centre cell is bounded by the requested amount, each neighbour by
        // its falloff share.
        let removed = field.deplete(50.5, 50.5, 0.1);
        assert!(removed <= 0.1 + 8.0 * 0.1 * DEPLETE_NEIGHBOUR_SHARE + 1e-6);
        assert!(field.query_point(50.5, 50.5) >= 0.0);
    }

    #[test]
    fn repeated_depletion_is_monotone_without_advance() {
        let mut field = single_cluster_field();
        let mut last = field.query_point(50.0, 50.0);
        for _ in 0..5 {
            field.deplete(50.0, 50.0, 0.2);
            let now = field.query_point(50.0, 50.0);
            assert!(now <= last);
            last = now;
        }
    }

    #[test]
    fn depletion_spills_into_neighbouring_cells() {
        let mut field = single_cluster_field();
        let east_before = field.query_point(51.5, 50.5);
        field.deplete(50.5, 50.5, 0.8);
        let east_after = field.query_point(51.5, 50.5);
        assert!(east_after < east_before);
    }

    #[test]
    fn depleted_cells_survive_advance_when_regeneration_is_off() {
        let mut field = single_cluster_field();
        field.query_point(50.5, 50.5);
        field.deplete(50.5, 50.5, 1.0);
        let depleted = field.query_point(50.5, 50.5);
        for _ in 0..50 {
            field.advance();
        }
        assert!((field.query_point(50.5, 50.5) - depleted).abs() < 1e-6);
    }

    #[test]
    fn advance_keeps_clusters_wrapped_and_bounded() {
        let mut field = DensityField::new(&SimConfig::default());
        for _ in 0..200 {
            field.advance();
        }
        for cluster in field.clusters() {
            assert!((0.0..100.0).contains(&cluster.position[0]));
            assert!((0.0..100.0).contains(&cluster.position[1]));
            assert!((STRENGTH_MIN..=STRENGTH_MAX).contains(&cluster.strength));
            assert!((RADIUS_MIN..=RADIUS_MAX).contains(&cluster.radius));
        }
    }

    #[test]
    fn seeded_fields_evolve_identically() {
        let config = SimConfig::default();
        let mut a = DensityField::new(&config);
        let mut b = DensityField::new(&config);
        for _ in 0..10 {
            a.advance();
            b.advance();
        }
        assert_eq!(a.query_point(33.0, 67.0), b.query_point(33.0, 67.0));
    }
}
