pub mod adaptive;
pub mod lawnmower;
pub mod orbit;
pub mod swarm;

pub use adaptive::AdaptiveState;
pub use lawnmower::LawnmowerState;
pub use orbit::OrbitState;

use crate::field::DensityField;
use std::collections::VecDeque;
use std::f64::consts::TAU;

/// One scan observation, as shared with the collection layer.
#[derive(Clone, Copy, Debug)]
pub struct ScanReport {
    pub drone_id: u32,
    pub position: [f64; 2],
    pub density: f32,
}

/// Collection vehicle pose visible to the fleet.
#[derive(Clone, Copy, Debug)]
pub struct VehiclePose {
    pub position: [f64; 2],
    /// Compass degrees, 0 = north, 90 = east.
    pub heading_deg: f64,
}

/// Axis-aligned rectangle the fleet is confined to. Boundary violations are
/// expected transient states during movement; positions clamp, never error.
#[derive(Clone, Copy, Debug)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn of_map(width: f64, height: f64) -> Self {
        Self {
            min_x: 0.0,
            max_x: width,
            min_y: 0.0,
            max_y: height,
        }
    }

    pub fn clamp(&self, point: [f64; 2]) -> [f64; 2] {
        [
            point[0].clamp(self.min_x, self.max_x),
            point[1].clamp(self.min_y, self.max_y),
        ]
    }

    pub fn contains(&self, point: [f64; 2]) -> bool {
        (self.min_x..=self.max_x).contains(&point[0])
            && (self.min_y..=self.max_y).contains(&point[1])
    }
}

const HISTORY_CAP: usize = 50;
const SCAN_POLYGON_POINTS: usize = 8;

/// Airframe state shared by every drone kind.
#[derive(Clone, Debug)]
pub struct DroneBody {
    pub id: u32,
    pub position: [f64; 2],
    /// Radians, 0 = east, counter-clockwise.
    pub heading: f64,
    pub scan_radius: f64,
    pub last_density: f32,
    pub bounds: Bounds,
    history: VecDeque<([f64; 2], f32)>,
}

impl DroneBody {
    fn new(id: u32, position: [f64; 2], heading: f64, scan_radius: f64, bounds: Bounds) -> Self {
        Self {
            id,
            position: bounds.clamp(position),
            heading,
            scan_radius,
            last_density: 0.0,
            bounds,
            history: VecDeque::with_capacity(HISTORY_CAP),
        }
    }

    /// Query the field under the circular scan footprint and record the
    /// sample in the bounded history.
    pub(crate) fn scan(&mut self, field: &mut DensityField) -> f32 {
        let polygon: Vec<[f64; 2]> = (0..SCAN_POLYGON_POINTS)
            .map(|i| {
                let angle = TAU * i as f64 / SCAN_POLYGON_POINTS as f64;
                [
                    self.position[0] + self.scan_radius * angle.cos(),
                    self.position[1] + self.scan_radius * angle.sin(),
                ]
            })
            .collect();
        let density = field.query(&polygon);
        if self.history.len() == HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back((self.position, density));
        self.last_density = density;
        density
    }

    pub fn history(&self) -> &VecDeque<([f64; 2], f32)> {
        &self.history
    }
}

/// Movement policy. Pattern-specific state lives inside each variant; all
/// variants honour the same step contract.
pub enum FlightPattern {
    Lawnmower(LawnmowerState),
    Orbit(OrbitState),
    Adaptive(AdaptiveState),
}

/// A scanning drone: an airframe plus the flight pattern that moves it.
pub struct Drone {
    pub body: DroneBody,
    pattern: FlightPattern,
}

impl Drone {
    pub fn new(
        id: u32,
        position: [f64; 2],
        heading: f64,
        scan_radius: f64,
        bounds: Bounds,
        pattern: FlightPattern,
    ) -> Self {
        Self {
            body: DroneBody::new(id, position, heading, scan_radius, bounds),
            pattern,
        }
    }

    /// Advance the drone one tick: sample the field and move according to
    /// the flight pattern. Returns the density observed this tick.
    pub fn step(&mut self, field: &mut DensityField, vehicle: Option<&VehiclePose>) -> f32 {
        match &mut self.pattern {
            FlightPattern::Lawnmower(state) => state.step(&mut self.body, field),
            FlightPattern::Orbit(state) => state.step(&mut self.body, field, vehicle),
            FlightPattern::Adaptive(state) => state.step(&mut self.body, field),
        }
    }

    pub fn id(&self) -> u32 {
        self.body.id
    }

    pub fn position(&self) -> [f64; 2] {
        self.body.position
    }

    pub fn heading(&self) -> f64 {
        self.body.heading
    }

    pub fn last_density(&self) -> f32 {
        self.body.last_density
    }

    pub fn report(&self) -> ScanReport {
        ScanReport {
            drone_id: self.body.id,
            position: self.body.position,
            density: self.body.last_density,
        }
    }

    pub(crate) fn adaptive(&self) -> Option<&AdaptiveState> {
        match &self.pattern {
            FlightPattern::Adaptive(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn adaptive_mut(&mut self) -> Option<&mut AdaptiveState> {
        match &mut self.pattern {
            FlightPattern::Adaptive(state) => Some(state),
            _ => None,
        }
    }
}

/// Smallest absolute angular distance between two headings, in [0, pi].
pub(crate) fn angle_diff(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(TAU);
    d.min(TAU - d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn bounds_clamp_pulls_points_back_inside() {
        let bounds = Bounds::of_map(100.0, 100.0);
        assert_eq!(bounds.clamp([-3.0, 120.0]), [0.0, 100.0]);
        assert!(bounds.contains([50.0, 50.0]));
        assert!(!bounds.contains([100.1, 50.0]));
    }

    #[test]
    fn angle_diff_wraps_around_the_circle() {
        assert!((angle_diff(0.1, TAU - 0.1) - 0.2).abs() < 1e-12);
        assert!((angle_diff(0.0, PI) - PI).abs() < 1e-12);
        assert_eq!(angle_diff(1.0, 1.0), 0.0);
    }
}
