use super::{DroneBody, VehiclePose};
use crate::field::DensityField;
use std::f64::consts::{FRAC_PI_2, PI, TAU};

/// Radians advanced per tick around the circle.
const ANGULAR_RATE: f64 = 0.15;
/// Maximum centre movement per tick, slightly above the vehicle's speed so
/// the formation never falls behind but also never teleports.
const MAX_CENTER_SHIFT: f64 = 0.3;
/// Hard cap on drone displacement in one tick.
const MAX_STEP: f64 = 10.0;
const RADIUS_STAGGER: f64 = 2.0;

/// Circle ahead of the collection vehicle. The orbit centre tracks the
/// vehicle rate-limited; the flown circle sits `forward_distance` ahead of
/// the vehicle along its heading.
pub struct OrbitState {
    center: [f64; 2],
    pub circle_radius: f64,
    pub forward_distance: f64,
    phase: f64,
}

impl OrbitState {
    /// Formation placement by fleet index: the lead drone circles close in,
    /// later rows further out, phases spread so paths do not overlap.
    pub fn formation(center: [f64; 2], index: u32, base_radius: f64) -> Self {
        let forward_distance = match index {
            0 => 6.0,
            1 | 2 => 9.0,
            _ => 12.0,
        };
        let phase = match index {
            0 => 0.0,
            1 => FRAC_PI_2,
            2 => 3.0 * FRAC_PI_2,
            3 => PI / 3.0,
            4 => 5.0 * PI / 3.0,
            _ => (index as f64 * 0.7).rem_euclid(TAU),
        };
        Self {
            center,
            circle_radius: base_radius + index as f64 * RADIUS_STAGGER,
            forward_distance,
            phase,
        }
    }

    pub(crate) fn step(
        &mut self,
        body: &mut DroneBody,
        field: &mut DensityField,
        vehicle: Option<&VehiclePose>,
    ) -> f32 {
        let prev = body.position;

        if let Some(vehicle) = vehicle {
            let mut dx = vehicle.position[0] - self.center[0];
            let mut dy = vehicle.position[1] - self.center[1];
            let shift = (dx * dx + dy * dy).sqrt();
            if shift > MAX_CENTER_SHIFT {
                let scale = MAX_CENTER_SHIFT / shift;
                dx *= scale;
                dy *= scale;
            }
            self.center[0] += dx;
            self.center[1] += dy;
            // Carry the drone along so its relative position is preserved.
            body.position[0] += dx;
            body.position[1] += dy;
        }

        self.phase = (self.phase + ANGULAR_RATE).rem_euclid(TAU);

        let circle_centre = match vehicle {
            Some(vehicle) => {
                let heading = vehicle.heading_deg.to_radians();
                [
                    self.center[0] + self.forward_distance * heading.sin(),
                    self.center[1] + self.forward_distance * heading.cos(),
                ]
            }
            None => self.center,
        };
        body.position = [
            circle_centre[0] + self.circle_radius * self.phase.sin(),
            circle_centre[1] + self.circle_radius * self.phase.cos(),
        ];

        let dx = body.position[0] - prev[0];
        let dy = body.position[1] - prev[1];
        let moved = (dx * dx + dy * dy).sqrt();
        if moved > MAX_STEP {
            let scale = MAX_STEP / moved;
            body.position = [prev[0] + dx * scale, prev[1] + dy * scale];
        }
        body.position = body.bounds.clamp(body.position);
        if moved > 1e-9 {
            body.heading = (body.position[1] - prev[1]).atan2(body.position[0] - prev[0]);
        }

        body.scan(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::drone::Bounds;

    fn setup(index: u32) -> (OrbitState, DroneBody, DensityField) {
        let state = OrbitState::formation([50.0, 50.0], index, 2.0);
        let body = DroneBody::new(index, [50.0, 50.0], 0.0, 0.3, Bounds::of_map(100.0, 100.0));
        let field = DensityField::new(&SimConfig::default());
        (state, body, field)
    }

    #[test]
    fn displacement_per_tick_is_capped() {
        let (mut state, mut body, mut field) = setup(4);
        let vehicle = VehiclePose {
            position: [90.0, 90.0],
            heading_deg: 45.0,
        };
        let mut prev = body.position;
        for _ in 0..100 {
            state.step(&mut body, &mut field, Some(&vehicle));
            let dx = body.position[0] - prev[0];
            let dy = body.position[1] - prev[1];
            // Centre carry-over plus the capped circle move.
            assert!((dx * dx + dy * dy).sqrt() <= MAX_STEP + MAX_CENTER_SHIFT + 1e-9);
            assert!(body.bounds.contains(body.position));
            prev = body.position;
        }
    }

    #[test]
    fn without_a_vehicle_the_drone_circles_its_centre() {
        let (mut state, mut body, mut field) = setup(0);
        for _ in 0..50 {
            state.step(&mut body, &mut field, None);
            let dx = body.position[0] - 50.0;
            let dy = body.position[1] - 50.0;
            let r = (dx * dx + dy * dy).sqrt();
            assert!((r - state.circle_radius).abs() < 1e-6);
        }
    }

    #[test]
    fn formation_staggers_radii_by_index() {
        assert!(
            OrbitState::formation([0.0, 0.0], 3, 2.0).circle_radius
                > OrbitState::formation([0.0, 0.0], 0, 2.0).circle_radius
        );
    }
}
