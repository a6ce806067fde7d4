use super::DroneBody;
use crate::field::DensityField;
use std::f64::consts::PI;

/// Boustrophedon coverage: sweep rows horizontally, advance one row at each
/// horizontal boundary, reverse vertically at the top and bottom.
pub struct LawnmowerState {
    pub step_x: f64,
    pub step_y: f64,
    /// +1 east, -1 west.
    dir_x: f64,
    /// +1 north, -1 south.
    dir_y: f64,
    pub completed_rows: u32,
}

impl LawnmowerState {
    pub fn new(step_x: f64, step_y: f64, eastward: bool, northward: bool) -> Self {
        Self {
            step_x,
            step_y,
            dir_x: if eastward { 1.0 } else { -1.0 },
            dir_y: if northward { 1.0 } else { -1.0 },
            completed_rows: 0,
        }
    }

    pub(crate) fn step(&mut self, body: &mut DroneBody, field: &mut DensityField) -> f32 {
        let density = body.scan(field);
        self.advance(body);
        density
    }

    fn advance(&mut self, body: &mut DroneBody) {
        let bounds = body.bounds;
        body.position[0] += self.dir_x * self.step_x;

        if body.position[0] >= bounds.max_x {
            body.position[0] = bounds.max_x;
            body.position[1] += self.dir_y * self.step_y;
            self.dir_x = -1.0;
            self.completed_rows += 1;
        } else if body.position[0] <= bounds.min_x {
            body.position[0] = bounds.min_x;
            body.position[1] += self.dir_y * self.step_y;
            self.dir_x = 1.0;
            self.completed_rows += 1;
        }

        if self.dir_y > 0.0 && body.position[1] >= bounds.max_y {
            body.position[1] = bounds.max_y;
            self.dir_y = -1.0;
        } else if self.dir_y < 0.0 && body.position[1] <= bounds.min_y {
            body.position[1] = bounds.min_y;
            self.dir_y = 1.0;
        }

        body.heading = if self.dir_x > 0.0 { 0.0 } else { PI };
    }
}
