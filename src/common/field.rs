//! Known field geometry and ray casting against it
//!
//! The field is a set of wall segments. A ranging sensor's expected reading
//! is the distance along its ray to the first wall it meets.

use nalgebra::Vector2;

/// Half-width of the default competition field (wall-to-wall 1.78308 m, in inches).
pub const DEFAULT_HALF_WIDTH: f64 = 70.2;

const PARALLEL_EPSILON: f64 = 1e-12;

/// A wall segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Wall {
    pub start: Vector2<f64>,
    pub end: Vector2<f64>,
}

impl Wall {
    pub fn new(start: Vector2<f64>, end: Vector2<f64>) -> Self {
        Wall { start, end }
    }

    /// Distance along a unit ray to this wall, if the ray hits it ahead of the origin
    pub fn ray_intersection(&self, origin: &Vector2<f64>, direction: &Vector2<f64>) -> Option<f64> {
        let edge = self.end - self.start;
        let denom = cross(direction, &edge);
        if denom.abs() < PARALLEL_EPSILON {
            return None;
        }

        let to_start = self.start - origin;
        let t = cross(&to_start, &edge) / denom;
        let s = cross(&to_start, direction) / denom;

        if t >= 0.0 && (0.0..=1.0).contains(&s) {
            Some(t)
        } else {
            None
        }
    }
}

fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Field boundary used by the sensor model
#[derive(Debug, Clone)]
pub struct Field {
    walls: Vec<Wall>,
}

impl Field {
    /// Create a field from arbitrary wall segments
    pub fn new(walls: Vec<Wall>) -> Self {
        Field { walls }
    }

    /// Square field centered on the origin
    pub fn square(half_width: f64) -> Self {
        Self::rectangle(half_width, half_width)
    }

    /// Axis-aligned rectangle centered on the origin
    pub fn rectangle(half_width: f64, half_height: f64) -> Self {
        let corners = [
            Vector2::new(-half_width, -half_height),
            Vector2::new(half_width, -half_height),
            Vector2::new(half_width, half_height),
            Vector2::new(-half_width, half_height),
        ];
        let walls = (0..corners.len())
            .map(|i| Wall::new(corners[i], corners[(i + 1) % corners.len()]))
            .collect();
        Field { walls }
    }

    pub fn walls(&self) -> &[Wall] {
        &self.walls
    }

    /// Distance from `origin` along `heading` (radians, standard position) to the nearest wall
    pub fn raycast(&self, origin: &Vector2<f64>, heading: f64) -> Option<f64> {
        let direction = Vector2::new(heading.cos(), heading.sin());
        self.walls
            .iter()
            .filter_map(|wall| wall.ray_intersection(origin, &direction))
            .fold(None, |closest: Option<f64>, t| match closest {
                Some(best) if best <= t => Some(best),
                _ => Some(t),
            })
    }
}

impl Default for Field {
    fn default() -> Self {
        Field::square(DEFAULT_HALF_WIDTH)
    }
}
