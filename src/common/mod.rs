//! Common types shared across the localization core
pub mod field;

use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, PI};
use std::ops::{Add, AddAssign, Sub};

/// Angular unit used at the API boundary. Headings are stored in radians.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngleUnit {
    Degrees,
    Radians,
}

impl AngleUnit {
    /// Convert an angle in this unit to radians
    pub fn to_radians(self, angle: f64) -> f64 {
        match self {
            AngleUnit::Degrees => angle.to_radians(),
            AngleUnit::Radians => angle,
        }
    }

    /// Convert an angle in radians to this unit
    pub fn radians_to_unit(self, angle: f64) -> f64 {
        match self {
            AngleUnit::Degrees => angle.to_degrees(),
            AngleUnit::Radians => angle,
        }
    }
}

/// A 2D pose (x, y, theta), theta in radians
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Map a heading between the chassis convention and standard position.
    ///
    /// `θ' = π/2 − θ`. Applying it twice gives back the original heading.
    pub fn standard_position(self) -> Pose {
        Pose {
            theta: FRAC_PI_2 - self.theta,
            ..self
        }
    }

    /// Express the heading in `unit`, optionally mapped to standard position first
    pub fn to_unit(self, unit: AngleUnit, standard_position: bool) -> Pose {
        let pose = if standard_position {
            self.standard_position()
        } else {
            self
        };
        Pose {
            theta: unit.radians_to_unit(pose.theta),
            ..pose
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

impl Sub for Pose {
    type Output = Pose;

    fn sub(self, other: Pose) -> Pose {
        Pose::new(self.x - other.x, self.y - other.y, self.theta - other.theta)
    }
}

impl Add for Pose {
    type Output = Pose;

    fn add(self, other: Pose) -> Pose {
        Pose::new(self.x + other.x, self.y + other.y, self.theta + other.theta)
    }
}

impl AddAssign for Pose {
    fn add_assign(&mut self, delta: Pose) {
        self.x += delta.x;
        self.y += delta.y;
        self.theta += delta.theta;
    }
}

/// Wrap an angle to [-pi, pi]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut wrapped = angle % (2.0 * PI);
    if wrapped > PI {
        wrapped -= 2.0 * PI;
    } else if wrapped < -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}
