//! Ranging sensor models used to weight particles

use crate::common::field::Field;
use crate::common::{normalize_angle, Pose};
use nalgebra::Vector2;
use std::fmt::Debug;

/// A sensor that can score how well a hypothesized position explains its reading
pub trait Sensor: Debug + Send {
    /// Get the sensor name
    fn name(&self) -> &str;

    /// Record a new reading and its Gaussian noise standard deviation
    fn update(&mut self, distance: f64, std_dev: f64);

    /// Whether a reading has been recorded yet
    fn has_reading(&self) -> bool;

    /// Likelihood of the latest reading for a robot at `position` facing
    /// `heading` (radians, standard position). Peak value is 1.
    fn likelihood(&self, position: &Vector2<f64>, heading: f64, field: &Field) -> f64;
}

/// Latest reading of a ranging sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub distance: f64,
    pub std_dev: f64,
}

/// Distance sensor mounted at a fixed offset on the chassis
#[derive(Debug, Clone)]
pub struct DistanceSensor {
    name: String,
    // offset in the robot frame, theta relative to the chassis heading
    mount: Pose,
    reading: Option<Reading>,
}

impl DistanceSensor {
    pub fn new(name: &str, mount: Pose) -> Self {
        DistanceSensor {
            name: name.to_string(),
            mount,
            reading: None,
        }
    }

    pub fn mount(&self) -> Pose {
        self.mount
    }

    pub fn reading(&self) -> Option<Reading> {
        self.reading
    }

    /// Distance the sensor should read for a robot at `position` facing `heading`
    pub fn expected_distance(&self, position: &Vector2<f64>, heading: f64, field: &Field) -> Option<f64> {
        let (sin, cos) = heading.sin_cos();
        let origin = position
            + Vector2::new(
                self.mount.x * cos - self.mount.y * sin,
                self.mount.x * sin + self.mount.y * cos,
            );
        field.raycast(&origin, normalize_angle(heading + self.mount.theta))
    }
}

impl Sensor for DistanceSensor {
    fn name(&self) -> &str {
        &self.name
    }

    fn update(&mut self, distance: f64, std_dev: f64) {
        self.reading = Some(Reading { distance, std_dev });
    }

    fn has_reading(&self) -> bool {
        self.reading.is_some()
    }

    fn likelihood(&self, position: &Vector2<f64>, heading: f64, field: &Field) -> f64 {
        let Some(reading) = self.reading else {
            return 1.0;
        };
        match self.expected_distance(position, heading, field) {
            Some(expected) => {
                let z = (reading.distance - expected) / reading.std_dev;
                (-0.5 * z * z).exp()
            }
            None => 0.0,
        }
    }
}
