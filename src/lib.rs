//! Monte Carlo localization core for the Prometheus robot
//!
//! Fuses dead-reckoning odometry with ranging sensor readings through a
//! particle filter. [`Localizer`] is the entry point: feed it sensor
//! readings as they arrive and one odometry delta per control cycle.
pub mod common;
pub mod config;
pub mod error;
pub mod perception;

pub use crate::common::field::Field;
pub use crate::common::{AngleUnit, Pose};
pub use crate::config::{LocalizationConfig, MotionNoiseConfig};
pub use crate::error::{LocalizationError, Result};
pub use crate::perception::{DistanceSensor, Localizer, PoseStore, Sensor};
