//! Perception module for Prometheus robot
//!
//! Pose estimation: the pose store, ranging sensor models, the particle
//! filter, and the localizer that runs them once per control cycle.
pub mod filters;
pub mod localization;
pub mod pose_store;
pub mod sensors;

pub use self::filters::{FilterStats, Particle, ParticleFilter, ParticleFilterConfig, SensorId};
pub use self::localization::Localizer;
pub use self::pose_store::{PoseCorrector, PoseProvider, PoseStore};
pub use self::sensors::{DistanceSensor, Sensor};
