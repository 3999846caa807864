//! Localization module
//!
//! [`Localizer`] ties a pose source to the particle filter. Every control
//! cycle it integrates raw odometry, drives the filter with a motion model
//! scaled to that odometry, and writes the filter's position back. Heading
//! is always left as dead reckoning produced it.

use crate::common::field::Field;
use crate::common::{AngleUnit, Pose};
use crate::config::{LocalizationConfig, MotionNoiseConfig};
use crate::error::{LocalizationError, Result};
use crate::perception::filters::{Particle, ParticleFilter, SensorId};
use crate::perception::pose_store::{PoseCorrector, PoseProvider, PoseStore};
use crate::perception::sensors::Sensor;
use log::{debug, info};
use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// A localizer for the robot
#[derive(Debug)]
pub struct Localizer<P = PoseStore> {
    pose_source: P,
    filter: ParticleFilter,
    config: LocalizationConfig,
}

impl Localizer<PoseStore> {
    /// Create a localizer backed by its own [`PoseStore`]
    pub fn new(config: LocalizationConfig) -> Result<Self> {
        Self::with_pose_source(PoseStore::new(), config)
    }
}

impl<P: PoseCorrector> Localizer<P> {
    /// Create a localizer over an existing pose source
    pub fn with_pose_source(pose_source: P, config: LocalizationConfig) -> Result<Self> {
        config.validate()?;
        let filter = ParticleFilter::new(config.filter.clone(), Field::square(config.field_half_width))?;
        Ok(Localizer {
            pose_source,
            filter,
            config,
        })
    }

    /// Register a sensor with the filter
    pub fn add_sensor<S: Sensor + 'static>(&mut self, sensor: S) -> SensorId {
        self.filter.add_sensor(Box::new(sensor))
    }

    /// Record a fresh reading for a sensor
    pub fn update_sensor(&mut self, id: SensorId, distance: f64, std_dev: f64) -> Result<()> {
        let sensor = self
            .filter
            .sensor_mut(id)
            .ok_or_else(|| LocalizationError::UnknownSensor(format!("#{}", id.0)))?;
        sensor.update(distance, std_dev);
        Ok(())
    }

    /// Record a fresh reading for the sensor called `name`
    pub fn update_sensor_by_name(&mut self, name: &str, distance: f64, std_dev: f64) -> Result<()> {
        let id = self
            .filter
            .sensor_id(name)
            .ok_or_else(|| LocalizationError::UnknownSensor(name.to_string()))?;
        self.update_sensor(id, distance, std_dev)
    }

    /// Set the pose; optionally reseed the particles around it
    pub fn set_pose(&mut self, x: f64, y: f64, heading: f64, unit: AngleUnit, reset_particles: bool) -> Result<()> {
        let pose = Pose::new(x, y, unit.to_radians(heading));
        if !pose.is_finite() {
            return Err(LocalizationError::invalid("pose", "must be finite"));
        }
        self.pose_source.write_pose(pose);
        info!("Pose set to ({:.2}, {:.2}, {:.3} rad)", pose.x, pose.y, pose.theta);

        if reset_particles {
            let spread = Vector2::repeat(self.config.reset_spread);
            self.filter.init_norm_dist(pose, spread)?;
        }
        Ok(())
    }

    /// Run one localization cycle with the odometry change since the last call.
    ///
    /// `delta.theta` is in radians. Dead reckoning is applied even if the
    /// filter has not been seeded; the filter error is returned afterwards.
    pub fn odom_update(&mut self, delta: Pose) -> Result<()> {
        if !delta.is_finite() {
            return Err(LocalizationError::InvalidMotion {
                x: delta.x,
                y: delta.y,
                theta: delta.theta,
            });
        }

        self.pose_source.apply_delta(delta);

        let mut noise = MotionNoise::new(&self.config.motion, &delta)?;
        self.filter
            .update(&self.pose_source, |rng: &mut StdRng| noise.sample(rng))?;

        let prediction = self.filter.prediction()?;
        self.pose_source.correct_position(prediction.x, prediction.y);

        debug!(
            "Odometry ({:.3}, {:.3}, {:.4}) -> corrected ({:.2}, {:.2})",
            delta.x, delta.y, delta.theta, prediction.x, prediction.y
        );
        Ok(())
    }

    /// Current best estimate
    pub fn get_pose(&self, unit: AngleUnit, standard_position: bool) -> Pose {
        self.pose_source.pose().to_unit(unit, standard_position)
    }

    /// Current particles (for visualization)
    pub fn particles(&self) -> &[Particle] {
        self.filter.particles()
    }

    pub fn filter(&self) -> &ParticleFilter {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut ParticleFilter {
        &mut self.filter
    }

    pub fn pose_source(&self) -> &P {
        &self.pose_source
    }

    pub fn config(&self) -> &LocalizationConfig {
        &self.config
    }
}

/// Per-cycle motion model built from one odometry delta
struct MotionNoise {
    delta: Vector2<f64>,
    x: Normal<f64>,
    y: Normal<f64>,
    angle: Normal<f64>,
}

impl MotionNoise {
    fn new(config: &MotionNoiseConfig, delta: &Pose) -> Result<Self> {
        Ok(MotionNoise {
            delta: Vector2::new(delta.x, delta.y),
            x: Normal::new(0.0, config.drive_noise * delta.x.abs() + config.floor)?,
            y: Normal::new(0.0, config.drive_noise * delta.y.abs() + config.floor)?,
            angle: Normal::new(0.0, config.angle_noise * delta.theta.abs() + config.floor)?,
        })
    }

    /// One noisy displacement: perturbed translation rotated by a perturbed heading error
    fn sample(&mut self, rng: &mut StdRng) -> Vector2<f64> {
        let dx = self.delta.x + self.x.sample(rng);
        let dy = self.delta.y + self.y.sample(rng);
        let (sin, cos) = self.angle.sample(rng).sin_cos();
        Vector2::new(dx * cos - dy * sin, dx * sin + dy * cos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::perception::sensors::DistanceSensor;
    use approx::assert_relative_eq;
    use std::f64::consts::FRAC_PI_2;

    fn seeded_config() -> LocalizationConfig {
        let mut config = LocalizationConfig::default();
        config.filter.num_particles = 300;
        config.filter.seed = Some(11);
        config
    }

    #[derive(Debug, Default)]
    struct RecordingChassis {
        pose: Pose,
        corrections: usize,
    }

    impl PoseProvider for RecordingChassis {
        fn pose(&self) -> Pose {
            self.pose
        }
    }

    impl PoseCorrector for RecordingChassis {
        fn write_pose(&mut self, pose: Pose) {
            self.corrections += 1;
            self.pose = pose;
        }
    }

    #[test]
    fn test_set_pose_reseeds_particles() {
        let mut localizer = Localizer::new(seeded_config()).unwrap();
        localizer.set_pose(10.0, -5.0, 90.0, AngleUnit::Degrees, true).unwrap();

        let pose = localizer.get_pose(AngleUnit::Radians, false);
        assert_eq!((pose.x, pose.y), (10.0, -5.0));
        assert_relative_eq!(pose.theta, FRAC_PI_2);

        let prediction = localizer.filter().prediction().unwrap();
        assert!((prediction.x - 10.0).abs() < 1.0);
        assert!((prediction.y + 5.0).abs() < 1.0);
    }

    #[test]
    fn test_set_pose_without_reset_leaves_filter_alone() {
        let mut localizer = Localizer::new(seeded_config()).unwrap();
        localizer.set_pose(3.0, 3.0, 0.0, AngleUnit::Radians, false).unwrap();
        assert!(!localizer.filter().is_initialized());
    }

    #[test]
    fn test_odom_update_before_seeding_fails_loudly() {
        let mut localizer = Localizer::new(seeded_config()).unwrap();
        let result = localizer.odom_update(Pose::new(1.0, 0.0, 0.0));

        assert!(matches!(result, Err(LocalizationError::Uninitialized)));
        // dead reckoning still applied
        assert_eq!(localizer.get_pose(AngleUnit::Radians, false).x, 1.0);
    }

    #[test]
    fn test_non_finite_delta_rejected() {
        let mut localizer = Localizer::new(seeded_config()).unwrap();
        localizer.set_pose(0.0, 0.0, 0.0, AngleUnit::Radians, true).unwrap();

        let result = localizer.odom_update(Pose::new(f64::NAN, 0.0, 0.0));
        assert!(matches!(result, Err(LocalizationError::InvalidMotion { .. })));
        assert_eq!(localizer.get_pose(AngleUnit::Radians, false), Pose::default());
    }

    #[test]
    fn test_heading_comes_from_dead_reckoning() {
        let mut localizer = Localizer::new(seeded_config()).unwrap();
        localizer.set_pose(0.0, 0.0, 0.0, AngleUnit::Radians, true).unwrap();
        localizer.odom_update(Pose::new(0.0, 0.0, 0.25)).unwrap();
        localizer.odom_update(Pose::new(0.0, 0.0, 0.25)).unwrap();

        assert_relative_eq!(localizer.get_pose(AngleUnit::Radians, false).theta, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_tracks_dead_reckoning_without_readings() {
        let mut localizer = Localizer::new(seeded_config()).unwrap();
        localizer.add_sensor(DistanceSensor::new("front", Pose::default()));
        localizer.set_pose(0.0, 0.0, 0.0, AngleUnit::Radians, true).unwrap();

        for _ in 0..10 {
            localizer.odom_update(Pose::new(1.0, 0.5, 0.0)).unwrap();
        }

        let pose = localizer.get_pose(AngleUnit::Radians, false);
        assert!((pose.x - 10.0).abs() < 1.0, "x = {}", pose.x);
        assert!((pose.y - 5.0).abs() < 1.0, "y = {}", pose.y);
        assert!(!localizer.filter().stats().degenerate);
    }

    #[test]
    fn test_custom_pose_source_receives_corrections() {
        let mut localizer = Localizer::with_pose_source(RecordingChassis::default(), seeded_config()).unwrap();
        localizer.set_pose(0.0, 0.0, 0.0, AngleUnit::Radians, true).unwrap();
        localizer.odom_update(Pose::new(0.5, 0.0, 0.1)).unwrap();

        // set_pose, dead reckoning, correction
        assert_eq!(localizer.pose_source().corrections, 3);
        assert_relative_eq!(localizer.pose_source().pose.theta, 0.1);
    }

    #[test]
    fn test_unknown_sensor_name() {
        let mut localizer = Localizer::new(seeded_config()).unwrap();
        localizer.add_sensor(DistanceSensor::new("left", Pose::new(0.0, 0.0, FRAC_PI_2)));

        assert!(localizer.update_sensor_by_name("left", 20.0, 5.0).is_ok());
        assert!(matches!(
            localizer.update_sensor_by_name("rear", 20.0, 5.0),
            Err(LocalizationError::UnknownSensor(_))
        ));
    }

    #[test]
    fn test_motion_noise_has_floor_at_standstill() {
        let config = MotionNoiseConfig::default();
        let mut noise = MotionNoise::new(&config, &Pose::default()).unwrap();
        let mut rng = rand::SeedableRng::seed_from_u64(3);

        let samples: Vec<Vector2<f64>> = (0..200).map(|_| noise.sample(&mut rng)).collect();
        assert!(samples.iter().any(|s| s.norm() > 0.0));
        assert!(samples.iter().all(|s| s.norm() < 0.01));
    }
}
