//! Particle filter (Monte Carlo localization)
//!
//! The filter estimates position only. Heading is trusted from dead
//! reckoning and read through a [`PoseProvider`] on every cycle.
//!
//! Each [`ParticleFilter::update`] runs, in order: motion, weighting,
//! normalization and resampling. The prediction is the weighted centroid
//! taken between normalization and resampling.
pub mod resampling;

use self::resampling::{ResamplePolicy, Resampler, ResamplerKind};
use crate::common::field::Field;
use crate::common::Pose;
use crate::error::{LocalizationError, Result};
use crate::perception::pose_store::PoseProvider;
use crate::perception::sensors::Sensor;
use log::{debug, info, warn};
use nalgebra::{Matrix2, Vector2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One position hypothesis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub location: Vector2<f64>,
    pub weight: f64,
}

/// Handle returned when a sensor is registered with the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SensorId(pub usize);

/// Upper bound on the population size
pub const MAX_PARTICLES: usize = 1_000_000;

/// Configuration for the particle filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleFilterConfig {
    /// Population size, fixed for the filter's lifetime
    pub num_particles: usize,
    /// Seed for the random source; `None` seeds from entropy
    pub seed: Option<u64>,
    pub resampler: ResamplerKind,
    pub resample_policy: ResamplePolicy,
}

impl Default for ParticleFilterConfig {
    fn default() -> Self {
        ParticleFilterConfig {
            num_particles: 500,
            seed: None,
            resampler: ResamplerKind::Systematic,
            resample_policy: ResamplePolicy::Always,
        }
    }
}

impl ParticleFilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.num_particles == 0 {
            return Err(LocalizationError::invalid("num_particles", "must be at least 1"));
        }
        if self.num_particles > MAX_PARTICLES {
            return Err(LocalizationError::invalid("num_particles", "exceeds MAX_PARTICLES"));
        }
        if let ResamplePolicy::EffectiveSampleSize { ratio } = self.resample_policy {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(LocalizationError::invalid("resample_ratio", "must be in (0, 1]"));
            }
        }
        Ok(())
    }

    /// Apply string-keyed overrides. On error `self` is left untouched.
    pub fn configure(&mut self, params: &HashMap<String, f64>) -> Result<()> {
        let mut candidate = self.clone();
        for (key, &value) in params {
            match key.as_str() {
                "num_particles" => {
                    if !(1.0..=MAX_PARTICLES as f64).contains(&value) || value.fract() != 0.0 {
                        return Err(LocalizationError::invalid(key, "must be an integer in [1, MAX_PARTICLES]"));
                    }
                    candidate.num_particles = value as usize;
                }
                "seed" => {
                    if !(0.0..u64::MAX as f64).contains(&value) || value.fract() != 0.0 {
                        return Err(LocalizationError::invalid(key, "must be an integer in [0, 2^64)"));
                    }
                    candidate.seed = Some(value as u64);
                }
                "resample_ratio" => {
                    candidate.resample_policy = ResamplePolicy::EffectiveSampleSize { ratio: value };
                }
                _ => return Err(LocalizationError::UnknownParameter(key.clone())),
            }
        }
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}

/// Diagnostics from the most recent update
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterStats {
    /// Total number of updates
    pub iterations: u64,
    /// Neff after normalization
    pub effective_sample_size: f64,
    /// Largest normalized weight
    pub max_weight: f64,
    pub resampled: bool,
    /// Whether the last weighting step fell back to uniform weights
    pub degenerate: bool,
    pub degenerate_cycles: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterState {
    Uninitialized,
    Tracking,
}

/// Monte Carlo localization over a fixed-size particle population
#[derive(Debug)]
pub struct ParticleFilter {
    config: ParticleFilterConfig,
    particles: Vec<Particle>,
    sensors: Vec<Box<dyn Sensor>>,
    field: Field,
    resampler: Box<dyn Resampler>,
    rng: StdRng,
    state: FilterState,
    prediction: Vector2<f64>,
    stats: FilterStats,
}

impl ParticleFilter {
    /// Create an unseeded filter; call [`ParticleFilter::init_norm_dist`] before updating
    pub fn new(config: ParticleFilterConfig, field: Field) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let n = config.num_particles;
        let particles = vec![
            Particle {
                location: Vector2::zeros(),
                weight: 1.0 / n as f64,
            };
            n
        ];

        Ok(ParticleFilter {
            resampler: config.resampler.build(),
            config,
            particles,
            sensors: Vec::new(),
            field,
            rng,
            state: FilterState::Uninitialized,
            prediction: Vector2::zeros(),
            stats: FilterStats::default(),
        })
    }

    /// Register a sensor consulted during weighting
    pub fn add_sensor(&mut self, sensor: Box<dyn Sensor>) -> SensorId {
        self.sensors.push(sensor);
        SensorId(self.sensors.len() - 1)
    }

    pub fn sensor_mut(&mut self, id: SensorId) -> Option<&mut (dyn Sensor + 'static)> {
        self.sensors.get_mut(id.0).map(|s| &mut **s)
    }

    pub fn sensor_id(&self, name: &str) -> Option<SensorId> {
        self.sensors.iter().position(|s| s.name() == name).map(SensorId)
    }

    pub fn sensors(&self) -> impl Iterator<Item = &(dyn Sensor + 'static)> {
        self.sensors.iter().map(|s| &**s)
    }

    /// Swap the resampling strategy
    pub fn set_resampler(&mut self, resampler: Box<dyn Resampler>) {
        self.resampler = resampler;
    }

    pub fn config(&self) -> &ParticleFilterConfig {
        &self.config
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    /// Current particles (for visualization)
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn num_particles(&self) -> usize {
        self.particles.len()
    }

    pub fn is_initialized(&self) -> bool {
        self.state == FilterState::Tracking
    }

    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// The random source shared by seeding, motion sampling and resampling
    pub fn rng_mut(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Seed every particle from independent normals around `seed` (x, y only)
    pub fn init_norm_dist(&mut self, seed: Pose, spread: Vector2<f64>) -> Result<()> {
        if !spread.iter().all(|s| *s > 0.0 && s.is_finite()) {
            return Err(LocalizationError::invalid("spread", "must be positive and finite"));
        }
        let x_dist = Normal::new(seed.x, spread.x)?;
        let y_dist = Normal::new(seed.y, spread.y)?;
        let weight = 1.0 / self.particles.len() as f64;

        for particle in &mut self.particles {
            particle.location = Vector2::new(x_dist.sample(&mut self.rng), y_dist.sample(&mut self.rng));
            particle.weight = weight;
        }

        self.prediction = self.weighted_mean();
        self.state = FilterState::Tracking;
        info!(
            "Seeded {} particles around ({:.2}, {:.2}) with spread ({:.2}, {:.2})",
            self.particles.len(),
            seed.x,
            seed.y,
            spread.x,
            spread.y
        );
        Ok(())
    }

    /// Run one filter cycle.
    ///
    /// `motion_sampler` is called once per particle and returns that
    /// particle's noisy displacement. `heading` supplies the trusted heading
    /// used to cast sensor rays.
    pub fn update<H, F>(&mut self, heading: &H, mut motion_sampler: F) -> Result<()>
    where
        H: PoseProvider + ?Sized,
        F: FnMut(&mut StdRng) -> Vector2<f64>,
    {
        if !self.is_initialized() {
            return Err(LocalizationError::Uninitialized);
        }

        for particle in &mut self.particles {
            particle.location += motion_sampler(&mut self.rng);
        }

        self.weigh(heading.standard_heading());
        let degenerate = self.normalize();

        let sum_sq: f64 = self.particles.iter().map(|p| p.weight * p.weight).sum();
        self.stats.iterations += 1;
        self.stats.degenerate = degenerate;
        if degenerate {
            self.stats.degenerate_cycles += 1;
        }
        self.stats.effective_sample_size = 1.0 / sum_sq;
        self.stats.max_weight = self.particles.iter().map(|p| p.weight).fold(0.0, f64::max);

        self.prediction = self.weighted_mean();

        self.stats.resampled = self
            .config
            .resample_policy
            .should_resample(self.stats.effective_sample_size, self.particles.len());
        if self.stats.resampled {
            self.resample();
        }

        debug!(
            "Filter cycle {}: prediction ({:.2}, {:.2}), neff {:.1}, resampled {}",
            self.stats.iterations,
            self.prediction.x,
            self.prediction.y,
            self.stats.effective_sample_size,
            self.stats.resampled
        );
        Ok(())
    }

    /// Weighted centroid of the population before the last resample
    pub fn prediction(&self) -> Result<Vector2<f64>> {
        if !self.is_initialized() {
            return Err(LocalizationError::Uninitialized);
        }
        Ok(self.prediction)
    }

    /// Weighted covariance of the particle positions
    pub fn position_covariance(&self) -> Result<Matrix2<f64>> {
        if !self.is_initialized() {
            return Err(LocalizationError::Uninitialized);
        }
        let mean = self.weighted_mean();
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        let cov = self
            .particles
            .iter()
            .map(|p| {
                let d = p.location - mean;
                d * d.transpose() * p.weight
            })
            .fold(Matrix2::zeros(), |acc, m| acc + m);
        Ok(cov / total)
    }

    /// Multiply each weight by the product of all sensor likelihoods
    fn weigh(&mut self, heading: f64) {
        for particle in &mut self.particles {
            let likelihood: f64 = self
                .sensors
                .iter()
                .map(|s| s.likelihood(&particle.location, heading, &self.field))
                .product();
            let weight = particle.weight * likelihood;
            particle.weight = if weight.is_finite() && weight > 0.0 { weight } else { 0.0 };
        }
    }

    /// Normalize weights to sum to one. Returns true if the step was
    /// degenerate and uniform weights were substituted.
    fn normalize(&mut self) -> bool {
        let sum: f64 = self.particles.iter().map(|p| p.weight).sum();
        if sum > 0.0 && sum.is_finite() {
            for particle in &mut self.particles {
                particle.weight /= sum;
            }
            false
        } else {
            warn!("Degenerate particle weights (sum {}), falling back to uniform", sum);
            self.set_uniform_weights();
            true
        }
    }

    fn resample(&mut self) {
        let weights: Vec<f64> = self.particles.iter().map(|p| p.weight).collect();
        let indices = self.resampler.resample(&weights, &mut self.rng);
        debug_assert_eq!(indices.len(), self.particles.len());

        let resampled: Vec<Particle> = indices.iter().map(|&i| self.particles[i]).collect();
        self.particles = resampled;
        self.set_uniform_weights();
    }

    fn set_uniform_weights(&mut self) {
        let weight = 1.0 / self.particles.len() as f64;
        for particle in &mut self.particles {
            particle.weight = weight;
        }
    }

    fn weighted_mean(&self) -> Vector2<f64> {
        let total: f64 = self.particles.iter().map(|p| p.weight).sum();
        let sum = self
            .particles
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.location * p.weight);
        sum / total
    }
}
