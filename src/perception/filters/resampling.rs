//! Resampling strategies for the particle filter

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Draws a new population, with replacement, proportional to weight
pub trait Resampler: Debug + Send {
    /// Get the name of this strategy
    fn name(&self) -> &str;

    /// Indices of the particles to keep. `weights` are normalized; the result
    /// has exactly `weights.len()` entries.
    fn resample(&self, weights: &[f64], rng: &mut StdRng) -> Vec<usize>;
}

/// Low-variance (systematic) resampling: one random offset, N evenly spaced pointers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystematicResampler;

impl Resampler for SystematicResampler {
    fn name(&self) -> &str {
        "systematic"
    }

    fn resample(&self, weights: &[f64], rng: &mut StdRng) -> Vec<usize> {
        let n = weights.len();
        if n == 0 {
            return Vec::new();
        }

        let step = 1.0 / n as f64;
        let mut pointer = rng.gen::<f64>() * step;
        let mut cumulative = weights[0];
        let mut idx = 0;
        let mut selected = Vec::with_capacity(n);

        for _ in 0..n {
            while pointer > cumulative && idx < n - 1 {
                idx += 1;
                cumulative += weights[idx];
            }
            selected.push(idx);
            pointer += step;
        }

        selected
    }
}

/// Independent draws from the categorical distribution over weights
#[derive(Debug, Clone, Copy, Default)]
pub struct MultinomialResampler;

impl Resampler for MultinomialResampler {
    fn name(&self) -> &str {
        "multinomial"
    }

    fn resample(&self, weights: &[f64], rng: &mut StdRng) -> Vec<usize> {
        let n = weights.len();
        match WeightedIndex::new(weights) {
            Ok(dist) => (0..n).map(|_| dist.sample(rng)).collect(),
            // all-zero or invalid weights: fall back to uniform draws
            Err(_) => (0..n).map(|_| rng.gen_range(0..n)).collect(),
        }
    }
}

/// Resampling strategy selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplerKind {
    #[default]
    Systematic,
    Multinomial,
}

impl ResamplerKind {
    pub fn build(self) -> Box<dyn Resampler> {
        match self {
            ResamplerKind::Systematic => Box::new(SystematicResampler),
            ResamplerKind::Multinomial => Box::new(MultinomialResampler),
        }
    }
}

/// When to resample after a weighting step
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResamplePolicy {
    /// Resample every cycle
    #[default]
    Always,
    /// Resample only when Neff / N drops below `ratio`
    EffectiveSampleSize { ratio: f64 },
}

impl ResamplePolicy {
    pub fn should_resample(&self, effective_sample_size: f64, num_particles: usize) -> bool {
        match *self {
            ResamplePolicy::Always => true,
            ResamplePolicy::EffectiveSampleSize { ratio } => {
                effective_sample_size < ratio * num_particles as f64
            }
        }
    }
}
