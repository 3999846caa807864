//! Error types for the localization core

use thiserror::Error;

/// Errors raised by the localization core
#[derive(Error, Debug)]
pub enum LocalizationError {
    /// The filter was used before `init_norm_dist` seeded it.
    #[error("particle filter used before initialization")]
    Uninitialized,

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("unknown parameter `{0}`")]
    UnknownParameter(String),

    #[error("unknown sensor `{0}`")]
    UnknownSensor(String),

    #[error("non-finite odometry delta ({x}, {y}, {theta})")]
    InvalidMotion { x: f64, y: f64, theta: f64 },

    #[error("noise distribution error: {0}")]
    Noise(#[from] rand_distr::NormalError),

    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl LocalizationError {
    pub(crate) fn invalid(name: &str, reason: &str) -> Self {
        LocalizationError::InvalidParameter {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LocalizationError>;
