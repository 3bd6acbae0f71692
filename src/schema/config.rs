//! Configuration types for replay inputs and analysis parameters.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::SpaceTransform;

/// Default particle capacity of one archived frame.
pub const DEFAULT_PARTICLE_CAPACITY: usize = 4000;

/// Type code of the catalyst species that partners every reaction.
pub const DEFAULT_CATALYST_TYPE: i32 = 2;

/// Default simulator time step per frame in seconds.
pub const DEFAULT_TIME_STEP: f64 = 5e-8;

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".cell-replay")
}

/// Top-level replay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayConfig {
    /// Compressed frame archive.
    pub data_path: PathBuf,
    /// Cumulative frame offset table.
    pub index_path: PathBuf,
    /// Raw reaction log.
    pub reaction_log_path: PathBuf,
    /// Directory holding reconstructed reaction tables.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    /// Records per decompressed frame.
    pub particle_capacity: usize,
    /// Species type acting as reaction partner.
    pub catalyst_type: i32,
    /// Mapping from simulator space to output space.
    #[serde(default)]
    pub transform: SpaceTransform,
    /// Simulated seconds between consecutive frames.
    pub time_step: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("viz_data/data.bin"),
            index_path: PathBuf::from("viz_data/index.bin"),
            reaction_log_path: PathBuf::from("rxn_data/reactions.txt"),
            cache_dir: default_cache_dir(),
            particle_capacity: DEFAULT_PARTICLE_CAPACITY,
            catalyst_type: DEFAULT_CATALYST_TYPE,
            transform: SpaceTransform::default(),
            time_step: DEFAULT_TIME_STEP,
        }
    }
}

impl ReplayConfig {
    /// Default configuration rooted at a simulation output directory.
    pub fn in_dir(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let defaults = Self::default();
        Self {
            data_path: root.join(defaults.data_path),
            index_path: root.join(defaults.index_path),
            reaction_log_path: root.join(defaults.reaction_log_path),
            cache_dir: root.join(defaults.cache_dir),
            ..defaults
        }
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.particle_capacity == 0 {
            return Err(ConfigError::InvalidCapacity);
        }
        if self.time_step.is_nan() || self.time_step <= 0.0 {
            return Err(ConfigError::InvalidTimeStep);
        }
        if let SpaceTransform::Viewer { scale } = self.transform
            && (!scale.is_finite() || scale <= 0.0)
        {
            return Err(ConfigError::InvalidScale(scale));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Particle capacity must be non-zero")]
    InvalidCapacity,
    #[error("Time step must be positive")]
    InvalidTimeStep,
    #[error("Viewer scale must be positive and finite, got {0}")]
    InvalidScale(f32),
}
