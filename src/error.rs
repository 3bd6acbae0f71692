//! Error types shared across the crate.

use std::io;
use std::path::PathBuf;

use crate::schema::{ConfigError, ParticleId};

/// Errors raised while loading or analysing a replay.
///
/// Inputs are static artifacts from a finished simulator run, so none of
/// these are transient and nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// A required input file does not exist.
    #[error("No {role} file found at: {}", path.display())]
    MissingFile { role: &'static str, path: PathBuf },

    /// Input bytes could not be decoded.
    #[error("Malformed data: {0}")]
    MalformedData(String),

    /// A frame, window or LOD argument is outside its valid bounds.
    #[error("Out of range: {0}")]
    Range(String),

    /// A tracked particle is absent from a frame it is required in.
    #[error("Particle {id} not present in frame {frame}")]
    Lookup { id: ParticleId, frame: usize },

    /// Reaction cache could not be read or written.
    #[error("Reaction cache error: {0}")]
    Cache(String),

    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ReplayError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ReplayError::MalformedData(msg.into())
    }

    pub(crate) fn range(msg: impl Into<String>) -> Self {
        ReplayError::Range(msg.into())
    }
}

pub type Result<T, E = ReplayError> = std::result::Result<T, E>;
