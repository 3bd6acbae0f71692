//! Simulator-space to viewer-space coordinate mapping.

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use super::ParticleRecord;

/// Default uniform scale from simulator units to viewer units.
pub const DEFAULT_VIEWER_SCALE: f32 = 25.0;

/// Coordinate transform applied to decoded frames and logged event positions.
///
/// The viewer mapping mirrors X, rotates -90° about X and scales uniformly.
/// Orientations are rotated the same way and then have their Y axis flipped.
/// All of it is an exact axis permutation, so repeated application is
/// bit-reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpaceTransform {
    /// Keep simulator coordinates.
    Identity,
    /// Map into viewer space.
    Viewer { scale: f32 },
}

impl Default for SpaceTransform {
    fn default() -> Self {
        SpaceTransform::Viewer {
            scale: DEFAULT_VIEWER_SCALE,
        }
    }
}

impl SpaceTransform {
    /// Map a position (particle or reaction event).
    #[inline]
    pub fn position(&self, p: Vector3<f32>) -> Vector3<f32> {
        match *self {
            SpaceTransform::Identity => p,
            SpaceTransform::Viewer { scale } => Vector3::new(-p.x, p.z, -p.y) * scale,
        }
    }

    /// Map a surface orientation.
    #[inline]
    pub fn orientation(&self, o: Vector3<f32>) -> Vector3<f32> {
        match *self {
            SpaceTransform::Identity => o,
            SpaceTransform::Viewer { .. } => Vector3::new(o.x, -o.z, -o.y),
        }
    }

    pub fn apply(&self, record: &mut ParticleRecord) {
        record.position = self.position(record.position);
        record.orientation = self.orientation(record.orientation);
    }
}
