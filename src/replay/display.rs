//! Renderer-ready buffers for one frame.

use std::collections::HashSet;

use cgmath::{InnerSpace, Quaternion, Vector3};

use crate::schema::{ParticleFrame, ParticleId};

/// Highlight state of a particle with nothing special going on.
pub const HIGHLIGHT_NORMAL: i32 = 0;
/// Reactant or partner of a reaction triggered this frame.
pub const HIGHLIGHT_REACTING: i32 = 1;
/// Faded out because another particle is being tracked.
pub const HIGHLIGHT_DIMMED: i32 = -1;

/// Axis that surface particle meshes point along at rest.
pub const FORWARD: Vector3<f32> = Vector3 {
    x: 0.0,
    y: 0.0,
    z: 1.0,
};

/// Per-particle buffers, one entry per live particle in archive order.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayFrame {
    pub frame: usize,
    pub ids: Vec<ParticleId>,
    /// `[x, y, z, 1]`.
    pub positions: Vec<[f32; 4]>,
    /// Quaternions as `[x, y, z, w]`.
    pub rotations: Vec<[f32; 4]>,
    pub highlights: Vec<i32>,
}

impl DisplayFrame {
    /// Build display buffers for a decoded frame.
    ///
    /// Reacting particles stay highlighted while tracking; everything else
    /// except the tracked particle is dimmed.
    pub fn build(
        particles: &ParticleFrame,
        reacting: &HashSet<ParticleId>,
        tracked: Option<ParticleId>,
    ) -> Self {
        let n = particles.len();
        let mut out = Self {
            frame: particles.frame,
            ids: Vec::with_capacity(n),
            positions: Vec::with_capacity(n),
            rotations: Vec::with_capacity(n),
            highlights: Vec::with_capacity(n),
        };

        for record in particles.iter() {
            let p = record.position;
            out.ids.push(record.id);
            out.positions.push([p.x, p.y, p.z, 1.0]);
            out.rotations.push(if record.is_surface() {
                surface_rotation(record.orientation)
            } else {
                IDENTITY
            });

            let highlight = if reacting.contains(&record.id) {
                HIGHLIGHT_REACTING
            } else if tracked.is_some_and(|t| t != record.id) {
                HIGHLIGHT_DIMMED
            } else {
                HIGHLIGHT_NORMAL
            };
            out.highlights.push(highlight);
        }

        out
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

const IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Rotation taking [`FORWARD`] onto `orientation`.
pub fn surface_rotation(orientation: Vector3<f32>) -> [f32; 4] {
    let q = Quaternion::from_arc(FORWARD, orientation.normalize(), None);
    [q.v.x, q.v.y, q.v.z, q.s]
}
