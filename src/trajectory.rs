//! Level-of-detail trajectories for a tracked particle.
//!
//! A trajectory blends the exact per-frame path of one particle with the
//! straight line between its first and last position:
//!
//! ```text
//! vertex[i] = exact[i] * (1 - lod) + linear[i] * lod
//! ```
//!
//! `lod = 0` gives the exact path and `lod = 1` the straight line. Building
//! the exact path costs one frame decode per frame in the window, so both
//! paths are cached per `(id, window)` and re-blending is cheap.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use cgmath::Vector3;

use crate::archive::FrameSource;
use crate::error::{ReplayError, Result};
use crate::schema::ParticleId;

/// Exact and linearized paths over one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub exact: Vec<Vector3<f32>>,
    pub linear: Vec<Vector3<f32>>,
}

impl Track {
    /// Derive the linear path from exact positions.
    pub fn from_exact(exact: Vec<Vector3<f32>>) -> Self {
        let n = exact.len();
        let linear = match (exact.first(), exact.last()) {
            (Some(&first), Some(&last)) if n > 1 => (0..n)
                .map(|i| {
                    let t = i as f32 / (n - 1) as f32;
                    first * (1.0 - t) + last * t
                })
                .collect(),
            _ => exact.clone(),
        };
        Self { exact, linear }
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }

    /// Blend the two paths.
    pub fn blend(&self, lod: f32) -> Vec<Vector3<f32>> {
        self.exact
            .iter()
            .zip(&self.linear)
            .map(|(&exact, &linear)| exact * (1.0 - lod) + linear * lod)
            .collect()
    }
}

/// A blended polyline for one particle.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub id: ParticleId,
    /// First frame of the window.
    pub start: usize,
    /// One past the last frame of the window.
    pub end: usize,
    pub lod: f32,
    /// One vertex per frame in the window.
    pub vertices: Vec<Vector3<f32>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TrackKey {
    id: ParticleId,
    start: usize,
    end: usize,
}

/// Builds and caches trajectories.
#[derive(Debug, Default)]
pub struct TrajectoryBuilder {
    tracks: HashMap<TrackKey, Track>,
}

impl TrajectoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact and linear paths of `id` over frames `start..end`.
    ///
    /// Fails with `Range` for an empty or out-of-bounds window and with
    /// `Lookup` if the particle is missing from any frame in it.
    pub fn track<S>(
        &mut self,
        source: &mut S,
        id: ParticleId,
        start: usize,
        end: usize,
    ) -> Result<&Track>
    where
        S: FrameSource + ?Sized,
    {
        let frame_count = source.frame_count();
        if end <= start || end > frame_count {
            return Err(ReplayError::range(format!(
                "trajectory window {}..{} invalid for {} frames",
                start, end, frame_count
            )));
        }

        match self.tracks.entry(TrackKey { id, start, end }) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut exact = Vec::with_capacity(end - start);
                for frame in start..end {
                    let particles = source.load_frame(frame)?;
                    let record = particles
                        .get(id)
                        .ok_or(ReplayError::Lookup { id, frame })?;
                    exact.push(record.position);
                }
                log::debug!("Built trajectory for {} over frames {}..{}", id, start, end);
                Ok(entry.insert(Track::from_exact(exact)))
            }
        }
    }

    /// Blended trajectory of `id` over frames `start..end` at `lod`.
    pub fn build<S>(
        &mut self,
        source: &mut S,
        id: ParticleId,
        start: usize,
        end: usize,
        lod: f32,
    ) -> Result<Trajectory>
    where
        S: FrameSource + ?Sized,
    {
        if !(0.0..=1.0).contains(&lod) {
            return Err(ReplayError::range(format!("LOD {} outside [0, 1]", lod)));
        }

        let vertices = self.track(source, id, start, end)?.blend(lod);
        Ok(Trajectory {
            id,
            start,
            end,
            lod,
            vertices,
        })
    }

    pub fn is_cached(&self, id: ParticleId, start: usize, end: usize) -> bool {
        self.tracks.contains_key(&TrackKey { id, start, end })
    }

    pub fn clear_cache(&mut self) {
        self.tracks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ParticleFrame, ParticleRecord};
    use proptest::prelude::*;

    /// Counts decodes so cache hits can be observed.
    struct CountingSource {
        frames: Vec<ParticleFrame>,
        loads: usize,
    }

    impl FrameSource for CountingSource {
        fn frame_count(&self) -> usize {
            self.frames.len()
        }

        fn load_frame(&mut self, frame: usize) -> Result<ParticleFrame> {
            self.loads += 1;
            self.frames.load_frame(frame)
        }
    }

    /// Particle 1 moves along a parabola; particle 2 vanishes at frame 3.
    fn source(frames: usize) -> CountingSource {
        let frames = (0..frames)
            .map(|f| {
                let x = f as f32;
                let mut records = vec![ParticleRecord::new(1, 1, Vector3::new(x, x * x, 0.0))];
                if f < 3 {
                    records.push(ParticleRecord::new(1, 2, Vector3::new(0.0, 0.0, 0.0)));
                }
                ParticleFrame::from_records(f, records).unwrap()
            })
            .collect();
        CountingSource { frames, loads: 0 }
    }

    #[test]
    fn test_lod_bounds_reproduce_paths() {
        let mut src = source(5);
        let mut builder = TrajectoryBuilder::new();

        let exact = builder.build(&mut src, 1, 0, 5, 0.0).unwrap();
        let linear = builder.build(&mut src, 1, 0, 5, 1.0).unwrap();
        let track = builder.track(&mut src, 1, 0, 5).unwrap();

        assert_eq!(exact.vertices, track.exact);
        assert_eq!(linear.vertices, track.linear);
        assert_eq!(track.exact[2], Vector3::new(2.0, 4.0, 0.0));
        assert_eq!(track.linear[2], Vector3::new(2.0, 8.0, 0.0));
    }

    #[test]
    fn test_half_lod_is_midpoint() {
        let mut src = source(5);
        let mut builder = TrajectoryBuilder::new();
        let half = builder.build(&mut src, 1, 0, 5, 0.5).unwrap();
        assert_eq!(half.vertices[2], Vector3::new(2.0, 6.0, 0.0));
        assert_eq!(half.vertices.len(), 5);
    }

    #[test]
    fn test_reblend_uses_cache() {
        let mut src = source(6);
        let mut builder = TrajectoryBuilder::new();

        builder.build(&mut src, 1, 1, 6, 0.2).unwrap();
        assert_eq!(src.loads, 5);
        assert!(builder.is_cached(1, 1, 6));

        builder.build(&mut src, 1, 1, 6, 0.9).unwrap();
        assert_eq!(src.loads, 5);

        builder.clear_cache();
        builder.build(&mut src, 1, 1, 6, 0.9).unwrap();
        assert_eq!(src.loads, 10);
    }

    #[test]
    fn test_single_frame_window() {
        let mut src = source(3);
        let mut builder = TrajectoryBuilder::new();
        let t = builder.build(&mut src, 1, 2, 3, 1.0).unwrap();
        assert_eq!(t.vertices, vec![Vector3::new(2.0, 4.0, 0.0)]);
    }

    #[test]
    fn test_window_errors() {
        let mut src = source(4);
        let mut builder = TrajectoryBuilder::new();

        assert!(matches!(builder.build(&mut src, 1, 2, 2, 0.0), Err(ReplayError::Range(_))));
        assert!(matches!(builder.build(&mut src, 1, 3, 1, 0.0), Err(ReplayError::Range(_))));
        assert!(matches!(builder.build(&mut src, 1, 0, 5, 0.0), Err(ReplayError::Range(_))));
        assert!(matches!(builder.build(&mut src, 1, 0, 4, 1.5), Err(ReplayError::Range(_))));
        assert!(matches!(builder.build(&mut src, 1, 0, 4, f32::NAN), Err(ReplayError::Range(_))));
        assert!(builder.build(&mut src, 1, 0, 4, 0.0).is_ok());
    }

    #[test]
    fn test_missing_particle_is_lookup_error() {
        let mut src = source(5);
        let mut builder = TrajectoryBuilder::new();

        assert!(builder.build(&mut src, 2, 0, 3, 0.0).is_ok());
        let err = builder.build(&mut src, 2, 0, 5, 0.0).unwrap_err();
        assert!(matches!(err, ReplayError::Lookup { id: 2, frame: 3 }));
        assert!(!builder.is_cached(2, 0, 5));
    }

    proptest! {
        #[test]
        fn prop_blend_stays_between_paths(lod in 0.0f32..=1.0, len in 2usize..20) {
            let mut src = source(len);
            let mut builder = TrajectoryBuilder::new();
            let t = builder.build(&mut src, 1, 0, len, lod).unwrap();
            let track = builder.track(&mut src, 1, 0, len).unwrap();

            for (i, v) in t.vertices.iter().enumerate() {
                let (a, b) = (track.exact[i], track.linear[i]);
                let (lo, hi) = (a.y.min(b.y), a.y.max(b.y));
                let eps = 1e-3 * hi.abs().max(1.0);
                prop_assert!(v.y >= lo - eps && v.y <= hi + eps);
            }
            // Endpoints coincide for every LOD.
            let last = t.vertices.len() - 1;
            prop_assert!((t.vertices[0] - track.exact[0]).y.abs() < 1e-3);
            prop_assert!((t.vertices[last] - track.exact[last]).y.abs() < 1e-2);
        }
    }
}
