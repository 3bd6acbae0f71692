//! Playback over an archive with its reconstructed reactions.

use std::collections::HashSet;

use super::display::DisplayFrame;
use crate::archive::{FrameIndex, FrameStore};
use crate::error::{ReplayError, Result};
use crate::reaction::{
    CacheKey, CacheStatus, Diagnostic, KeyParams, ReactionCache, ReactionReconstructor,
    ReactionTimeline, load_reaction_log,
};
use crate::schema::{ParticleFrame, ParticleId, ReactionRecord, ReplayConfig};
use crate::trajectory::{Trajectory, TrajectoryBuilder};

/// A replay opened from a simulator output directory.
///
/// The playhead starts at frame 0. Moving it forward triggers the reactions
/// logged in the frames passed over; their participants stay highlighted
/// until the playhead moves again.
pub struct ReplaySession {
    config: ReplayConfig,
    store: FrameStore,
    timeline: ReactionTimeline,
    diagnostics: Vec<Diagnostic>,
    cache_status: CacheStatus,
    trajectories: TrajectoryBuilder,
    current: usize,
    triggered: Vec<ReactionRecord>,
    reacting: HashSet<ParticleId>,
}

impl ReplaySession {
    /// Open all inputs named by `config`, reconstructing reactions on a
    /// cache miss.
    pub fn open(config: ReplayConfig) -> Result<Self> {
        config.validate()?;

        for (role, path) in [
            ("archive", &config.data_path),
            ("index", &config.index_path),
            ("reaction log", &config.reaction_log_path),
        ] {
            if !path.exists() {
                return Err(ReplayError::MissingFile {
                    role,
                    path: path.clone(),
                });
            }
        }

        let index = FrameIndex::load(&config.index_path)?;
        let mut store = FrameStore::open(
            &config.data_path,
            index,
            config.particle_capacity,
            config.transform,
        )?;
        let raw = load_reaction_log(&config.reaction_log_path, config.transform)?;

        let key = CacheKey::compute(
            &config.index_path,
            &config.data_path,
            &config.reaction_log_path,
            &KeyParams {
                particle_capacity: config.particle_capacity,
                catalyst_type: config.catalyst_type,
                transform: config.transform,
            },
        )?;
        let cache = ReactionCache::new(&config.cache_dir);
        let reconstructor = ReactionReconstructor::new(config.catalyst_type);
        let (reconstruction, cache_status) =
            cache.load_or_reconstruct(&key, &raw, &mut store, &reconstructor)?;

        if !reconstruction.is_consistent() {
            log::warn!(
                "Reconstruction finished with {} diagnostics",
                reconstruction.diagnostics.len()
            );
        }
        log::info!(
            "Replay ready: {} frames, {} reactions (cache {:?})",
            store.index().frame_count(),
            reconstruction.reactions.len(),
            cache_status
        );

        Ok(Self {
            config,
            store,
            timeline: ReactionTimeline::new(reconstruction.reactions),
            diagnostics: reconstruction.diagnostics,
            cache_status,
            trajectories: TrajectoryBuilder::new(),
            current: 0,
            triggered: Vec::new(),
            reacting: HashSet::new(),
        })
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn frame_count(&self) -> usize {
        self.store.index().frame_count()
    }

    pub fn current_frame(&self) -> usize {
        self.current
    }

    pub fn reactions(&self) -> &ReactionTimeline {
        &self.timeline
    }

    /// Diagnostics from reconstruction. Empty on a cache hit.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn cache_status(&self) -> CacheStatus {
        self.cache_status
    }

    /// Reactions triggered by the last move of the playhead.
    pub fn triggered(&self) -> &[ReactionRecord] {
        &self.triggered
    }

    /// Jump to `frame`, clearing any ongoing reactions.
    pub fn seek(&mut self, frame: usize) -> Result<()> {
        if frame >= self.frame_count() {
            return Err(ReplayError::range(format!(
                "frame {} out of range ({} frames)",
                frame,
                self.frame_count()
            )));
        }
        self.current = frame;
        self.set_triggered(Vec::new());
        Ok(())
    }

    /// Move the playhead by `delta` frames, wrapping at both ends.
    ///
    /// Forward moves trigger the reactions of every frame passed over,
    /// including the one landed on. Backward moves trigger nothing.
    pub fn step(&mut self, delta: i64) -> Result<&[ReactionRecord]> {
        let count = self.frame_count();
        if count == 0 {
            return Err(ReplayError::range("archive has no frames"));
        }

        let previous = self.current;
        let offset = delta.rem_euclid(count as i64) as usize;
        let next = (previous + offset) % count;
        self.current = next;

        let triggered = if delta <= 0 {
            Vec::new()
        } else if delta as u64 >= count as u64 {
            // A full lap passes every frame.
            self.timeline.all().to_vec()
        } else if next > previous {
            self.timeline.reactions_between(previous, next).to_vec()
        } else {
            let mut wrapped = self.timeline.reactions_between(previous, count - 1).to_vec();
            wrapped.extend_from_slice(&self.timeline.all()[self.timeline.index_range(0, next)]);
            wrapped
        };

        if !triggered.is_empty() {
            log::debug!(
                "Frame {} -> {}: {} reactions triggered",
                previous,
                next,
                triggered.len()
            );
        }
        self.set_triggered(triggered);
        Ok(&self.triggered)
    }

    /// Step one frame forward.
    pub fn advance(&mut self) -> Result<&[ReactionRecord]> {
        self.step(1)
    }

    fn set_triggered(&mut self, triggered: Vec<ReactionRecord>) {
        self.reacting = triggered
            .iter()
            .flat_map(|r| r.reactants.iter().flatten().copied())
            .collect();
        self.triggered = triggered;
    }

    /// Decode the frame under the playhead.
    pub fn load_current(&mut self) -> Result<ParticleFrame> {
        self.store.load_frame(self.current)
    }

    /// Renderer buffers for the current frame.
    ///
    /// Fails with `Lookup` if `tracked` is not present in the frame.
    pub fn display_frame(&mut self, tracked: Option<ParticleId>) -> Result<DisplayFrame> {
        let particles = self.load_current()?;
        if let Some(id) = tracked
            && !particles.contains(id)
        {
            return Err(ReplayError::Lookup {
                id,
                frame: self.current,
            });
        }
        Ok(DisplayFrame::build(&particles, &self.reacting, tracked))
    }

    /// Trajectory of `id` over frames `start..end`.
    pub fn trajectory(
        &mut self,
        id: ParticleId,
        start: usize,
        end: usize,
        lod: f32,
    ) -> Result<Trajectory> {
        self.trajectories.build(&mut self.store, id, start, end, lod)
    }

    /// Simulated time at `frame` in seconds.
    pub fn time_of(&self, frame: usize) -> f64 {
        frame as f64 * self.config.time_step
    }
}
