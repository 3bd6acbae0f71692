//! Per-particle records and decoded frames.

use std::collections::HashMap;

use cgmath::{InnerSpace, Vector3, Zero};

use crate::error::{ReplayError, Result};

/// Simulator-assigned particle identifier.
pub type ParticleId = i32;

/// One particle in one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleRecord {
    /// Species type code.
    pub kind: i32,
    /// Particle identifier, unique within a frame. Negative ids mark padding.
    pub id: ParticleId,
    pub position: Vector3<f32>,
    /// Surface normal for surface particles, zero for volume particles.
    pub orientation: Vector3<f32>,
}

impl ParticleRecord {
    pub fn new(kind: i32, id: ParticleId, position: Vector3<f32>) -> Self {
        Self {
            kind,
            id,
            position,
            orientation: Vector3::zero(),
        }
    }

    /// Padding record filling an unused archive slot.
    pub fn padding() -> Self {
        Self::new(-1, -1, Vector3::zero())
    }

    pub fn with_orientation(mut self, orientation: Vector3<f32>) -> Self {
        self.orientation = orientation;
        self
    }

    /// True if the particle lives on a surface (non-zero orientation).
    #[inline]
    pub fn is_surface(&self) -> bool {
        self.orientation != Vector3::zero()
    }

    /// Unused slot: a negative id, or an all-zero record as left behind by
    /// compressors that zero-fill the frame buffer.
    #[inline]
    pub fn is_padding(&self) -> bool {
        self.id < 0
            || (self.id == 0
                && self.kind == 0
                && self.position == Vector3::zero()
                && self.orientation == Vector3::zero())
    }

    /// Euclidean distance from this particle to a point.
    #[inline]
    pub fn distance_to(&self, point: Vector3<f32>) -> f32 {
        (self.position - point).magnitude()
    }
}

/// The live particles of one frame.
///
/// Particles are addressed through an explicit id → slot table, so the id
/// space is independent of how many records a frame holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFrame {
    /// Frame number this snapshot was decoded from.
    pub frame: usize,
    records: Vec<ParticleRecord>,
    slots: HashMap<ParticleId, usize>,
}

impl ParticleFrame {
    /// Build a frame from decoded records, dropping padding.
    ///
    /// Fails if an id occurs twice.
    pub fn from_records(frame: usize, records: Vec<ParticleRecord>) -> Result<Self> {
        let records: Vec<ParticleRecord> =
            records.into_iter().filter(|r| !r.is_padding()).collect();

        let mut slots = HashMap::with_capacity(records.len());
        for (slot, record) in records.iter().enumerate() {
            if slots.insert(record.id, slot).is_some() {
                return Err(ReplayError::malformed(format!(
                    "particle id {} occurs more than once in frame {}",
                    record.id, frame
                )));
            }
        }

        Ok(Self {
            frame,
            records,
            slots,
        })
    }

    /// Number of live particles.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in archive order.
    pub fn records(&self) -> &[ParticleRecord] {
        &self.records
    }

    /// Look up a particle by id.
    pub fn get(&self, id: ParticleId) -> Option<&ParticleRecord> {
        self.slots.get(&id).map(|&slot| &self.records[slot])
    }

    /// Dense slot of a particle, if present.
    pub fn slot_of(&self, id: ParticleId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    pub fn contains(&self, id: ParticleId) -> bool {
        self.slots.contains_key(&id)
    }

    /// All ids in ascending order.
    pub fn sorted_ids(&self) -> Vec<ParticleId> {
        let mut ids: Vec<ParticleId> = self.records.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        ids
    }

    /// Ids present in `self` but not in `other`, ascending.
    pub fn ids_not_in(&self, other: &ParticleFrame) -> Vec<ParticleId> {
        self.sorted_ids()
            .into_iter()
            .filter(|id| !other.contains(*id))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParticleRecord> {
        self.records.iter()
    }
}
