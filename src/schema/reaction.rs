//! Reaction event types.

use std::fmt;

use cgmath::Vector3;
use serde::{Deserialize, Serialize};

use super::ParticleId;

/// One line of the simulator's reaction log.
///
/// The simulator only records that a reaction happened and where; the
/// participants are reconstructed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReaction {
    /// Frame in which the product first appears.
    pub frame: usize,
    /// Simulation time of the event.
    pub time: f32,
    /// Event location, already mapped into frame space.
    pub position: Vector3<f32>,
    /// Reaction name from the log.
    pub type_tag: String,
}

/// A reaction with its participants resolved.
///
/// Slots the reconstructor could not fill are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub frame: usize,
    pub time: f32,
    pub position: Vector3<f32>,
    pub type_tag: String,
    /// `[reactant, partner]`.
    pub reactants: [Option<ParticleId>; 2],
    pub product: Option<ParticleId>,
}

impl ReactionRecord {
    /// Record with no participants assigned yet.
    pub fn unresolved(raw: &RawReaction) -> Self {
        Self {
            frame: raw.frame,
            time: raw.time,
            position: raw.position,
            type_tag: raw.type_tag.clone(),
            reactants: [None, None],
            product: None,
        }
    }

    /// The particle consumed by the reaction.
    #[inline]
    pub fn reactant(&self) -> Option<ParticleId> {
        self.reactants[0]
    }

    /// The catalyst particle the reactant binds to.
    #[inline]
    pub fn partner(&self) -> Option<ParticleId> {
        self.reactants[1]
    }

    pub fn is_resolved(&self) -> bool {
        self.reactants.iter().all(Option::is_some) && self.product.is_some()
    }
}

impl fmt::Display for ReactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = |v: Option<ParticleId>| v.map_or_else(|| "-".to_string(), |v| v.to_string());
        write!(
            f,
            "{} : {} : {} : {} : {} : {} reactant={} partner={} product={}",
            self.frame,
            self.time,
            self.position.x,
            self.position.y,
            self.position.z,
            self.type_tag,
            id(self.reactant()),
            id(self.partner()),
            id(self.product)
        )
    }
}
