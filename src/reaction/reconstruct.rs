//! Reconstruction of reaction participants from frame-to-frame id changes.
//!
//! The reaction log only says where and when a reaction happened. The
//! participants are recovered by diffing the id sets of the frame before and
//! the frame of the reaction:
//!
//! - ids that disappear are reactants,
//! - ids that appear are products,
//! - the partner is the nearest catalyst particle still present before.
//!
//! Each id is handed to the nearest reaction that still has a free slot, one
//! id at a time. This greedy policy is best-effort: when several reactions in
//! one frame happen close together the pairing can come out crossed. Anything
//! that does not add up is reported as a [`Diagnostic`] and left as is.

use cgmath::{MetricSpace, Vector3};

use crate::archive::FrameSource;
use crate::error::Result;
use crate::schema::{DEFAULT_CATALYST_TYPE, ParticleFrame, ParticleId, RawReaction, ReactionRecord};

/// Participant role within a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reactant,
    Partner,
    Product,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Reactant => "reactant",
            Role::Partner => "partner",
            Role::Product => "product",
        };
        f.write_str(name)
    }
}

/// Inconsistency found while reconstructing. Reconstruction carries on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Diagnostic {
    #[error("Frame {frame}: {found} particles removed for {expected} reactions")]
    RemovedCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("Frame {frame}: {found} particles added for {expected} reactions")]
    AddedCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
    #[error("Frame {frame}: no free reaction left for {role} {id}")]
    Unplaced {
        frame: usize,
        role: Role,
        id: ParticleId,
    },
    #[error("Frame {frame}: reaction {reaction} has no {role}")]
    UnfilledSlot {
        frame: usize,
        reaction: usize,
        role: Role,
    },
    #[error("Frame {frame}: particle {id} assigned to more than one role")]
    DuplicateAssignment { frame: usize, id: ParticleId },
    #[error("Frame {frame}: reactions logged in the first frame cannot be resolved")]
    NoPreviousFrame { frame: usize },
    #[error("{count} reactions logged past the last frame ({frame_count}) were dropped")]
    BeyondArchive { count: usize, frame_count: usize },
}

/// Reconstructed reaction table plus everything that did not add up.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconstruction {
    /// Reactions ordered by frame, log order within a frame.
    pub reactions: Vec<ReactionRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Reconstruction {
    pub fn is_consistent(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Resolves reactant, partner and product ids for logged reactions.
#[derive(Debug, Clone)]
pub struct ReactionReconstructor {
    catalyst_type: i32,
}

impl Default for ReactionReconstructor {
    fn default() -> Self {
        Self::new(DEFAULT_CATALYST_TYPE)
    }
}

impl ReactionReconstructor {
    /// `catalyst_type` is the species code partners are drawn from.
    pub fn new(catalyst_type: i32) -> Self {
        Self { catalyst_type }
    }

    pub fn catalyst_type(&self) -> i32 {
        self.catalyst_type
    }

    /// Resolve participants for every reaction in `raw`.
    ///
    /// Frame decoding errors abort; consistency problems become diagnostics.
    pub fn reconstruct<S>(&self, raw: &[RawReaction], source: &mut S) -> Result<Reconstruction>
    where
        S: FrameSource + ?Sized,
    {
        let frame_count = source.frame_count();
        let mut diagnostics = Vec::new();

        let mut reactions: Vec<ReactionRecord> = raw
            .iter()
            .filter(|r| r.frame < frame_count)
            .map(ReactionRecord::unresolved)
            .collect();

        let dropped = raw.len() - reactions.len();
        if dropped > 0 {
            report(
                &mut diagnostics,
                Diagnostic::BeyondArchive {
                    count: dropped,
                    frame_count,
                },
            );
        }

        if !reactions.is_sorted_by_key(|r| r.frame) {
            log::warn!("Reaction log is not ordered by frame, sorting");
            reactions.sort_by_key(|r| r.frame);
        }

        // Frame `f` is the "after" of one group and often the "before" of the next.
        let mut cached: Option<ParticleFrame> = None;
        let mut start = 0;
        while start < reactions.len() {
            let frame = reactions[start].frame;
            let end = start + reactions[start..].partition_point(|r| r.frame == frame);

            if frame == 0 {
                report(&mut diagnostics, Diagnostic::NoPreviousFrame { frame });
                start = end;
                continue;
            }

            let before = match cached.take() {
                Some(f) if f.frame == frame - 1 => f,
                _ => source.load_frame(frame - 1)?,
            };
            let after = source.load_frame(frame)?;

            log::debug!("Frame: {} Reaction count: {}", frame, end - start);
            self.resolve_frame(
                frame,
                start,
                &before,
                &after,
                &mut reactions[start..end],
                &mut diagnostics,
            );

            cached = Some(after);
            start = end;
        }

        log::info!(
            "Reconstructed {} reactions ({} diagnostics)",
            reactions.len(),
            diagnostics.len()
        );

        Ok(Reconstruction {
            reactions,
            diagnostics,
        })
    }

    /// Assign roles for the reactions of one frame. `first` is the table
    /// index of `slots[0]`, used for reporting.
    fn resolve_frame(
        &self,
        frame: usize,
        first: usize,
        before: &ParticleFrame,
        after: &ParticleFrame,
        slots: &mut [ReactionRecord],
        diagnostics: &mut Vec<Diagnostic>,
    ) {
        let expected = slots.len();
        let events: Vec<Vector3<f32>> = slots.iter().map(|r| r.position).collect();

        let removed = before.ids_not_in(after);
        let added = after.ids_not_in(before);

        if removed.len() != expected {
            report(
                diagnostics,
                Diagnostic::RemovedCountMismatch {
                    frame,
                    expected,
                    found: removed.len(),
                },
            );
        }
        if added.len() != expected {
            report(
                diagnostics,
                Diagnostic::AddedCountMismatch {
                    frame,
                    expected,
                    found: added.len(),
                },
            );
        }

        // Reactants: ascending id order, before-frame positions.
        let mut reactants = vec![None; expected];
        for id in removed {
            let position = before.get(id).map(|r| r.position);
            assign_nearest(frame, id, position, &events, &mut reactants, Role::Reactant, diagnostics);
        }

        // Products: descending id order, after-frame positions.
        let mut products = vec![None; expected];
        for id in added.into_iter().rev() {
            let position = after.get(id).map(|r| r.position);
            assign_nearest(frame, id, position, &events, &mut products, Role::Product, diagnostics);
        }

        // Partners: one catalyst particle per reaction, never shared in a frame.
        let mut partners: Vec<Option<ParticleId>> = vec![None; expected];
        for (j, event) in events.iter().enumerate() {
            let mut best: Option<(ParticleId, f32)> = None;
            for record in before.iter() {
                if record.kind != self.catalyst_type || partners.contains(&Some(record.id)) {
                    continue;
                }
                let d = record.position.distance(*event);
                if best.is_none_or(|(_, best_d)| d < best_d) {
                    best = Some((record.id, d));
                }
            }
            partners[j] = best.map(|(id, _)| id);
        }

        for (j, slot) in slots.iter_mut().enumerate() {
            slot.reactants = [reactants[j], partners[j]];
            slot.product = products[j];

            for (role, value) in [
                (Role::Reactant, reactants[j]),
                (Role::Partner, partners[j]),
                (Role::Product, products[j]),
            ] {
                if value.is_none() {
                    report(
                        diagnostics,
                        Diagnostic::UnfilledSlot {
                            frame,
                            reaction: first + j,
                            role,
                        },
                    );
                }
            }

            log::debug!("Reaction: {} {}", first + j, slot);
        }

        let mut used: Vec<ParticleId> = reactants
            .iter()
            .chain(&partners)
            .chain(&products)
            .flatten()
            .copied()
            .collect();
        used.sort_unstable();
        let mut last_reported = None;
        for pair in used.windows(2) {
            if pair[0] == pair[1] && last_reported != Some(pair[0]) {
                last_reported = Some(pair[0]);
                report(
                    diagnostics,
                    Diagnostic::DuplicateAssignment { frame, id: pair[0] },
                );
            }
        }
    }
}

/// Give `id` to the nearest reaction whose slot is still empty.
/// Ties keep the earliest reaction.
fn assign_nearest(
    frame: usize,
    id: ParticleId,
    position: Option<Vector3<f32>>,
    events: &[Vector3<f32>],
    slots: &mut [Option<ParticleId>],
    role: Role,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let nearest = position.and_then(|p| {
        events
            .iter()
            .enumerate()
            .filter(|(j, _)| slots[*j].is_none())
            .fold(None, |best: Option<(usize, f32)>, (j, event)| {
                let d = p.distance(*event);
                match best {
                    Some((_, best_d)) if d >= best_d => best,
                    _ => Some((j, d)),
                }
            })
    });

    match nearest {
        Some((j, _)) => slots[j] = Some(id),
        None => report(diagnostics, Diagnostic::Unplaced { frame, role, id }),
    }
}

fn report(diagnostics: &mut Vec<Diagnostic>, diagnostic: Diagnostic) {
    log::warn!("{}", diagnostic);
    diagnostics.push(diagnostic);
}
