//! Per-frame lookup over a reconstructed reaction table.

use std::ops::Range;

use crate::schema::ReactionRecord;

/// Reactions ordered by frame with range queries for playback.
#[derive(Debug, Clone, Default)]
pub struct ReactionTimeline {
    reactions: Vec<ReactionRecord>,
}

impl ReactionTimeline {
    /// Build from a table. Order within a frame is preserved.
    pub fn new(mut reactions: Vec<ReactionRecord>) -> Self {
        if !reactions.is_sorted_by_key(|r| r.frame) {
            reactions.sort_by_key(|r| r.frame);
        }
        Self { reactions }
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    pub fn all(&self) -> &[ReactionRecord] {
        &self.reactions
    }

    pub fn get(&self, index: usize) -> Option<&ReactionRecord> {
        self.reactions.get(index)
    }

    /// Table indices of reactions in frames `first..=last`.
    pub fn index_range(&self, first: usize, last: usize) -> Range<usize> {
        if first > last {
            return 0..0;
        }
        let start = self.reactions.partition_point(|r| r.frame < first);
        let end = self.reactions.partition_point(|r| r.frame <= last);
        start..end
    }

    /// Reactions logged in `frame`.
    pub fn reactions_in(&self, frame: usize) -> &[ReactionRecord] {
        &self.reactions[self.index_range(frame, frame)]
    }

    /// Reactions to trigger when playback moves from `previous` to `current`,
    /// i.e. those of frames `previous + 1..=current`.
    pub fn reactions_between(&self, previous: usize, current: usize) -> &[ReactionRecord] {
        &self.reactions[self.index_range(previous + 1, current)]
    }

    /// Distinct frames that have at least one reaction, ascending.
    pub fn frames_with_reactions(&self) -> impl Iterator<Item = usize> + '_ {
        let mut last = None;
        self.reactions.iter().filter_map(move |r| {
            if last == Some(r.frame) {
                None
            } else {
                last = Some(r.frame);
                Some(r.frame)
            }
        })
    }
}
