//! The undo history: a stack of reversible snapshots keyed by a
//! user-visible label (§4.H). Every mutation edit_ops performs pushes one
//! of these before touching the track tree, so both user-initiated undo
//! and mid-operation rollback (§8 scenario 6, undo atomicity) share the
//! same restore path.
//!
//! New engineering — `motiongfx_engine` has no undo stack (it is an
//! authoring library driven by a host timeline, not an editor with its own
//! history) — grounded on `crate::track::TrackTree`'s `BlockSeq` storage: a
//! snapshot is just a clone of the `BlockSeq` each affected track held
//! immediately before the mutation.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::block::BlockSeq;
use crate::track::{TrackId, TrackTree};

struct HistoryEntry {
    label: String,
    snapshots: HashMap<TrackId, BlockSeq>,
}

/// A LIFO stack of named snapshots. There is no redo: once an entry is
/// undone it is gone, matching §4.H's "pushes reversible snapshots" (redo
/// is never named as an operation in §6.3's embedding surface).
#[derive(Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Label of the entry [`History::undo`] would restore next.
    pub fn peek_label(&self) -> Option<&str> {
        self.entries.last().map(|e| e.label.as_str())
    }

    /// Snapshot the current block state of `tracks` under `label`, before
    /// the caller mutates them. Tracks that no longer exist are skipped.
    pub fn push(&mut self, label: impl Into<String>, tree: &TrackTree, tracks: impl IntoIterator<Item = TrackId>) {
        let mut snapshots = HashMap::new();
        for track in tracks {
            match tree.blocks(track) {
                Ok(seq) => {
                    snapshots.insert(track, seq.clone());
                }
                Err(err) => debug!(?track, %err, "history: track missing at snapshot time, skipping"),
            }
        }
        self.entries.push(HistoryEntry {
            label: label.into(),
            snapshots,
        });
    }

    /// Restore the most recent entry's tracks to their snapshotted state
    /// and pop it. Used both for user-facing undo and for rolling back a
    /// failed multi-track operation (§8 scenario 6) — the caller just
    /// pushed the snapshot moments ago and discards it either way.
    ///
    /// Returns the label of the entry that was undone, or `None` if the
    /// history was empty. Tracks removed or relocked since the snapshot
    /// was taken are skipped rather than failing the whole undo.
    pub fn undo(&mut self, tree: &mut TrackTree) -> Option<String> {
        let entry = self.entries.pop()?;
        for (track, snapshot) in entry.snapshots {
            match tree.blocks_mut(track) {
                Ok(seq) => *seq = snapshot,
                Err(err) => debug!(?track, %err, "history: could not restore track on undo, skipping"),
            }
        }
        info!(label = %entry.label, "history: undo applied");
        Some(entry.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::time::{TimeRange, T};
    use crate::track::TrackKind;
    use crate::value::{Value, ValueTypeId};

    #[test]
    fn undo_restores_pre_mutation_block_state() {
        let mut tree = TrackTree::new();
        let track = tree
            .add_root("Position", TrackKind::Prop, Some(ValueTypeId::Float), 30)
            .unwrap();
        tree.blocks_mut(track)
            .unwrap()
            .add_range(vec![Block::constant(
                TimeRange::new(T::ZERO, T::from_ticks(1000)),
                Value::Float(1.0),
            )]);
        let before = tree.blocks(track).unwrap().clone();

        let mut history = History::new();
        history.push("Delete", &tree, vec![track]);
        tree.blocks_mut(track).unwrap().remove(TimeRange::new(T::ZERO, T::from_ticks(1000)));
        assert!(tree.blocks(track).unwrap().is_empty());

        let label = history.undo(&mut tree).unwrap();
        assert_eq!(label, "Delete");
        assert_eq!(tree.blocks(track).unwrap().blocks(), before.blocks());
    }

    #[test]
    fn undo_on_empty_history_is_a_no_op() {
        let mut tree = TrackTree::new();
        let mut history = History::new();
        assert_eq!(history.undo(&mut tree), None);
    }

    #[test]
    fn missing_track_at_snapshot_time_is_skipped_not_fatal() {
        let tree = TrackTree::new();
        let mut history = History::new();
        history.push("Paste", &tree, vec![TrackId::new_v4()]);
        assert_eq!(history.len(), 1);
    }
}
