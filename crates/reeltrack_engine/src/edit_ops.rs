//! Copy/Paste/Cut/Delete/Move (§4.H), and the clipboard wire format of
//! §6.2. Every mutation here pushes a [`History`] snapshot first so a
//! failure partway through an operation rolls back cleanly (§8 scenario 6).
//!
//! New engineering — `motiongfx_engine` has no selection/clipboard
//! concept at all — grounded on `crate::block::BlockSeq::add_range`'s
//! overwrite policy, which every operation below ultimately delegates to,
//! and on `crate::recorder`'s `shift`-then-`add_range` commit shape for
//! Paste and Move.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::error::{EngineError, Result};
use crate::history::History;
use crate::time::{TimeRange, T};
use crate::track::{TrackId, TrackTree};
use crate::value::ValueTypeId;

/// One track's worth of copied block payloads, keyed by the source track's
/// id and declared value type (§6.2: `{guid, targetType, keyframes}`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardGroup {
    pub guid: TrackId,
    #[serde(rename = "targetType")]
    pub target_type: ValueTypeId,
    /// The copied block payloads, at their original (un-shifted) times.
    pub keyframes: Vec<Block>,
}

/// The clipboard document of §6.2: an anchor time plus one group per
/// copied track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClipboardDoc {
    pub time: T,
    pub keyframes: Vec<ClipboardGroup>,
}

/// `true` if a clipboard payload declared as `source` may be pasted onto a
/// track declared as `dest`. Value types form a flat equivalence, not a
/// subtyping lattice, so assignability is exact identity.
fn assignable(source: ValueTypeId, dest: ValueTypeId) -> bool {
    source == dest
}

/// Copy the blocks intersecting each `(track, range)` selection. Tracks
/// with no target type (`Ref`s) or no blocks in range contribute no group.
/// Returns `None` if nothing was copied.
pub fn copy(tree: &TrackTree, selections: &[(TrackId, TimeRange)]) -> Option<ClipboardDoc> {
    let anchor = selections.iter().map(|(_, range)| range.start).min()?;

    let mut groups = Vec::new();
    for (track, range) in selections {
        let Some(node) = tree.find(*track) else { continue };
        let Some(target_type) = node.target_type else { continue };
        let Ok(seq) = tree.blocks(*track) else { continue };
        let blocks: Vec<Block> = seq.get_blocks(*range).cloned().collect();
        if blocks.is_empty() {
            continue;
        }
        groups.push(ClipboardGroup {
            guid: *track,
            target_type,
            keyframes: blocks,
        });
    }

    if groups.is_empty() {
        return None;
    }
    Some(ClipboardDoc { time: anchor, keyframes: groups })
}

/// Paste `doc` at `playhead`, offsetting every block by `playhead -
/// doc.time`.
///
/// Per §4.H: if the clipboard holds exactly one group and `selected_track`
/// declares the same value type, that track is the sole destination;
/// otherwise each group pastes onto the track matching its own `guid`.
///
/// Pushes a `"Paste"` history snapshot before mutating. On the first
/// failure (missing track, type mismatch, or a locked destination) every
/// destination touched so far is restored and the snapshot is popped, so
/// a failed paste leaves no trace in the undo stack (§8 scenario 4, 6).
pub fn paste(
    history: &mut History,
    tree: &mut TrackTree,
    doc: &ClipboardDoc,
    playhead: T,
    selected_track: Option<TrackId>,
) -> Result<()> {
    let offset = playhead.saturating_sub(doc.time);

    let use_selected = doc.keyframes.len() == 1
        && selected_track
            .and_then(|t| tree.find(t))
            .and_then(|t| t.target_type)
            .map(|ty| assignable(doc.keyframes[0].target_type, ty))
            .unwrap_or(false);

    let destinations: Vec<TrackId> = if use_selected {
        vec![selected_track.expect("use_selected implies selected_track is Some")]
    } else {
        doc.keyframes.iter().map(|g| g.guid).collect()
    };

    history.push("Paste", tree, destinations.iter().copied());

    for (group, dest) in doc.keyframes.iter().zip(destinations.iter().copied()) {
        if let Err(err) = paste_one(tree, group, dest, offset) {
            history.undo(tree);
            return Err(err);
        }
    }

    Ok(())
}

fn paste_one(tree: &mut TrackTree, group: &ClipboardGroup, dest: TrackId, offset: T) -> Result<()> {
    let node = tree.find(dest).ok_or(EngineError::TrackNotFound(dest))?;
    let declared = node.target_type.ok_or(EngineError::TypeMismatch {
        expected: group.target_type,
        found: group.target_type,
    })?;
    if !assignable(group.target_type, declared) {
        return Err(EngineError::TypeMismatch {
            expected: declared,
            found: group.target_type,
        });
    }

    let shifted: Vec<Block> = group.keyframes.iter().map(|b| b.shifted(offset)).collect();
    tree.blocks_mut(dest)?.add_range(shifted);
    Ok(())
}

/// Copy then delete the same selection.
pub fn cut(
    history: &mut History,
    tree: &mut TrackTree,
    selections: &[(TrackId, TimeRange)],
) -> Option<ClipboardDoc> {
    let doc = copy(tree, selections)?;
    delete(history, tree, selections);
    Some(doc)
}

/// Erase every selection's range from its track, truncating/splitting
/// partially overlapping blocks per the overwrite policy (§4.C). Locked
/// tracks are skipped, not failed, since Delete has no single-operation
/// atomicity requirement in §8 the way Paste does.
pub fn delete(history: &mut History, tree: &mut TrackTree, selections: &[(TrackId, TimeRange)]) {
    let tracks: Vec<TrackId> = selections.iter().map(|(t, _)| *t).collect();
    history.push("Delete", tree, tracks);

    for (track, range) in selections {
        match tree.blocks_mut(*track) {
            Ok(seq) => seq.remove(*range),
            Err(err) => tracing::debug!(track = ?track, %err, "delete: track skipped"),
        }
    }
}

/// Shift every selected block by `delta`, applying the overwrite policy
/// against whatever it lands on. Pushes a `"Move"` snapshot and rolls
/// back on the first failing track, matching Paste's atomicity.
pub fn move_blocks(
    history: &mut History,
    tree: &mut TrackTree,
    selections: &[(TrackId, TimeRange)],
    delta: T,
) -> Result<()> {
    let tracks: Vec<TrackId> = selections.iter().map(|(t, _)| *t).collect();
    history.push("Move", tree, tracks);

    for (track, range) in selections {
        if let Err(err) = move_one(tree, *track, *range, delta) {
            history.undo(tree);
            return Err(err);
        }
    }

    Ok(())
}

fn move_one(tree: &mut TrackTree, track: TrackId, range: TimeRange, delta: T) -> Result<()> {
    let selected: Vec<Block> = tree.blocks(track)?.get_blocks(range).cloned().collect();
    let seq = tree.blocks_mut(track)?;
    seq.remove(range);
    let moved: Vec<Block> = selected.iter().map(|b| b.shifted(delta)).collect();
    seq.add_range(moved);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackKind;
    use crate::value::Value;

    fn seeded_track(tree: &mut TrackTree, ty: ValueTypeId, value: f32, range: TimeRange) -> TrackId {
        let track = tree.add_root("Position", TrackKind::Prop, Some(ty), 30).unwrap();
        tree.blocks_mut(track)
            .unwrap()
            .add_range(vec![Block::constant(range, Value::Float(value))]);
        track
    }

    #[test]
    fn copy_then_paste_round_trips_at_new_offset() {
        let mut tree = TrackTree::new();
        let src = seeded_track(
            &mut tree,
            ValueTypeId::Float,
            7.0,
            TimeRange::new(T::ZERO, T::from_ticks(1000)),
        );

        let doc = copy(&tree, &[(src, TimeRange::new(T::ZERO, T::from_ticks(1000)))]).unwrap();

        let mut history = History::new();
        paste(&mut history, &mut tree, &doc, T::from_ticks(5000), None).unwrap();

        let blocks: Vec<_> = tree
            .blocks(src)
            .unwrap()
            .get_blocks(TimeRange::new(T::MIN, T::MAX))
            .collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].range, TimeRange::new(T::from_ticks(5000), T::from_ticks(6000)));
    }

    #[test]
    fn paste_type_mismatch_pushes_no_surviving_history_entry() {
        let mut tree = TrackTree::new();
        let src = seeded_track(
            &mut tree,
            ValueTypeId::Float,
            1.0,
            TimeRange::new(T::ZERO, T::from_ticks(1000)),
        );
        let dest = tree
            .add_root("Speed", TrackKind::Prop, Some(ValueTypeId::Int), 30)
            .unwrap();

        let doc = copy(&tree, &[(src, TimeRange::new(T::ZERO, T::from_ticks(1000)))]).unwrap();
        // Force the clipboard's single group to carry `dest`'s id so
        // track-id-match routing (rather than selected-track routing)
        // is exercised.
        let mut doc = doc;
        doc.keyframes[0].guid = dest;

        let mut history = History::new();
        let err = paste(&mut history, &mut tree, &doc, T::ZERO, None).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
        assert!(history.is_empty());
        assert!(tree.blocks(dest).unwrap().is_empty());
    }

    #[test]
    fn undo_atomicity_rolls_back_multi_track_paste_on_locked_destination() {
        let mut tree = TrackTree::new();
        let ok_dest = tree
            .add_root("A", TrackKind::Prop, Some(ValueTypeId::Float), 30)
            .unwrap();
        let locked_dest = tree
            .add_root("B", TrackKind::Prop, Some(ValueTypeId::Float), 30)
            .unwrap();
        tree.set_locked(locked_dest, true).unwrap();

        let before_ok = tree.blocks(ok_dest).unwrap().clone();
        let before_locked = tree.blocks(locked_dest).unwrap().clone();

        let doc = ClipboardDoc {
            time: T::ZERO,
            keyframes: vec![
                ClipboardGroup {
                    guid: ok_dest,
                    target_type: ValueTypeId::Float,
                    keyframes: vec![Block::constant(
                        TimeRange::new(T::ZERO, T::from_ticks(1000)),
                        Value::Float(1.0),
                    )],
                },
                ClipboardGroup {
                    guid: locked_dest,
                    target_type: ValueTypeId::Float,
                    keyframes: vec![Block::constant(
                        TimeRange::new(T::ZERO, T::from_ticks(1000)),
                        Value::Float(1.0),
                    )],
                },
            ],
        };

        let mut history = History::new();
        let err = paste(&mut history, &mut tree, &doc, T::ZERO, None).unwrap_err();
        assert!(matches!(err, EngineError::Locked(_)));
        assert!(history.is_empty());
        assert_eq!(tree.blocks(ok_dest).unwrap().blocks(), before_ok.blocks());
        assert_eq!(tree.blocks(locked_dest).unwrap().blocks(), before_locked.blocks());
    }

    #[test]
    fn cut_removes_copied_range() {
        let mut tree = TrackTree::new();
        let src = seeded_track(
            &mut tree,
            ValueTypeId::Float,
            3.0,
            TimeRange::new(T::ZERO, T::from_ticks(1000)),
        );
        let mut history = History::new();
        let doc = cut(&mut history, &mut tree, &[(src, TimeRange::new(T::ZERO, T::from_ticks(1000)))]).unwrap();

        assert_eq!(doc.keyframes.len(), 1);
        assert!(tree.blocks(src).unwrap().is_empty());
    }

    #[test]
    fn move_blocks_shifts_selection_by_delta() {
        let mut tree = TrackTree::new();
        let track = seeded_track(
            &mut tree,
            ValueTypeId::Float,
            9.0,
            TimeRange::new(T::ZERO, T::from_ticks(1000)),
        );
        let mut history = History::new();
        move_blocks(
            &mut history,
            &mut tree,
            &[(track, TimeRange::new(T::ZERO, T::from_ticks(1000)))],
            T::from_ticks(2000),
        )
        .unwrap();

        let blocks: Vec<_> = tree
            .blocks(track)
            .unwrap()
            .get_blocks(TimeRange::new(T::MIN, T::MAX))
            .collect();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].range, TimeRange::new(T::from_ticks(2000), T::from_ticks(3000)));
    }
}
