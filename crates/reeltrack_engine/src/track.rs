//! The track tree: named, typed, hierarchical nodes each holding a
//! compiled [`BlockSeq`] and the [`KeyframeCurve`] it was compiled from.
//!
//! Grounded on `motiongfx_engine`'s `action.rs` `ActionWorld`: a private
//! `bevy_ecs::World` used purely as a stable, generational entity arena,
//! never wired to an `App`/`Plugin`/scheduler. The public identity a track
//! is addressed by, though, is a [`Uuid`] rather than a raw `Entity` —
//! tracks persist across save/load (see `crate::project`) and an `Entity`
//! index is only valid for the lifetime of the in-memory `World` that
//! allocated it. `by_id` bridges the two.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::block::BlockSeq;
use crate::error::{EngineError, Result};
use crate::keyframe::KeyframeCurve;
use crate::value::ValueTypeId;

pub type TrackId = Uuid;

/// Whether a track is a pure organizational grouping node (`Ref`, e.g. a
/// scene object or bone) or carries an interpolable property (`Prop`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackKind {
    /// Groups child tracks; has no value of its own.
    Ref,
    /// Carries a [`ValueTypeId`]-typed property through a compiled
    /// [`BlockSeq`].
    Prop,
}

#[derive(Component)]
struct TrackNode {
    id: TrackId,
    name: String,
    kind: TrackKind,
    target_type: Option<ValueTypeId>,
    parent: Option<TrackId>,
    /// Most `Ref` tracks group a handful of properties or bones, rarely
    /// more than a few; `SmallVec` keeps that common case off the heap
    /// the same way `motiongfx_engine`'s `sequence_ids: SmallVec<[Entity;
    /// 1]>` does for per-track sequence lists.
    children: SmallVec<[TrackId; 4]>,
    locked: bool,
    sample_rate: u32,
    curve: KeyframeCurve,
    blocks: BlockSeq,
    /// For `Ref` tracks, the key the `Binder`'s `SceneQuery` resolves this
    /// track's target with (`crate::binder::SceneQuery::object_by_key`).
    /// A binding key of the form `"bone:<path>"` marks the track as the
    /// root of a skinned-model's bone hierarchy (`crate::binder`).
    binding: Option<String>,
}

/// A read-only view of one track's metadata, returned by
/// [`TrackTree::find`].
#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    pub kind: TrackKind,
    pub target_type: Option<ValueTypeId>,
    pub parent: Option<TrackId>,
    pub children: SmallVec<[TrackId; 4]>,
    pub locked: bool,
    pub sample_rate: u32,
    pub binding: Option<String>,
}

impl From<&TrackNode> for Track {
    fn from(n: &TrackNode) -> Self {
        Track {
            id: n.id,
            name: n.name.clone(),
            kind: n.kind,
            target_type: n.target_type,
            parent: n.parent,
            children: n.children.clone(),
            locked: n.locked,
            sample_rate: n.sample_rate,
            binding: n.binding.clone(),
        }
    }
}

/// The hierarchical collection of tracks belonging to one clip.
#[derive(Default)]
pub struct TrackTree {
    world: World,
    by_id: HashMap<TrackId, Entity>,
}

impl TrackTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a root track (no parent).
    pub fn add_root(
        &mut self,
        name: impl Into<String>,
        kind: TrackKind,
        target_type: Option<ValueTypeId>,
        sample_rate: u32,
    ) -> Result<TrackId> {
        self.insert(None, name.into(), kind, target_type, sample_rate, None)
    }

    /// Create a track parented under `parent`.
    ///
    /// Fails with [`EngineError::TrackNotFound`] if `parent` does not
    /// exist, [`EngineError::Locked`] if it is locked, or
    /// [`EngineError::DuplicateName`] if a sibling already uses `name`.
    pub fn add_child(
        &mut self,
        parent: TrackId,
        name: impl Into<String>,
        kind: TrackKind,
        target_type: Option<ValueTypeId>,
        sample_rate: u32,
    ) -> Result<TrackId> {
        let parent_entity = self.entity_of(parent)?;
        if self.node(parent_entity).locked {
            return Err(EngineError::Locked(parent));
        }
        self.insert(Some(parent), name.into(), kind, target_type, sample_rate, None)
    }

    /// Create a root track with a caller-supplied id instead of minting a
    /// fresh one, so a persisted document's `TrackId`s survive a
    /// save/load round-trip (§6.1: `id` is a bit-exact field).
    pub(crate) fn add_root_with_id(
        &mut self,
        id: TrackId,
        name: impl Into<String>,
        kind: TrackKind,
        target_type: Option<ValueTypeId>,
        sample_rate: u32,
    ) -> Result<TrackId> {
        self.insert(None, name.into(), kind, target_type, sample_rate, Some(id))
    }

    /// As [`TrackTree::add_child`], but with a caller-supplied id (see
    /// [`TrackTree::add_root_with_id`]).
    pub(crate) fn add_child_with_id(
        &mut self,
        id: TrackId,
        parent: TrackId,
        name: impl Into<String>,
        kind: TrackKind,
        target_type: Option<ValueTypeId>,
        sample_rate: u32,
    ) -> Result<TrackId> {
        let parent_entity = self.entity_of(parent)?;
        if self.node(parent_entity).locked {
            return Err(EngineError::Locked(parent));
        }
        self.insert(Some(parent), name.into(), kind, target_type, sample_rate, Some(id))
    }

    fn insert(
        &mut self,
        parent: Option<TrackId>,
        name: String,
        kind: TrackKind,
        target_type: Option<ValueTypeId>,
        sample_rate: u32,
        id: Option<TrackId>,
    ) -> Result<TrackId> {
        if let Some(parent) = parent {
            if self.find_child(parent, &name).is_some() {
                return Err(EngineError::DuplicateName(name));
            }
        }

        let id = id.unwrap_or_else(Uuid::new_v4);
        let node = TrackNode {
            id,
            name,
            kind,
            target_type,
            parent,
            children: SmallVec::new(),
            locked: false,
            sample_rate,
            curve: KeyframeCurve::new(),
            blocks: BlockSeq::new(),
            binding: None,
        };
        let entity = self.world.spawn(node).id();
        self.by_id.insert(id, entity);

        if let Some(parent) = parent {
            let parent_entity = self.by_id[&parent];
            self.world
                .get_mut::<TrackNode>(parent_entity)
                .expect("parent just looked up")
                .children
                .push(id);
        }

        Ok(id)
    }

    pub fn find(&self, id: TrackId) -> Option<Track> {
        let entity = *self.by_id.get(&id)?;
        self.world.get::<TrackNode>(entity).map(Track::from)
    }

    pub fn find_child(&self, parent: TrackId, name: &str) -> Option<TrackId> {
        let entity = *self.by_id.get(&parent)?;
        let node = self.world.get::<TrackNode>(entity)?;
        node.children.iter().copied().find(|child| {
            self.find(*child)
                .map(|t| t.name == name)
                .unwrap_or(false)
        })
    }

    pub fn blocks(&self, id: TrackId) -> Result<&BlockSeq> {
        let entity = self.entity_of(id)?;
        Ok(&self.node(entity).blocks)
    }

    pub fn blocks_mut(&mut self, id: TrackId) -> Result<&mut BlockSeq> {
        let entity = self.entity_of(id)?;
        if self.node(entity).locked {
            return Err(EngineError::Locked(id));
        }
        Ok(&mut self.node_mut(entity).blocks)
    }

    pub fn curve(&self, id: TrackId) -> Result<&KeyframeCurve> {
        let entity = self.entity_of(id)?;
        Ok(&self.node(entity).curve)
    }

    /// Replace a track's keyframe curve and recompile its block sequence
    /// from it at the track's `sample_rate`.
    pub fn set_curve(&mut self, id: TrackId, curve: KeyframeCurve) -> Result<()> {
        let entity = self.entity_of(id)?;
        let node = self.node_mut(entity);
        if node.locked {
            return Err(EngineError::Locked(id));
        }
        let sample_rate = node.sample_rate;
        let blocks = curve.compile(sample_rate);
        node.curve = curve;
        node.blocks = BlockSeq::new();
        node.blocks.add_range(blocks);
        Ok(())
    }

    pub fn set_locked(&mut self, id: TrackId, locked: bool) -> Result<()> {
        let entity = self.entity_of(id)?;
        self.node_mut(entity).locked = locked;
        Ok(())
    }

    /// Set the key a `Ref` track's target resolves through (see
    /// `crate::binder::SceneQuery::object_by_key`).
    pub fn set_binding(&mut self, id: TrackId, binding: impl Into<String>) -> Result<()> {
        let entity = self.entity_of(id)?;
        self.node_mut(entity).binding = Some(binding.into());
        Ok(())
    }

    /// Remove a track and every descendant.
    pub fn remove(&mut self, id: TrackId) -> Result<()> {
        let entity = self.entity_of(id)?;
        let parent = self.node(entity).parent;

        let mut stack = vec![id];
        let mut to_remove = Vec::new();
        while let Some(current) = stack.pop() {
            let entity = self.entity_of(current)?;
            to_remove.push(current);
            stack.extend(self.node(entity).children.iter().copied());
        }

        for tid in &to_remove {
            let entity = self.by_id.remove(tid).expect("collected from by_id");
            self.world.despawn(entity);
        }

        if let Some(parent) = parent {
            if let Some(&parent_entity) = self.by_id.get(&parent) {
                self.world
                    .get_mut::<TrackNode>(parent_entity)
                    .expect("parent still present")
                    .children
                    .retain(|c| *c != id);
            }
        }

        Ok(())
    }

    /// Move `child` to be a child of `new_parent`, rejecting the move if
    /// it would create a cycle (`new_parent` is `child` or one of its
    /// descendants).
    pub fn reparent(&mut self, child: TrackId, new_parent: TrackId) -> Result<()> {
        if child == new_parent {
            return Err(EngineError::CyclicParent { child, new_parent });
        }
        if self.is_descendant(new_parent, child) {
            return Err(EngineError::CyclicParent { child, new_parent });
        }

        let child_entity = self.entity_of(child)?;
        let new_parent_entity = self.entity_of(new_parent)?;
        if self.node(new_parent_entity).locked {
            return Err(EngineError::Locked(new_parent));
        }

        let name = self.node(child_entity).name.clone();
        if self.find_child(new_parent, &name).is_some() {
            return Err(EngineError::DuplicateName(name));
        }

        let old_parent = self.node(child_entity).parent;
        if let Some(old_parent) = old_parent {
            if let Some(&old_parent_entity) = self.by_id.get(&old_parent) {
                self.node_mut(old_parent_entity).children.retain(|c| *c != child);
            }
        }

        self.node_mut(new_parent_entity).children.push(child);
        self.node_mut(child_entity).parent = Some(new_parent);

        Ok(())
    }

    /// `true` if `ancestor` is `descendant` itself or one of its
    /// ancestors-of-descendant (i.e. walking up from `descendant` reaches
    /// `ancestor`).
    fn is_descendant(&self, candidate_ancestor: TrackId, of: TrackId) -> bool {
        let mut current = Some(of);
        while let Some(id) = current {
            if id == candidate_ancestor {
                return true;
            }
            current = self.find(id).and_then(|t| t.parent);
        }
        false
    }

    /// The path from the tree's root down to `id`, inclusive.
    pub fn path(&self, id: TrackId) -> Result<Vec<TrackId>> {
        let mut path = vec![id];
        let mut current = id;
        loop {
            let track = self.find(current).ok_or(EngineError::TrackNotFound(current))?;
            match track.parent {
                Some(parent) => {
                    path.push(parent);
                    current = parent;
                }
                None => break,
            }
        }
        path.reverse();
        Ok(path)
    }

    /// Every root track (no parent) in the tree, in no particular order.
    pub fn roots(&self) -> Vec<TrackId> {
        self.by_id
            .keys()
            .copied()
            .filter(|id| {
                self.find(*id).map(|t| t.parent.is_none()).unwrap_or(false)
            })
            .collect()
    }

    /// Every `Prop` track in the tree, reached depth-first from every
    /// root.
    pub fn prop_tracks(&self) -> Vec<TrackId> {
        self.roots()
            .into_iter()
            .flat_map(|root| self.iter_depth_first(root))
            .filter(|id| self.find(*id).map(|t| t.kind == TrackKind::Prop).unwrap_or(false))
            .collect()
    }

    /// Depth-first walk of `root` and every descendant, parents before
    /// children.
    pub fn iter_depth_first(&self, root: TrackId) -> Vec<TrackId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(track) = self.find(id) {
                stack.extend(track.children.iter().rev().copied());
            }
        }
        out
    }

    fn entity_of(&self, id: TrackId) -> Result<Entity> {
        self.by_id.get(&id).copied().ok_or(EngineError::TrackNotFound(id))
    }

    fn node(&self, entity: Entity) -> &TrackNode {
        self.world
            .get::<TrackNode>(entity)
            .expect("entity came from by_id and tree stays in sync")
    }

    fn node_mut(&mut self, entity: Entity) -> &mut TrackNode {
        self.world
            .get_mut::<TrackNode>(entity)
            .expect("entity came from by_id and tree stays in sync")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_id_constructors_preserve_the_supplied_id() {
        let mut tree = TrackTree::new();
        let root_id = TrackId::new_v4();
        let root = tree
            .add_root_with_id(root_id, "Root", TrackKind::Ref, None, 30)
            .unwrap();
        assert_eq!(root, root_id);

        let child_id = TrackId::new_v4();
        let child = tree
            .add_child_with_id(child_id, root, "Child", TrackKind::Ref, None, 30)
            .unwrap();
        assert_eq!(child, child_id);
        assert!(tree.find(child_id).is_some());
    }

    #[test]
    fn add_child_rejects_duplicate_sibling_name() {
        let mut tree = TrackTree::new();
        let root = tree.add_root("Root", TrackKind::Ref, None, 30).unwrap();
        tree.add_child(root, "Position", TrackKind::Prop, Some(ValueTypeId::Vec3), 30)
            .unwrap();
        let err = tree
            .add_child(root, "Position", TrackKind::Prop, Some(ValueTypeId::Vec3), 30)
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateName(_)));
    }

    #[test]
    fn remove_is_recursive() {
        let mut tree = TrackTree::new();
        let root = tree.add_root("Root", TrackKind::Ref, None, 30).unwrap();
        let child = tree
            .add_child(root, "Child", TrackKind::Ref, None, 30)
            .unwrap();
        let grandchild = tree
            .add_child(child, "Grandchild", TrackKind::Ref, None, 30)
            .unwrap();

        tree.remove(child).unwrap();

        assert!(tree.find(child).is_none());
        assert!(tree.find(grandchild).is_none());
        assert!(tree.find(root).unwrap().children.is_empty());
    }

    #[test]
    fn reparent_rejects_cycles() {
        let mut tree = TrackTree::new();
        let root = tree.add_root("Root", TrackKind::Ref, None, 30).unwrap();
        let child = tree
            .add_child(root, "Child", TrackKind::Ref, None, 30)
            .unwrap();
        let grandchild = tree
            .add_child(child, "Grandchild", TrackKind::Ref, None, 30)
            .unwrap();

        let err = tree.reparent(child, grandchild).unwrap_err();
        assert!(matches!(err, EngineError::CyclicParent { .. }));

        let err = tree.reparent(root, root).unwrap_err();
        assert!(matches!(err, EngineError::CyclicParent { .. }));
    }

    #[test]
    fn reparent_moves_track_and_updates_children_lists() {
        let mut tree = TrackTree::new();
        let root = tree.add_root("Root", TrackKind::Ref, None, 30).unwrap();
        let a = tree.add_child(root, "A", TrackKind::Ref, None, 30).unwrap();
        let b = tree.add_child(root, "B", TrackKind::Ref, None, 30).unwrap();

        tree.reparent(b, a).unwrap();

        assert!(!tree.find(root).unwrap().children.contains(&b));
        assert!(tree.find(a).unwrap().children.contains(&b));
        assert_eq!(tree.find(b).unwrap().parent, Some(a));
    }

    #[test]
    fn locked_track_rejects_block_mutation() {
        let mut tree = TrackTree::new();
        let root = tree
            .add_root("Position", TrackKind::Prop, Some(ValueTypeId::Float), 30)
            .unwrap();
        tree.set_locked(root, true).unwrap();
        let err = tree.blocks_mut(root).unwrap_err();
        assert!(matches!(err, EngineError::Locked(_)));
    }

    #[test]
    fn path_and_depth_first_walk_root_to_leaves() {
        let mut tree = TrackTree::new();
        let root = tree.add_root("Root", TrackKind::Ref, None, 30).unwrap();
        let child = tree
            .add_child(root, "Child", TrackKind::Ref, None, 30)
            .unwrap();
        let grandchild = tree
            .add_child(child, "Grandchild", TrackKind::Ref, None, 30)
            .unwrap();

        assert_eq!(tree.path(grandchild).unwrap(), vec![root, child, grandchild]);
        assert_eq!(tree.iter_depth_first(root), vec![root, child, grandchild]);
    }
}
