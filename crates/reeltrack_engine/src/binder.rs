//! The Binder: resolves track identity to live scene targets, and the two
//! interfaces (`SceneQuery`, `BoneApplier`) the core consumes from the host
//! editor's scene runtime to do so.
//!
//! `SceneQuery`/`BoneApplier` are the host boundary this engine is embedded
//! through: the scene runtime lives entirely outside this crate and is
//! specified only at the interfaces it exposes here. `motiongfx_engine`'s
//! `accessor.rs` static table (`Accessor<S, T>` compile-time pairs) targets
//! its own in-process `bevy_ecs` world via direct component access; this
//! module generalizes that pattern to a dynamic host boundary instead,
//! since the host's scene types are not known to this crate — the host
//! exposes named, `Value`-typed properties at runtime rather than
//! compile-time accessor pairs.

use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::track::{TrackId, TrackKind, TrackTree};
use crate::value::{TransformValue, Value, ValueTypeId};

/// An opaque handle to a scene object, chosen by the host. The core never
/// interprets its bits; it only uses it as a key into `SceneQuery`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneObjectId(pub u64);

/// Read-side and lookup capabilities the host's scene runtime exposes to
/// the core. All methods are synchronous: per §5, the Binder only reads
/// scene state at well-defined points in the editor tick.
pub trait SceneQuery {
    /// Resolve a `Ref` track's binding key (`Track::binding`) to a live
    /// object, or `None` if no such object currently exists.
    fn object_by_key(&self, key: &str) -> Option<SceneObjectId>;

    /// The value type a named property is declared with on `target`, or
    /// `None` if no such property exists.
    fn declared_type(&self, target: SceneObjectId, property: &str) -> Option<ValueTypeId>;

    /// Current value of a named property.
    fn read_property(&self, target: SceneObjectId, property: &str) -> Option<Value>;

    /// Attempt to write a named property; `false` if the property is
    /// read-only (e.g. computed) or does not exist.
    fn write_property(&mut self, target: SceneObjectId, property: &str, value: Value) -> bool;

    /// Bone names under a skinned-model target, in the model's native
    /// order.
    fn bone_names(&self, target: SceneObjectId) -> Vec<String>;
}

/// Accepts bone overrides written during playback and composes/pushes
/// them at the scene's bone-update phase (§5 step 4).
pub trait BoneApplier {
    /// Record that `bone_path` (a `/`-separated path under `root`) should
    /// hold `parent_space` transform this tick.
    fn set_bone_override(&mut self, root: SceneObjectId, bone_path: &str, parent_space: TransformValue);

    /// Compose every override recorded this tick into final local
    /// transforms, walking the hierarchy root-to-leaf, and push them to
    /// the scene. Clears the recorded overrides.
    fn apply(&mut self);
}

/// Whether a resolved property writes directly through `SceneQuery` or
/// accumulates into a `BoneApplier` override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    Direct { property: String },
    Bone { root: SceneObjectId, bone_path: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProperty {
    pub target: SceneObjectId,
    pub value_type: ValueTypeId,
    pub writable: bool,
    pub kind: PropertyKind,
}

/// Resolves track identity to scene targets and mediates reads/writes.
/// Caches the last resolution per track id; `invalidate` drops caches on
/// scene graph changes (add/remove/reparent).
pub trait Binder {
    fn resolve_ref(&mut self, tree: &TrackTree, track: TrackId) -> Option<SceneObjectId>;
    fn resolve_property(&mut self, tree: &TrackTree, track: TrackId) -> Result<ResolvedProperty>;
    fn read(&self, resolved: &ResolvedProperty) -> Option<Value>;
    fn write(&mut self, resolved: &ResolvedProperty, value: Value) -> bool;
    /// Drop cached resolutions for `target` (or every cache, if `None`).
    fn invalidate(&mut self, target: Option<SceneObjectId>);
}

/// The default [`Binder`], composing track paths against a host
/// [`SceneQuery`]/[`BoneApplier`] pair the way §9's reflected-lookup note
/// describes: walk the path to the nearest bound ancestor, then resolve
/// one property name against it.
pub struct ReflectBinder<Q, A> {
    scene: Q,
    bones: A,
    ref_cache: HashMap<TrackId, Option<SceneObjectId>>,
    prop_cache: HashMap<TrackId, ResolvedProperty>,
}

impl<Q: SceneQuery, A: BoneApplier> ReflectBinder<Q, A> {
    pub fn new(scene: Q, bones: A) -> Self {
        ReflectBinder {
            scene,
            bones,
            ref_cache: HashMap::new(),
            prop_cache: HashMap::new(),
        }
    }

    pub fn scene(&self) -> &Q {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Q {
        &mut self.scene
    }

    pub fn bone_applier_mut(&mut self) -> &mut A {
        &mut self.bones
    }

    fn resolve_ref_uncached(&self, tree: &TrackTree, track: TrackId) -> Option<SceneObjectId> {
        let node = tree.find(track)?;
        if node.kind != TrackKind::Ref {
            return None;
        }
        self.scene.object_by_key(node.binding.as_deref()?)
    }
}

impl<Q: SceneQuery, A: BoneApplier> Binder for ReflectBinder<Q, A> {
    fn resolve_ref(&mut self, tree: &TrackTree, track: TrackId) -> Option<SceneObjectId> {
        if let Some(cached) = self.ref_cache.get(&track) {
            return *cached;
        }
        let resolved = self.resolve_ref_uncached(tree, track);
        self.ref_cache.insert(track, resolved);
        resolved
    }

    fn resolve_property(&mut self, tree: &TrackTree, track: TrackId) -> Result<ResolvedProperty> {
        if let Some(cached) = self.prop_cache.get(&track) {
            return Ok(cached.clone());
        }

        let node = tree.find(track).ok_or(EngineError::TrackNotFound(track))?;
        if node.kind != TrackKind::Prop {
            return Err(EngineError::NotBound(track));
        }
        let declared = node.target_type.ok_or(EngineError::NotBound(track))?;

        let parent = node.parent.ok_or(EngineError::NotBound(track))?;
        let parent_node = tree.find(parent).ok_or(EngineError::TrackNotFound(parent))?;
        let parent_object = self.resolve_ref(tree, parent).ok_or(EngineError::NotBound(track))?;

        let is_bone = parent_node
            .binding
            .as_deref()
            .map(|b| b.starts_with("bone:"))
            .unwrap_or(false);

        let resolved = if is_bone {
            ResolvedProperty {
                target: parent_object,
                value_type: ValueTypeId::Transform,
                writable: true,
                kind: PropertyKind::Bone {
                    root: parent_object,
                    bone_path: node.name.clone(),
                },
            }
        } else {
            let actual = self
                .scene
                .declared_type(parent_object, &node.name)
                .ok_or(EngineError::NotBound(track))?;
            if actual != declared {
                return Err(EngineError::TypeMismatch {
                    expected: declared,
                    found: actual,
                });
            }
            ResolvedProperty {
                target: parent_object,
                value_type: declared,
                writable: true,
                kind: PropertyKind::Direct {
                    property: node.name.clone(),
                },
            }
        };

        self.prop_cache.insert(track, resolved.clone());
        Ok(resolved)
    }

    fn read(&self, resolved: &ResolvedProperty) -> Option<Value> {
        match &resolved.kind {
            PropertyKind::Direct { property } => self.scene.read_property(resolved.target, property),
            // Bone transforms are write-accumulated overrides, not a
            // readable scene property through this interface.
            PropertyKind::Bone { .. } => None,
        }
    }

    fn write(&mut self, resolved: &ResolvedProperty, value: Value) -> bool {
        match &resolved.kind {
            PropertyKind::Direct { property } => self.scene.write_property(resolved.target, property, value),
            PropertyKind::Bone { root, bone_path } => {
                let Value::Transform(t) = value else {
                    return false;
                };
                self.bones.set_bone_override(*root, bone_path, t);
                true
            }
        }
    }

    fn invalidate(&mut self, target: Option<SceneObjectId>) {
        match target {
            None => {
                self.ref_cache.clear();
                self.prop_cache.clear();
            }
            Some(target) => {
                self.ref_cache.retain(|_, v| *v != Some(target));
                self.prop_cache.retain(|_, v| v.target != target);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackKind;

    #[derive(Default)]
    struct FakeScene {
        objects: HashMap<String, SceneObjectId>,
        properties: HashMap<(SceneObjectId, String), (ValueTypeId, Value)>,
    }

    impl SceneQuery for FakeScene {
        fn object_by_key(&self, key: &str) -> Option<SceneObjectId> {
            self.objects.get(key).copied()
        }

        fn declared_type(&self, target: SceneObjectId, property: &str) -> Option<ValueTypeId> {
            self.properties.get(&(target, property.to_string())).map(|(t, _)| *t)
        }

        fn read_property(&self, target: SceneObjectId, property: &str) -> Option<Value> {
            self.properties
                .get(&(target, property.to_string()))
                .map(|(_, v)| v.clone())
        }

        fn write_property(&mut self, target: SceneObjectId, property: &str, value: Value) -> bool {
            match self.properties.get_mut(&(target, property.to_string())) {
                Some((_, slot)) => {
                    *slot = value;
                    true
                }
                None => false,
            }
        }

        fn bone_names(&self, _target: SceneObjectId) -> Vec<String> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct FakeBoneApplier {
        overrides: Vec<(SceneObjectId, String, TransformValue)>,
    }

    impl BoneApplier for FakeBoneApplier {
        fn set_bone_override(&mut self, root: SceneObjectId, bone_path: &str, parent_space: TransformValue) {
            self.overrides.push((root, bone_path.to_string(), parent_space));
        }

        fn apply(&mut self) {
            self.overrides.clear();
        }
    }

    fn setup() -> (TrackTree, ReflectBinder<FakeScene, FakeBoneApplier>, TrackId, TrackId) {
        let mut tree = TrackTree::new();
        let root = tree.add_root("Cube", TrackKind::Ref, None, 30).unwrap();
        tree.set_binding(root, "cube-1").unwrap();
        let prop = tree
            .add_child(root, "Position", TrackKind::Prop, Some(ValueTypeId::Float), 30)
            .unwrap();

        let mut scene = FakeScene::default();
        let object = SceneObjectId(1);
        scene.objects.insert("cube-1".into(), object);
        scene
            .properties
            .insert((object, "Position".into()), (ValueTypeId::Float, Value::Float(0.0)));

        let binder = ReflectBinder::new(scene, FakeBoneApplier::default());
        (tree, binder, root, prop)
    }

    #[test]
    fn resolves_ref_through_binding_key() {
        let (tree, mut binder, root, _) = setup();
        let object = binder.resolve_ref(&tree, root);
        assert_eq!(object, Some(SceneObjectId(1)));
    }

    #[test]
    fn resolves_and_writes_through_property() {
        let (tree, mut binder, _, prop) = setup();
        let resolved = binder.resolve_property(&tree, prop).unwrap();
        assert_eq!(resolved.value_type, ValueTypeId::Float);
        assert!(binder.write(&resolved, Value::Float(5.0)));
        assert_eq!(binder.read(&resolved), Some(Value::Float(5.0)));
    }

    #[test]
    fn type_mismatch_surfaces_as_error() {
        let (mut tree, mut binder, root, _) = setup();
        let wrong_type_prop = tree
            .add_child(root, "Speed", TrackKind::Prop, Some(ValueTypeId::Int), 30)
            .unwrap();
        let object = binder.scene_mut();
        object
            .properties
            .insert((SceneObjectId(1), "Speed".into()), (ValueTypeId::Float, Value::Float(1.0)));

        let err = binder.resolve_property(&tree, wrong_type_prop).unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }

    #[test]
    fn invalidate_drops_cached_resolution() {
        let (tree, mut binder, root, prop) = setup();
        binder.resolve_ref(&tree, root);
        binder.resolve_property(&tree, prop).unwrap();
        binder.invalidate(Some(SceneObjectId(1)));
        assert!(binder.ref_cache.is_empty());
        assert!(binder.prop_cache.is_empty());
    }
}
