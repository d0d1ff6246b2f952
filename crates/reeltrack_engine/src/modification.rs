//! Modifications (§4.I): read-only analyses over existing tracks that
//! emit new compiled tracks without touching their sources — rotate-with-
//! motion, motion-to-anim-parameters, and anim-params-to-bones.
//!
//! New engineering — `motiongfx_engine` has no bake/derive pipeline at all
//! (every track it authors is hand-keyed, never computed from another one)
//! — grounded on `crate::player`'s per-frame `BlockSeq::get_value_at`
//! sampling loop, generalized from "sample a block today, write it" to
//! "sample every frame of a selection, derive a new value, collect a
//! block".

use bevy_math::{Quat, Vec3};
use tracing::debug;

use crate::block::Block;
use crate::keyframe::Interpolation;
use crate::time::{TimeRange, T};
use crate::track::{TrackId, TrackKind, TrackTree};
use crate::value::{TransformValue, Value, ValueTypeId};

/// A user-selected time range plus the interpolation new keyframes default
/// to (§3 `TimeSelection`).
#[derive(Debug, Clone, Copy)]
pub struct TimeSelection {
    pub range: TimeRange,
    pub default_interpolation: Interpolation,
}

/// Read-only view a [`Modification`] enumerates input tracks through:
/// the track tree plus the set of root tracks the host selected as
/// candidate inputs (e.g. every object under the editor's current
/// selection).
pub struct TrackListView<'a> {
    pub tree: &'a TrackTree,
    pub roots: Vec<TrackId>,
}

impl<'a> TrackListView<'a> {
    pub fn new(tree: &'a TrackTree, roots: Vec<TrackId>) -> Self {
        TrackListView { tree, roots }
    }

    /// The first descendant of `root` (depth-first, root included) that is
    /// a `Prop` track named `name` with declared type `ty`.
    fn find_named_prop(&self, root: TrackId, name: &str, ty: ValueTypeId) -> Option<TrackId> {
        self.tree.iter_depth_first(root).into_iter().find(|id| {
            self.tree
                .find(*id)
                .map(|t| t.kind == TrackKind::Prop && t.name == name && t.target_type == Some(ty))
                .unwrap_or(false)
        })
    }

    /// Every `Prop<Float>` descendant of `root` whose name starts with
    /// `prefix` (used to collect a skinned-model's animation-graph
    /// parameter tracks for `AnimParamsToBones`).
    fn find_float_props_with_prefix(&self, root: TrackId, prefix: &str) -> Vec<(String, TrackId)> {
        self.tree
            .iter_depth_first(root)
            .into_iter()
            .filter_map(|id| {
                let t = self.tree.find(id)?;
                if t.kind == TrackKind::Prop
                    && t.target_type == Some(ValueTypeId::Float)
                    && t.name.starts_with(prefix)
                {
                    Some((t.name.clone(), id))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// One compiled output track a [`Modification`] emits: a property track at
/// `name` under `parent` (an existing track id), ready for the edit layer
/// to create (or overwrite the blocks of) and commit.
#[derive(Debug, Clone)]
pub struct CompiledPropertyTrack {
    pub parent: TrackId,
    pub name: String,
    pub target_type: ValueTypeId,
    pub blocks: Vec<Block>,
}

/// A read-only analysis `(TrackListView, TimeSelection) ->
/// [CompiledPropertyTrack]`, gated by [`Modification::can_start`] (§4.I).
pub trait Modification {
    fn can_start(&self, tracks: &TrackListView, selection: &TimeSelection) -> bool;
    fn start(&mut self, tracks: &TrackListView, selection: &TimeSelection) -> Vec<CompiledPropertyTrack>;
    /// Discard any partially emitted state; a `start` call after `cancel`
    /// behaves as if it were the first call.
    fn cancel(&mut self);
}

/// The times `range.start, range.start + 1/rate, ..., range.end`
/// inclusive, at `rate` samples/second.
fn frame_times(range: TimeRange, rate: u32) -> Vec<T> {
    let count = T::frame_count(range, rate).unwrap_or(0);
    (0..=count)
        .map(|i| range.start + T::from_frames(i, rate).unwrap_or(T::ZERO))
        .collect()
}

fn sample_vec3(seq: &crate::block::BlockSeq, t: T) -> Vec3 {
    match seq.get_value_at(t, Value::default_for(ValueTypeId::Vec3)) {
        Value::Vec3(v) => v,
        _ => Vec3::ZERO,
    }
}

fn sample_quat(seq: &crate::block::BlockSeq, t: T) -> Quat {
    match seq.get_value_at(t, Value::default_for(ValueTypeId::Quat)) {
        Value::Quat(q) => q,
        _ => Quat::IDENTITY,
    }
}

/// Collapse a run of samples to a single [`Block::constant`] when every
/// value is within approximate equality of the first, otherwise a
/// [`Block::samples`] — the same collapse rule `crate::recorder` applies
/// to a finished recording (§8 scenario 5).
fn block_from_values(range: TimeRange, rate: u32, values: Vec<Value>) -> Block {
    let first = values[0].clone();
    if values.iter().all(|v| v.almost_equal(&first, None)) {
        Block::constant(range, first)
    } else {
        Block::samples(range, rate, values)
    }
}

/// `look_at(direction)`: the rotation that points the object's local
/// forward axis (`Vec3::X`, chosen so that motion along +X yields the
/// identity rotation, matching §8 scenario 3) at `direction`. Identity if
/// `direction` is (near) zero.
fn look_at(direction: Vec3) -> Quat {
    let dir = direction.normalize_or_zero();
    if dir.length_squared() < 1e-12 {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_arc(Vec3::X, dir)
}

/// **Rotate With Motion** (§4.I): derives a `LocalRotation` track from
/// each selected object's `LocalPosition` track.
pub struct RotateWithMotion {
    sample_rate: u32,
}

impl RotateWithMotion {
    pub fn new(sample_rate: u32) -> Self {
        RotateWithMotion { sample_rate }
    }
}

impl Modification for RotateWithMotion {
    fn can_start(&self, tracks: &TrackListView, _selection: &TimeSelection) -> bool {
        tracks
            .roots
            .iter()
            .any(|&root| tracks.find_named_prop(root, "LocalPosition", ValueTypeId::Vec3).is_some())
    }

    fn start(&mut self, tracks: &TrackListView, selection: &TimeSelection) -> Vec<CompiledPropertyTrack> {
        let mut out = Vec::new();

        for &root in &tracks.roots {
            let Some(pos_track) = tracks.find_named_prop(root, "LocalPosition", ValueTypeId::Vec3) else {
                continue;
            };
            let Ok(pos_blocks) = tracks.tree.blocks(pos_track) else { continue };
            if pos_blocks.get_blocks(selection.range).next().is_none() {
                debug!(?root, "rotate_with_motion: no keyframes in selection, skipping");
                continue;
            }

            let frames = frame_times(selection.range, self.sample_rate);
            let positions: Vec<Vec3> = frames.iter().map(|&t| sample_vec3(pos_blocks, t)).collect();

            let mut rotations: Vec<Option<Quat>> = vec![None; positions.len()];
            for i in 1..positions.len() {
                let delta = positions[i] - positions[i - 1];
                if delta.length_squared() > 1e-12 {
                    rotations[i] = Some(look_at(delta));
                }
            }
            for i in 1..rotations.len() {
                if rotations[i].is_none() {
                    rotations[i] = rotations[i - 1];
                }
            }

            let Some(first_motion) = rotations.iter().position(Option::is_some) else {
                debug!(?root, "rotate_with_motion: object never moves, skipping");
                continue;
            };
            let first_rotation = rotations[first_motion].expect("position checked above");
            for r in rotations.iter_mut().take(first_motion) {
                *r = Some(first_rotation);
            }

            let values: Vec<Value> = rotations
                .into_iter()
                .map(|r| Value::Quat(r.expect("every frame back-filled by now")))
                .collect();

            out.push(CompiledPropertyTrack {
                parent: root,
                name: "LocalRotation".into(),
                target_type: ValueTypeId::Quat,
                blocks: vec![block_from_values(selection.range, self.sample_rate, values)],
            });
        }

        out
    }

    fn cancel(&mut self) {}
}

/// The float-valued animation parameters **Motion To Anim Parameters**
/// derives per object (§4.I).
const MOTION_PARAM_NAMES: [&str; 9] = [
    "move_x",
    "move_y",
    "move_z",
    "direction",
    "speed",
    "groundspeed",
    "rotationspeed",
    "skid_x",
    "skid_y",
];

/// **Motion To Anim Parameters** (§4.I): derives the skinned-model
/// animation graph's locomotion parameters from an object's motion.
pub struct MotionToAnimParameters {
    sample_rate: u32,
}

impl MotionToAnimParameters {
    pub fn new(sample_rate: u32) -> Self {
        MotionToAnimParameters { sample_rate }
    }
}

impl Modification for MotionToAnimParameters {
    fn can_start(&self, tracks: &TrackListView, _selection: &TimeSelection) -> bool {
        tracks
            .roots
            .iter()
            .any(|&root| tracks.find_named_prop(root, "LocalPosition", ValueTypeId::Vec3).is_some())
    }

    fn start(&mut self, tracks: &TrackListView, selection: &TimeSelection) -> Vec<CompiledPropertyTrack> {
        let mut out = Vec::new();
        let rate = self.sample_rate as f32;

        for &root in &tracks.roots {
            let Some(pos_track) = tracks.find_named_prop(root, "LocalPosition", ValueTypeId::Vec3) else {
                continue;
            };
            let Ok(pos_blocks) = tracks.tree.blocks(pos_track) else { continue };
            if pos_blocks.get_blocks(selection.range).next().is_none() {
                continue;
            }

            // Orientation defaults to identity when the object has no
            // rotation track: velocity/acceleration are then already in
            // local space.
            let rot_track = tracks.find_named_prop(root, "LocalRotation", ValueTypeId::Quat);
            let rot_blocks = rot_track.and_then(|t| tracks.tree.blocks(t).ok());

            let frames = frame_times(selection.range, self.sample_rate);
            let positions: Vec<Vec3> = frames.iter().map(|&t| sample_vec3(pos_blocks, t)).collect();
            let orientations: Vec<Quat> = frames
                .iter()
                .map(|&t| rot_blocks.map(|seq| sample_quat(seq, t)).unwrap_or(Quat::IDENTITY))
                .collect();

            let n = positions.len();
            let mut world_velocity = vec![Vec3::ZERO; n];
            for i in 1..n {
                world_velocity[i] = (positions[i] - positions[i - 1]) * rate;
            }
            if n > 1 {
                world_velocity[0] = world_velocity[1];
            }

            let mut yaw_speed = vec![0.0f32; n];
            for i in 1..n {
                let delta = wrapped_delta_degrees(orientations[i - 1], orientations[i]);
                yaw_speed[i] = delta * rate;
            }
            if n > 1 {
                yaw_speed[0] = yaw_speed[1];
            }

            let mut local_velocity = vec![Vec3::ZERO; n];
            for i in 0..n {
                local_velocity[i] = orientations[i].inverse() * world_velocity[i];
            }

            let mut local_accel = vec![Vec3::ZERO; n];
            for i in 1..n {
                local_accel[i] = (local_velocity[i] - local_velocity[i - 1]) * rate;
            }
            if n > 1 {
                local_accel[0] = local_accel[1];
            }

            let mut params: std::collections::HashMap<&str, Vec<Value>> =
                MOTION_PARAM_NAMES.iter().map(|&n| (n, Vec::with_capacity(positions.len()))).collect();

            for i in 0..n {
                let v = local_velocity[i];
                let a = local_accel[i];
                let groundspeed = (v.x * v.x + v.z * v.z).sqrt();
                let speed = world_velocity[i].length();
                let direction = v.z.atan2(v.x).to_degrees();

                params.get_mut("move_x").unwrap().push(Value::Float(v.x));
                params.get_mut("move_y").unwrap().push(Value::Float(-v.y));
                params.get_mut("move_z").unwrap().push(Value::Float(v.z));
                params.get_mut("direction").unwrap().push(Value::Float(direction));
                params.get_mut("speed").unwrap().push(Value::Float(speed));
                params.get_mut("groundspeed").unwrap().push(Value::Float(groundspeed));
                params.get_mut("rotationspeed").unwrap().push(Value::Float(yaw_speed[i]));
                params.get_mut("skid_x").unwrap().push(Value::Float(a.x / 800.0));
                params.get_mut("skid_y").unwrap().push(Value::Float(-a.y / 800.0));
            }

            for name in MOTION_PARAM_NAMES {
                let values = params.remove(name).expect("every name populated above");
                out.push(CompiledPropertyTrack {
                    parent: root,
                    name: name.to_string(),
                    target_type: ValueTypeId::Float,
                    blocks: vec![block_from_values(selection.range, self.sample_rate, values)],
                });
            }
        }

        out
    }

    fn cancel(&mut self) {}
}

/// Signed shortest-path angle in degrees from `a` to `b` about the
/// vertical (Y) axis, ignoring pitch/roll — the "wrapped-delta-degrees"
/// of §4.I.
fn wrapped_delta_degrees(a: Quat, b: Quat) -> f32 {
    let (_, yaw_a, _) = a.to_euler(bevy_math::EulerRot::XYZ);
    let (_, yaw_b, _) = b.to_euler(bevy_math::EulerRot::XYZ);
    let mut delta = (yaw_b - yaw_a).to_degrees();
    delta = ((delta + 180.0).rem_euclid(360.0)) - 180.0;
    delta
}

/// Host capability `AnimParamsToBones` drives (§4.I): a disposable
/// instance of a skinned-model's animation graph the modification can
/// feed parameter values into and read resulting bone transforms back out
/// of, without touching the live scene object. The out-of-scope "scene
/// runtime" collaborator (§1) exposes this the same way it exposes
/// `SceneQuery`/`BoneApplier` to the player.
pub trait ShadowModel {
    /// Bone names in the model's native order. Not assumed to already be
    /// parent-before-child (§9 Open Question); see
    /// [`topological_bone_order`].
    fn bone_names(&self) -> Vec<String>;
    fn parent_bone(&self, bone: &str) -> Option<String>;
    /// Push one parameter value; takes effect on the next [`ShadowModel::tick`].
    fn set_parameter(&mut self, name: &str, value: f32);
    /// Advance the animation graph by `dt` seconds (the project's sample
    /// period).
    fn tick(&mut self, dt: f32);
    /// `bone`'s transform relative to its parent bone, after the most
    /// recent [`ShadowModel::tick`].
    fn bone_parent_space(&self, bone: &str) -> TransformValue;
}

/// Topologically order `model`'s bones so every parent precedes its
/// children, via a standard Kahn's-algorithm pass over the declared
/// `parent_bone` edges (§9 Open Question: bone-parent ordering is not
/// assumed from the model's native list order).
fn topological_bone_order(model: &dyn ShadowModel) -> Vec<String> {
    use std::collections::{HashMap, VecDeque};

    let names = model.bone_names();
    let mut children: HashMap<Option<String>, Vec<String>> = HashMap::new();
    for name in &names {
        children.entry(model.parent_bone(name)).or_default().push(name.clone());
    }

    let mut order = Vec::with_capacity(names.len());
    let mut queue: VecDeque<String> = children.get(&None).cloned().unwrap_or_default().into();
    while let Some(bone) = queue.pop_front() {
        order.push(bone.clone());
        if let Some(kids) = children.get(&Some(bone)) {
            queue.extend(kids.iter().cloned());
        }
    }
    order
}

/// **Anim Params To Bones** (§4.I): bakes a skinned-model renderer's
/// animation-graph parameter tracks into per-bone `Transform` tracks.
pub struct AnimParamsToBones<M> {
    sample_rate: u32,
    make_shadow: Box<dyn Fn() -> M>,
}

impl<M: ShadowModel> AnimParamsToBones<M> {
    /// `make_shadow` spins up a fresh [`ShadowModel`] instance per
    /// renderer track baked (§4.I "shadow scene-model").
    pub fn new(sample_rate: u32, make_shadow: impl Fn() -> M + 'static) -> Self {
        AnimParamsToBones {
            sample_rate,
            make_shadow: Box::new(make_shadow),
        }
    }
}

impl<M: ShadowModel> Modification for AnimParamsToBones<M> {
    fn can_start(&self, tracks: &TrackListView, _selection: &TimeSelection) -> bool {
        tracks
            .roots
            .iter()
            .any(|&root| !tracks.find_float_props_with_prefix(root, "").is_empty())
    }

    fn start(&mut self, tracks: &TrackListView, selection: &TimeSelection) -> Vec<CompiledPropertyTrack> {
        let mut out = Vec::new();
        let dt = 1.0 / self.sample_rate as f32;

        for &root in &tracks.roots {
            let params = tracks.find_float_props_with_prefix(root, "");
            if params.is_empty() {
                continue;
            }

            let sampled: Vec<(String, &crate::block::BlockSeq)> = params
                .iter()
                .filter_map(|(name, id)| tracks.tree.blocks(*id).ok().map(|seq| (name.clone(), seq)))
                .collect();
            if sampled.is_empty() {
                continue;
            }

            let frames = frame_times(selection.range, self.sample_rate);
            let mut shadow = (self.make_shadow)();
            let bone_order = topological_bone_order(&shadow);
            if bone_order.is_empty() {
                debug!(?root, "anim_params_to_bones: shadow model has no bones, skipping");
                continue;
            }

            let mut per_bone: std::collections::HashMap<String, Vec<Value>> =
                bone_order.iter().cloned().map(|b| (b, Vec::with_capacity(frames.len()))).collect();

            for &t in &frames {
                for (name, seq) in &sampled {
                    let value = match seq.get_value_at(t, Value::default_for(ValueTypeId::Float)) {
                        Value::Float(f) => f,
                        _ => 0.0,
                    };
                    shadow.set_parameter(name, value);
                }
                shadow.tick(dt);

                for bone in &bone_order {
                    let transform = shadow.bone_parent_space(bone);
                    per_bone.get_mut(bone).unwrap().push(Value::Transform(transform));
                }
            }

            for bone in bone_order {
                let values = per_bone.remove(&bone).expect("every bone populated above");
                out.push(CompiledPropertyTrack {
                    parent: root,
                    name: bone,
                    target_type: ValueTypeId::Transform,
                    blocks: vec![block_from_values(selection.range, self.sample_rate, values)],
                });
            }
        }

        out
    }

    fn cancel(&mut self) {}
}
