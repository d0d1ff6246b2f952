//! The typed value system: a closed sum type plus per-type equality,
//! interpolation and codec operations, dispatched on the sum discriminator
//! rather than through host-runtime dynamic dispatch.
//!
//! The per-type lerp/slerp implementations are carried over from
//! `motiongfx_engine`'s `interpolation.rs` (`Interpolation` trait,
//! `impl_animatable!` over `bevy_math`/`bevy_color`/`bevy_transform` types);
//! what changes is the shape around them, from an open trait any `T:
//! Interpolation` could implement to the closed [`Value`] enum this engine
//! calls for.

use bevy_color::Color;
use bevy_math::{Quat, Vec2, Vec3, Vec4};
use bevy_transform::components::Transform;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Stable string tag identifying a registered [`Value`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueTypeId {
    Bool,
    Int,
    Float,
    Vec2,
    Vec3,
    Vec4,
    Quat,
    Rgba,
    Transform,
    BoneRef,
    Action,
}

impl ValueTypeId {
    /// The stable tag used in the persisted format and error messages.
    pub const fn tag(self) -> &'static str {
        match self {
            ValueTypeId::Bool => "bool",
            ValueTypeId::Int => "int",
            ValueTypeId::Float => "float",
            ValueTypeId::Vec2 => "vec2",
            ValueTypeId::Vec3 => "vec3",
            ValueTypeId::Vec4 => "vec4",
            ValueTypeId::Quat => "quat",
            ValueTypeId::Rgba => "rgba",
            ValueTypeId::Transform => "transform",
            ValueTypeId::BoneRef => "bone_ref",
            ValueTypeId::Action => "action",
        }
    }

    /// Type-default epsilon used by [`Value::almost_equal`] when the
    /// caller does not supply one.
    pub const fn default_epsilon(self) -> f32 {
        match self {
            ValueTypeId::Bool | ValueTypeId::Int => 0.0,
            ValueTypeId::Quat | ValueTypeId::Rgba => 1e-4,
            _ => 1e-5,
        }
    }
}

impl core::fmt::Display for ValueTypeId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}

/// A value held by a block, keyframe, or property write. Interpolable
/// variants implement [`Value::lerp`]/[`Value::cubic`]; [`Value::BoneRef`]
/// and [`Value::Action`] are opaque and never interpolate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    /// Stored as a unit quaternion; callers that construct one directly
    /// are responsible for normalizing it.
    Quat(Quat),
    Rgba(Color),
    Transform(TransformValue),
    /// A bone path under a `BoneAccessor` (see `crate::binder`), e.g.
    /// `"Hips/Spine/Spine1"`. Not interpolable.
    BoneRef(String),
    /// An opaque event payload. Fires once on crossing; never
    /// interpolated.
    Action(Vec<u8>),
}

/// Position + rotation + scale, lerped componentwise. A thin serializable
/// wrapper around [`bevy_transform::components::Transform`], which is not
/// itself `Serialize`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformValue {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl From<Transform> for TransformValue {
    fn from(t: Transform) -> Self {
        TransformValue {
            translation: t.translation,
            rotation: t.rotation,
            scale: t.scale,
        }
    }
}

impl From<TransformValue> for Transform {
    fn from(t: TransformValue) -> Self {
        Transform {
            translation: t.translation,
            rotation: t.rotation,
            scale: t.scale,
        }
    }
}

impl Value {
    pub const fn type_id(&self) -> ValueTypeId {
        match self {
            Value::Bool(_) => ValueTypeId::Bool,
            Value::Int(_) => ValueTypeId::Int,
            Value::Float(_) => ValueTypeId::Float,
            Value::Vec2(_) => ValueTypeId::Vec2,
            Value::Vec3(_) => ValueTypeId::Vec3,
            Value::Vec4(_) => ValueTypeId::Vec4,
            Value::Quat(_) => ValueTypeId::Quat,
            Value::Rgba(_) => ValueTypeId::Rgba,
            Value::Transform(_) => ValueTypeId::Transform,
            Value::BoneRef(_) => ValueTypeId::BoneRef,
            Value::Action(_) => ValueTypeId::Action,
        }
    }

    /// The type's zero-like default, used when sampling past the last
    /// known block on a track that never had one.
    pub fn default_for(ty: ValueTypeId) -> Value {
        match ty {
            ValueTypeId::Bool => Value::Bool(false),
            ValueTypeId::Int => Value::Int(0),
            ValueTypeId::Float => Value::Float(0.0),
            ValueTypeId::Vec2 => Value::Vec2(Vec2::ZERO),
            ValueTypeId::Vec3 => Value::Vec3(Vec3::ZERO),
            ValueTypeId::Vec4 => Value::Vec4(Vec4::ZERO),
            ValueTypeId::Quat => Value::Quat(Quat::IDENTITY),
            ValueTypeId::Rgba => Value::Rgba(Color::WHITE),
            ValueTypeId::Transform => Value::Transform(Transform::IDENTITY.into()),
            ValueTypeId::BoneRef => Value::BoneRef(String::new()),
            ValueTypeId::Action => Value::Action(Vec::new()),
        }
    }

    /// Bit-exact equality.
    pub fn equal(&self, other: &Value) -> bool {
        self == other
    }

    /// Equality within a typed epsilon; `eps` defaults to
    /// [`ValueTypeId::default_epsilon`] when `None`.
    pub fn almost_equal(&self, other: &Value, eps: Option<f32>) -> bool {
        let eps = eps.unwrap_or_else(|| self.type_id().default_epsilon());
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => (a - b).abs() <= eps,
            (Value::Vec2(a), Value::Vec2(b)) => a.distance(*b) <= eps,
            (Value::Vec3(a), Value::Vec3(b)) => a.distance(*b) <= eps,
            (Value::Vec4(a), Value::Vec4(b)) => a.distance(*b) <= eps,
            (Value::Quat(a), Value::Quat(b)) => {
                // Unit quaternions q and -q represent the same rotation.
                (1.0 - a.dot(*b).abs()) <= eps
            }
            (Value::Rgba(a), Value::Rgba(b)) => {
                let a = a.to_linear();
                let b = b.to_linear();
                Vec4::new(a.red, a.green, a.blue, a.alpha)
                    .distance(Vec4::new(b.red, b.green, b.blue, b.alpha))
                    <= eps
            }
            (Value::Transform(a), Value::Transform(b)) => {
                a.translation.distance(b.translation) <= eps
                    && (1.0 - a.rotation.dot(b.rotation).abs()) <= eps
                    && a.scale.distance(b.scale) <= eps
            }
            (Value::BoneRef(a), Value::BoneRef(b)) => a == b,
            (Value::Action(a), Value::Action(b)) => a == b,
            _ => false,
        }
    }

    /// Linear interpolation for `t` in `[0, 1]`. `None` if the two values
    /// have mismatched or non-interpolable types.
    pub fn lerp(&self, other: &Value, t: f32) -> Option<Value> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => Some(Value::Bool(if t < 0.5 { *a } else { *b })),
            (Value::Int(a), Value::Int(b)) => {
                Some(Value::Int((*a as f64 + (*b - *a) as f64 * t as f64).round() as i64))
            }
            (Value::Float(a), Value::Float(b)) => Some(Value::Float(a + (b - a) * t)),
            (Value::Vec2(a), Value::Vec2(b)) => Some(Value::Vec2(a.lerp(*b, t))),
            (Value::Vec3(a), Value::Vec3(b)) => Some(Value::Vec3(a.lerp(*b, t))),
            (Value::Vec4(a), Value::Vec4(b)) => Some(Value::Vec4(a.lerp(*b, t))),
            (Value::Quat(a), Value::Quat(b)) => Some(Value::Quat(slerp_shortest_arc(*a, *b, t))),
            (Value::Rgba(a), Value::Rgba(b)) => Some(Value::Rgba(Color::mix(a, b, t))),
            (Value::Transform(a), Value::Transform(b)) => Some(Value::Transform(TransformValue {
                translation: a.translation.lerp(b.translation, t),
                rotation: slerp_shortest_arc(a.rotation, b.rotation, t),
                scale: a.scale.lerp(b.scale, t),
            })),
            // BoneRef and Action are opaque: no continuous interpolation.
            _ => None,
        }
    }

    /// Catmull-Rom cubic interpolation across the `v1 -> v2` segment with
    /// neighbors `v0`/`v3`, for `t` in `[0, 1]`. `None` for non-interpolable
    /// types (the curve falls back to [`Value::lerp`] or a constant, see
    /// `crate::keyframe`).
    pub fn cubic(v0: &Value, v1: &Value, v2: &Value, v3: &Value, t: f32) -> Option<Value> {
        match (v0, v1, v2, v3) {
            (Value::Float(a), Value::Float(b), Value::Float(c), Value::Float(d)) => {
                Some(Value::Float(catmull_rom_f32(*a, *b, *c, *d, t)))
            }
            (Value::Int(a), Value::Int(b), Value::Int(c), Value::Int(d)) => Some(Value::Int(
                catmull_rom_f32(*a as f32, *b as f32, *c as f32, *d as f32, t).round() as i64,
            )),
            (Value::Vec2(a), Value::Vec2(b), Value::Vec2(c), Value::Vec2(d)) => {
                Some(Value::Vec2(Vec2::new(
                    catmull_rom_f32(a.x, b.x, c.x, d.x, t),
                    catmull_rom_f32(a.y, b.y, c.y, d.y, t),
                )))
            }
            (Value::Vec3(a), Value::Vec3(b), Value::Vec3(c), Value::Vec3(d)) => {
                Some(Value::Vec3(Vec3::new(
                    catmull_rom_f32(a.x, b.x, c.x, d.x, t),
                    catmull_rom_f32(a.y, b.y, c.y, d.y, t),
                    catmull_rom_f32(a.z, b.z, c.z, d.z, t),
                )))
            }
            (Value::Vec4(a), Value::Vec4(b), Value::Vec4(c), Value::Vec4(d)) => {
                Some(Value::Vec4(Vec4::new(
                    catmull_rom_f32(a.x, b.x, c.x, d.x, t),
                    catmull_rom_f32(a.y, b.y, c.y, d.y, t),
                    catmull_rom_f32(a.z, b.z, c.z, d.z, t),
                    catmull_rom_f32(a.w, b.w, c.w, d.w, t),
                )))
            }
            (Value::Quat(a), Value::Quat(b), Value::Quat(c), Value::Quat(d)) => {
                // Component-wise Catmull-Rom followed by renormalization;
                // an approximation, but continuous and boundary-correct.
                let b2 = if b.dot(*c) < 0.0 { -*b } else { *b };
                let a2 = if a.dot(b2) < 0.0 { -*a } else { *a };
                let d2 = if d.dot(*c) < 0.0 { -*d } else { *d };
                let q = Quat::from_xyzw(
                    catmull_rom_f32(a2.x, b2.x, c.x, d2.x, t),
                    catmull_rom_f32(a2.y, b2.y, c.y, d2.y, t),
                    catmull_rom_f32(a2.z, b2.z, c.z, d2.z, t),
                    catmull_rom_f32(a2.w, b2.w, c.w, d2.w, t),
                );
                Some(Value::Quat(q.normalize()))
            }
            (
                Value::Transform(a),
                Value::Transform(b),
                Value::Transform(c),
                Value::Transform(d),
            ) => {
                let translation = Vec3::new(
                    catmull_rom_f32(a.translation.x, b.translation.x, c.translation.x, d.translation.x, t),
                    catmull_rom_f32(a.translation.y, b.translation.y, c.translation.y, d.translation.y, t),
                    catmull_rom_f32(a.translation.z, b.translation.z, c.translation.z, d.translation.z, t),
                );
                let scale = Vec3::new(
                    catmull_rom_f32(a.scale.x, b.scale.x, c.scale.x, d.scale.x, t),
                    catmull_rom_f32(a.scale.y, b.scale.y, c.scale.y, d.scale.y, t),
                    catmull_rom_f32(a.scale.z, b.scale.z, c.scale.z, d.scale.z, t),
                );
                let rotation = match Value::cubic(
                    &Value::Quat(a.rotation),
                    &Value::Quat(b.rotation),
                    &Value::Quat(c.rotation),
                    &Value::Quat(d.rotation),
                    t,
                ) {
                    Some(Value::Quat(q)) => q,
                    _ => unreachable!(),
                };
                Some(Value::Transform(TransformValue {
                    translation,
                    rotation,
                    scale,
                }))
            }
            (Value::Bool(_), Value::Bool(b), Value::Bool(c), Value::Bool(_)) => {
                Some(Value::Bool(if t < 0.5 { *b } else { *c }))
            }
            _ => None,
        }
    }

    /// Encode as a length-prefixed byte stream: a 4-byte little-endian
    /// length followed by a JSON payload.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let json = serde_json::to_vec(self).expect("Value serialization is infallible");
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(&json);
    }

    /// Decode a single length-prefixed value from the front of `bytes`,
    /// returning the value and the number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Value, usize)> {
        if bytes.len() < 4 {
            return Err(EngineError::DecodeError("truncated length prefix".into()));
        }
        let len = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let body = bytes
            .get(4..4 + len)
            .ok_or_else(|| EngineError::DecodeError("truncated payload".into()))?;
        let value: Value =
            serde_json::from_slice(body).map_err(|e| EngineError::DecodeError(e.to_string()))?;
        Ok((value, 4 + len))
    }
}

fn slerp_shortest_arc(a: Quat, b: Quat, t: f32) -> Quat {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    a.slerp(b, t)
}

/// Uniform Catmull-Rom (tension 1/2) across the `p1 -> p2` segment.
fn catmull_rom_f32(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}
