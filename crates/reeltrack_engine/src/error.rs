//! Error kinds shared by every fallible operation in the engine.
//!
//! One flat enum, as in `librePvZ`'s `reanim-decode` and `Wavyte`'s
//! `wavyte-core` crates: edit operations, the binder, and the recorder all
//! return the same [`EngineError`] rather than defining a type per module.

use uuid::Uuid;

use crate::time::T;
use crate::value::ValueTypeId;

/// Errors surfaced by [`crate::track`], [`crate::binder`],
/// [`crate::player`], [`crate::recorder`] and [`crate::edit_ops`].
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A sample rate does not evenly divide [`crate::time::BASE_RATE`], or
    /// is zero.
    #[error("sample rate {rate} does not divide BASE_RATE ({base})")]
    InvalidSampleRate { rate: u32, base: u32 },

    /// A property's declared value type differs from the track's, or a
    /// paste payload cannot be assigned to the destination track.
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch {
        expected: ValueTypeId,
        found: ValueTypeId,
    },

    /// No track exists with the given id.
    #[error("track {0} not found")]
    TrackNotFound(Uuid),

    /// A sibling track already uses this name under a compatible type.
    #[error("a sibling track named `{0}` already exists")]
    DuplicateName(String),

    /// The track is locked and rejects mutation.
    #[error("track {0} is locked")]
    Locked(Uuid),

    /// Reparenting would introduce a cycle in the track tree.
    #[error("reparenting {child} under {new_parent} would create a cycle")]
    CyclicParent { child: Uuid, new_parent: Uuid },

    /// A time value lies outside the clip's duration where the operation
    /// disallows it.
    #[error("time {time:?} is out of range {start:?}..{end:?}")]
    OutOfRange { time: T, start: T, end: T },

    /// A serialized payload could not be decoded.
    #[error("failed to decode payload: {0}")]
    DecodeError(String),

    /// A property write was attempted while no binding is resolvable.
    #[error("no binding resolvable for track {0}")]
    NotBound(Uuid),
}

pub type Result<T> = core::result::Result<T, EngineError>;
