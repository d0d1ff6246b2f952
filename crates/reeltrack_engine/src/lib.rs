//! Reeltrack's engine crate: tracks, blocks, the binder, and the
//! player/recorder/edit machinery built on top of them.
//!
//! `motiongfx_engine` is a `#![no_std]` Bevy plugin wired directly into an
//! `App`'s schedule. This crate drops that integration: every piece here is
//! a plain `Context`-style object a host editor drives explicitly (construct
//! it, call methods on it, read the result), with no `Plugin`, no
//! `Resource`, and no implicit schedule. `std` is used freely (`HashMap`,
//! `String`, ...).

pub mod binder;
pub mod block;
pub mod edit_ops;
pub mod error;
pub mod history;
pub mod keyframe;
pub mod modification;
pub mod player;
pub mod project;
pub mod recorder;
pub mod time;
pub mod track;
pub mod value;

pub mod prelude {
    pub use crate::binder::{
        Binder, BoneApplier, PropertyKind, ReflectBinder, ResolvedProperty, SceneObjectId, SceneQuery,
    };
    pub use crate::block::{Block, BlockPayload, BlockSeq, SamplesBlock};
    pub use crate::edit_ops::{self, ClipboardDoc, ClipboardGroup};
    pub use crate::error::{EngineError, Result};
    pub use crate::history::History;
    pub use crate::keyframe::{Interpolation, Keyframe, KeyframeCurve};
    pub use crate::modification::{
        AnimParamsToBones, CompiledPropertyTrack, Modification, MotionToAnimParameters,
        RotateWithMotion, ShadowModel, TimeSelection, TrackListView,
    };
    pub use crate::player::{PlayMode, Player};
    pub use crate::project::{PersistedProject, PersistedTrack, Project};
    pub use crate::recorder::{Recorder, RecorderOptions, SourceClipMeta};
    pub use crate::time::{TimeRange, BASE_RATE, T};
    pub use crate::track::{Track, TrackId, TrackKind, TrackTree};
    pub use crate::value::{TransformValue, Value, ValueTypeId};
}
