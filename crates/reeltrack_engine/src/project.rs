//! The Clip/Project container (§3 "Clip / Project"): the root that owns a
//! forest of tracks plus `sampleRate`/`duration`/`defaultInterpolation`
//! metadata, and its persisted form (§6.1).
//!
//! New engineering — `motiongfx_engine` has no save/load format at all (a
//! sequence it authors is built in code, never serialized to disk) —
//! grounded on `moonfire-nvr`'s and `librePvZ-librePvZ`'s (`libre_pvz_resources`)
//! tagged-document `serde`/`serde_json` models for the shape of
//! `PersistedProject` below.

use serde::{Deserialize, Serialize};

use crate::block::{Block, BlockPayload};
use crate::error::{EngineError, Result};
use crate::keyframe::{Interpolation, Keyframe, KeyframeCurve};
use crate::time::T;
use crate::track::{TrackId, TrackKind, TrackTree};
use crate::value::ValueTypeId;

/// The root container a host editor loads, plays, and saves: a
/// [`TrackTree`] plus the metadata of §3 "Clip / Project".
pub struct Project {
    pub tracks: TrackTree,
    pub sample_rate: u32,
    pub default_interpolation: Interpolation,
    /// `Some` pins the duration explicitly; `None` derives it from the
    /// union of every track's block ranges (§3).
    pinned_duration: Option<T>,
}

impl Project {
    pub fn new(sample_rate: u32, default_interpolation: Interpolation) -> Result<Self> {
        // Validate eagerly: an invalid project-wide rate would otherwise
        // only surface the first time a track tries to use it.
        T::from_frames(1, sample_rate)?;
        Ok(Project {
            tracks: TrackTree::new(),
            sample_rate,
            default_interpolation,
            pinned_duration: None,
        })
    }

    pub fn pin_duration(&mut self, duration: T) {
        self.pinned_duration = Some(duration);
    }

    pub fn unpin_duration(&mut self) {
        self.pinned_duration = None;
    }

    /// The project's duration: the pinned value if one was set, otherwise
    /// the latest end of any block on any track (§3).
    pub fn duration(&self) -> T {
        if let Some(pinned) = self.pinned_duration {
            return pinned;
        }
        self.tracks
            .roots()
            .into_iter()
            .flat_map(|root| self.tracks.iter_depth_first(root))
            .filter_map(|id| self.tracks.blocks(id).ok())
            .flat_map(|seq| seq.blocks().iter())
            .map(|b| b.range.end)
            .max()
            .unwrap_or(T::ZERO)
    }

    /// Serialize to the persisted document of §6.1.
    pub fn to_persisted(&self) -> PersistedProject {
        let mut tracks = Vec::new();
        for root in self.tracks.roots() {
            for id in self.tracks.iter_depth_first(root) {
                let Some(node) = self.tracks.find(id) else { continue };
                let blocks = self.tracks.blocks(id).ok().filter(|seq| !seq.is_empty());
                let curve = self.tracks.curve(id).ok().filter(|c| !c.keyframes().is_empty());

                tracks.push(PersistedTrack {
                    id: node.id,
                    parent_id: node.parent,
                    kind: node.kind,
                    name: node.name.clone(),
                    target_type: node.target_type,
                    locked: node.locked,
                    blocks: blocks.map(|seq| seq.blocks().to_vec()),
                    keyframes: curve.map(|c| c.keyframes().to_vec()),
                });
            }
        }

        PersistedProject {
            sample_rate: self.sample_rate,
            default_interpolation: self.default_interpolation,
            tracks,
        }
    }

    /// Rebuild a [`Project`] from a persisted document. Tracks are
    /// recreated in document order, so a parent must appear before any of
    /// its children (true of every document produced by
    /// [`Project::to_persisted`]), and each keeps its persisted `id`
    /// exactly (§6.1: `id` is a bit-exact round-trip field).
    pub fn from_persisted(doc: &PersistedProject) -> Result<Self> {
        let mut project = Project::new(doc.sample_rate, doc.default_interpolation)?;

        for t in &doc.tracks {
            match t.parent_id {
                Some(parent) => project.tracks.add_child_with_id(
                    t.id,
                    parent,
                    t.name.clone(),
                    t.kind,
                    t.target_type,
                    doc.sample_rate,
                )?,
                None => project.tracks.add_root_with_id(
                    t.id,
                    t.name.clone(),
                    t.kind,
                    t.target_type,
                    doc.sample_rate,
                )?,
            };

            if t.locked {
                project.tracks.set_locked(t.id, true)?;
            }
            if let Some(blocks) = &t.blocks {
                project.tracks.blocks_mut(t.id)?.add_range(blocks.clone());
            }
            if let Some(keyframes) = &t.keyframes {
                let mut curve = KeyframeCurve::new();
                for kf in keyframes {
                    curve.set(kf.clone());
                }
                project.tracks.set_curve(t.id, curve)?;
            }
        }

        Ok(project)
    }
}

/// The wire schema of §6.1: `sampleRate`, `defaultInterpolation`, and an
/// ordered list of tracks each carrying its own blocks or keyframes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedProject {
    #[serde(rename = "sampleRate")]
    pub sample_rate: u32,
    #[serde(rename = "defaultInterpolation")]
    pub default_interpolation: Interpolation,
    pub tracks: Vec<PersistedTrack>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedTrack {
    pub id: TrackId,
    #[serde(rename = "parentId")]
    pub parent_id: Option<TrackId>,
    pub kind: TrackKind,
    pub name: String,
    #[serde(rename = "targetType")]
    pub target_type: Option<ValueTypeId>,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<Block>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyframes: Option<Vec<Keyframe>>,
}

impl PersistedProject {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| EngineError::DecodeError(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::DecodeError(e.to_string()))
    }
}
