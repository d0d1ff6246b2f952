//! Keyframe curves: a sparse, user-facing list of `(time, value,
//! interpolation)` points that lazily compiles to the dense [`Block`]s the
//! block engine actually samples.
//!
//! Grounded on `motiongfx_engine`'s `sequence/keyframe.rs` (`Keyframes<T>`:
//! sorted `Vec<(f32, T)>` sampled by binary search) for the sorted-list
//! shape, and on its `interpolation.rs`'s per-type lerp impls for the
//! segment math — both now routed through [`crate::value::Value`] instead
//! of a generic `Interpolation` trait.

use serde::{Deserialize, Serialize};

use crate::block::Block;
use crate::time::{TimeRange, T};
use crate::value::Value;

/// How a [`Keyframe`] blends into the segment that follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Interpolation {
    /// Hold this keyframe's value until the next keyframe's time.
    Step,
    /// Linear interpolation to the next keyframe.
    Linear,
    /// Catmull-Rom interpolation using the one keyframe before and after
    /// the segment as tangent neighbors (mirrored at the curve's ends).
    Cubic,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyframe {
    pub time: T,
    pub value: Value,
    pub interpolation: Interpolation,
}

impl Keyframe {
    pub fn new(time: T, value: Value, interpolation: Interpolation) -> Self {
        Keyframe {
            time,
            value,
            interpolation,
        }
    }
}

/// A sorted-by-time list of keyframes for one track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyframeCurve {
    keyframes: Vec<Keyframe>,
}

impl KeyframeCurve {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    /// Insert or replace the keyframe at `kf.time`, keeping the list sorted
    /// and de-duplicated by time.
    pub fn set(&mut self, kf: Keyframe) {
        match self.keyframes.binary_search_by_key(&kf.time, |k| k.time) {
            Ok(i) => self.keyframes[i] = kf,
            Err(i) => self.keyframes.insert(i, kf),
        }
    }

    pub fn remove_at(&mut self, time: T) -> Option<Keyframe> {
        self.keyframes
            .binary_search_by_key(&time, |k| k.time)
            .ok()
            .map(|i| self.keyframes.remove(i))
    }

    /// Compile into the [`Block`]s the track's block sequence should hold:
    /// a segment between each consecutive keyframe pair plus an unbounded
    /// hold after the last one. Segments whose endpoints are
    /// `almost_equal` collapse to a [`Block::constant`] regardless of the
    /// declared interpolation, matching `Value::almost_equal`'s role as
    /// the curve's "no visible change" threshold.
    pub fn compile(&self, sample_rate: u32) -> Vec<Block> {
        let n = self.keyframes.len();
        if n == 0 {
            return Vec::new();
        }

        let mut blocks = Vec::with_capacity(n);

        for i in 0..n.saturating_sub(1) {
            let k0 = &self.keyframes[i];
            let k1 = &self.keyframes[i + 1];
            let range = TimeRange::new(k0.time, k1.time);
            if range.is_empty() {
                continue;
            }

            if k0.interpolation == Interpolation::Step || k0.value.almost_equal(&k1.value, None) {
                blocks.push(Block::constant(range, k0.value.clone()));
                continue;
            }

            let left = if i > 0 { &self.keyframes[i - 1].value } else { &k0.value };
            let right = if i + 2 < n { &self.keyframes[i + 2].value } else { &k1.value };

            match sample_segment(k0, k1, left, right, range, sample_rate) {
                Some(block) => blocks.push(block),
                None => blocks.push(Block::constant(range, k0.value.clone())),
            }
        }

        if let Some(last) = self.keyframes.last() {
            blocks.push(Block::constant(
                TimeRange::new(last.time, T::MAX),
                last.value.clone(),
            ));
        }

        blocks
    }
}

fn sample_segment(
    k0: &Keyframe,
    k1: &Keyframe,
    left: &Value,
    right: &Value,
    range: TimeRange,
    sample_rate: u32,
) -> Option<Block> {
    let frame_count = T::frame_count(range, sample_rate).ok()?;
    let values = (0..=frame_count)
        .map(|i| {
            let t = if frame_count == 0 {
                1.0
            } else {
                i as f32 / frame_count as f32
            };
            match k0.interpolation {
                Interpolation::Cubic => Value::cubic(left, &k0.value, &k1.value, right, t)
                    .or_else(|| k0.value.lerp(&k1.value, t)),
                _ => k0.value.lerp(&k1.value, t),
            }
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Block::samples(range, sample_rate, values))
}
