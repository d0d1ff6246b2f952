//! Blocks: `(TimeRange, payload)` units of sampled track data, and the
//! per-track sequence operations (`get_blocks`, `get_value_at`,
//! `add_range`, `shift`, `remove`) that keep them non-overlapping and
//! ordered.
//!
//! This is new engineering — `motiongfx_engine`'s `Keyframes<T>`
//! (`sequence/keyframe.rs`) samples a single dense keyframe list via binary
//! search, with no notion of inserting/overwriting a sub-range of existing
//! data. The binary-search sampling shape is kept (`BlockSeq::get_value_at`
//! locates the containing block the same way `Keyframes::sample` locates
//! the bracketing pair), generalized to three block kinds and a mutable,
//! overlap-resolving sequence.

use serde::{Deserialize, Serialize};

use crate::time::{TimeRange, T};
use crate::value::{Value, ValueTypeId};

/// The payload held by a [`Block`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BlockPayload {
    /// A single value held across the whole range.
    Constant(Value),
    /// A dense array of values at a fixed sample rate.
    Samples(SamplesBlock),
    /// An atomic event payload. Evaluated as "fires once on crossing";
    /// never interpolated.
    Action(Vec<u8>),
}

/// A dense run of samples at `sample_rate`; sample `i` lands at
/// `range.start + i / sample_rate`. `values.len() == frame_count(range,
/// sample_rate) + 1` (both endpoints included).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplesBlock {
    pub sample_rate: u32,
    pub values: Vec<Value>,
}

/// A `(range, payload)` unit of track data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub range: TimeRange,
    pub payload: BlockPayload,
}

impl Block {
    pub fn constant(range: TimeRange, value: Value) -> Self {
        debug_assert!(!range.is_empty(), "constant blocks must have positive duration");
        Block {
            range,
            payload: BlockPayload::Constant(value),
        }
    }

    pub fn samples(range: TimeRange, sample_rate: u32, values: Vec<Value>) -> Self {
        debug_assert!(!range.is_empty(), "sample blocks must have positive duration");
        debug_assert_eq!(
            values.len() as i64,
            T::frame_count(range, sample_rate).unwrap_or(0) + 1,
            "samples block length must be frame_count(range, rate) + 1",
        );
        Block {
            range,
            payload: BlockPayload::Samples(SamplesBlock { sample_rate, values }),
        }
    }

    pub fn action(range: TimeRange, payload: Vec<u8>) -> Self {
        Block {
            range,
            payload: BlockPayload::Action(payload),
        }
    }

    pub fn value_type(&self) -> Option<ValueTypeId> {
        match &self.payload {
            BlockPayload::Constant(v) => Some(v.type_id()),
            BlockPayload::Samples(s) => s.values.first().map(Value::type_id),
            BlockPayload::Action(_) => Some(ValueTypeId::Action),
        }
    }

    pub(crate) fn shifted(&self, delta: T) -> Block {
        Block {
            range: self.range.shift(delta),
            payload: self.payload.clone(),
        }
    }

    /// Value at `t`, assumed to already be known to lie within `self.range`.
    fn sample_within(&self, t: T) -> Value {
        match &self.payload {
            BlockPayload::Constant(v) => v.clone(),
            BlockPayload::Action(bytes) => Value::Action(bytes.clone()),
            BlockPayload::Samples(s) => s.sample_at(self.range.start, t),
        }
    }

    /// The block's value at its own terminal instant (`range.end`):
    /// its held value for Constant/Action, its final sample (not an
    /// interpolated point near it) for Samples. Used to "hold" a block's
    /// last known value past `range.end`.
    fn terminal_value(&self) -> Value {
        match &self.payload {
            BlockPayload::Constant(v) => v.clone(),
            BlockPayload::Action(bytes) => Value::Action(bytes.clone()),
            BlockPayload::Samples(s) => s.values.last().cloned().unwrap_or(Value::Bool(false)),
        }
    }
}

impl SamplesBlock {
    /// Linear interpolation between the two bracketing samples of a block
    /// starting at `range_start`; clamps at the endpoints.
    fn sample_at(&self, range_start: T, t: T) -> Value {
        let period = grid_period(self.sample_rate);
        let offset = t.saturating_sub(range_start);
        let last_index = self.values.len() as i64 - 1;

        let idx = offset.ticks() / period.ticks();
        let idx = idx.clamp(0, last_index);

        if idx == last_index {
            return self.values[idx as usize].clone();
        }

        let sample_time = period.ticks() * idx;
        let frac_ticks = offset.ticks() - sample_time;
        if frac_ticks <= 0 {
            return self.values[idx as usize].clone();
        }

        let t_norm = frac_ticks as f32 / period.ticks() as f32;
        let a = &self.values[idx as usize];
        let b = &self.values[(idx + 1) as usize];
        a.lerp(b, t_norm).unwrap_or_else(|| a.clone())
    }
}

fn grid_period(rate: u32) -> T {
    T::from_frames(1, rate).expect("sample rate already validated against BASE_RATE")
}

fn floor_to_block_grid(origin: T, rate: u32, t: T) -> T {
    let period = grid_period(rate);
    origin + t.saturating_sub(origin).floor(period)
}

fn ceil_to_block_grid(origin: T, rate: u32, t: T) -> T {
    let period = grid_period(rate);
    origin + t.saturating_sub(origin).ceil(period)
}

/// An ordered, non-overlapping run of [`Block`]s belonging to one track.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockSeq {
    blocks: Vec<Block>,
}

impl BlockSeq {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Blocks whose range intersects `range`, in time order.
    pub fn get_blocks(&self, range: TimeRange) -> impl Iterator<Item = &Block> {
        self.blocks.iter().filter(move |b| b.range.overlaps(range))
    }

    /// The track's value at `t`. Inside a block, interpolates per its
    /// kind; outside every block, holds the last known value (the
    /// rightmost block ending at or before `t`), falling back to
    /// `default` if there is none.
    pub fn get_value_at(&self, t: T, default: Value) -> Value {
        match self.containing_index(t) {
            Ok(idx) => self.blocks[idx].sample_within(t),
            Err(idx) => {
                if idx == 0 {
                    default
                } else {
                    self.blocks[idx - 1].terminal_value()
                }
            }
        }
    }

    /// `Ok(index)` of the block containing `t`, `Err(index)` of the
    /// insertion point otherwise (the index of the first block starting
    /// after `t`).
    fn containing_index(&self, t: T) -> Result<usize, usize> {
        // `partition_point` would also work; a manual scan keeps behavior
        // obvious for the (usually tiny) per-track block count.
        for (i, b) in self.blocks.iter().enumerate() {
            if b.range.contains(t) {
                return Ok(i);
            }
            if b.range.start == b.range.end && b.range.start == t {
                // Zero-duration (action) blocks are "contained" only at
                // their exact instant.
                return Ok(i);
            }
            if b.range.start > t {
                return Err(i);
            }
        }
        Err(self.blocks.len())
    }

    /// Translate every block's range by `delta`; no other changes.
    pub fn shift(&mut self, delta: T) {
        for b in &mut self.blocks {
            *b = b.shifted(delta);
        }
    }

    /// Erase blocks inside `range`, truncating or splitting any that only
    /// partially overlap it.
    pub fn remove(&mut self, range: TimeRange) {
        self.carve_out(range);
    }

    /// Insert `incoming` (itself ordered and non-overlapping) applying the
    /// overwrite policy against any existing blocks it conflicts with.
    pub fn add_range(&mut self, incoming: Vec<Block>) {
        debug_assert!(
            incoming.windows(2).all(|w| w[0].range.end <= w[1].range.start),
            "add_range requires incoming blocks to be ordered and non-overlapping"
        );
        for block in incoming {
            self.carve_out(block.range);
            let pos = self
                .blocks
                .partition_point(|b| b.range.start < block.range.start);
            self.blocks.insert(pos, block);
        }
    }

    /// Remove/truncate/split every existing block overlapping `range`.
    fn carve_out(&mut self, range: TimeRange) {
        if range.is_empty() {
            // A zero-duration cut only removes zero-duration (action)
            // blocks sitting at exactly that instant.
            self.blocks
                .retain(|b| !(b.range.start == b.range.end && b.range.start == range.start));
            return;
        }

        let mut result = Vec::with_capacity(self.blocks.len());
        for b in self.blocks.drain(..) {
            let Some(overlap) = b.range.intersect(range) else {
                result.push(b);
                continue;
            };

            if overlap == b.range {
                // Incoming strictly contains the existing block: drop it.
                continue;
            }

            if range.start <= b.range.start {
                // Overlap trims the existing block's prefix.
                let new_start = ceil_to_block_grid_for(&b, range.end);
                if let Some(trimmed) = b.right_part(new_start) {
                    result.push(trimmed);
                }
            } else if range.end >= b.range.end {
                // Overlap trims the existing block's suffix.
                let new_end = floor_to_block_grid_for(&b, range.start);
                if let Some(trimmed) = b.left_part(new_end) {
                    result.push(trimmed);
                }
            } else {
                // Incoming is strictly inside: split into two.
                let left_end = floor_to_block_grid_for(&b, range.start);
                let right_start = ceil_to_block_grid_for(&b, range.end);
                if let Some(left) = b.left_part(left_end) {
                    result.push(left);
                }
                if let Some(right) = b.right_part(right_start) {
                    result.push(right);
                }
            }
        }
        result.sort_by_key(|b| b.range.start.ticks());
        self.blocks = result;
    }
}

fn floor_to_block_grid_for(b: &Block, t: T) -> T {
    match &b.payload {
        BlockPayload::Samples(s) => floor_to_block_grid(b.range.start, s.sample_rate, t),
        _ => t,
    }
}

fn ceil_to_block_grid_for(b: &Block, t: T) -> T {
    match &b.payload {
        BlockPayload::Samples(s) => ceil_to_block_grid(b.range.start, s.sample_rate, t),
        _ => t,
    }
}

impl Block {
    /// The `[range.start, new_end)` portion of this block, or `None` if
    /// that leaves no positive-duration range.
    fn left_part(&self, new_end: T) -> Option<Block> {
        if new_end <= self.range.start {
            return None;
        }
        let range = TimeRange::new(self.range.start, new_end);
        Some(Block {
            range,
            payload: self.payload.resliced(self.range.start, range),
        })
    }

    /// The `[new_start, range.end)` portion of this block, or `None` if
    /// that leaves no positive-duration range.
    fn right_part(&self, new_start: T) -> Option<Block> {
        if new_start >= self.range.end {
            return None;
        }
        let range = TimeRange::new(new_start, self.range.end);
        Some(Block {
            range,
            payload: self.payload.resliced(self.range.start, range),
        })
    }
}

impl BlockPayload {
    fn resliced(&self, orig_start: T, new_range: TimeRange) -> BlockPayload {
        match self {
            BlockPayload::Constant(v) => BlockPayload::Constant(v.clone()),
            BlockPayload::Action(bytes) => BlockPayload::Action(bytes.clone()),
            BlockPayload::Samples(s) => {
                let period = grid_period(s.sample_rate);
                let start_idx = (new_range.start.saturating_sub(orig_start).ticks() / period.ticks())
                    as usize;
                let count = T::frame_count(new_range, s.sample_rate).unwrap_or(0) as usize + 1;
                let end_idx = (start_idx + count).min(s.values.len());
                let start_idx = start_idx.min(end_idx);
                BlockPayload::Samples(SamplesBlock {
                    sample_rate: s.sample_rate,
                    values: s.values[start_idx..end_idx].to_vec(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv(f: f32) -> Value {
        Value::Float(f)
    }

    fn ticks(n: i64) -> T {
        T::from_ticks(n)
    }

    #[test]
    fn scenario_block_sampling_at_30fps() {
        // Project sampleRate = 30, one Samples block over [0, 2s) with
        // values 0..=60 (61 samples, endpoints included per the block
        // invariant).
        let rate = 30;
        let range = TimeRange::new(T::ZERO, T::from_frames(60, rate).unwrap());
        let values: Vec<Value> = (0..=60).map(|i| tv(i as f32)).collect();
        let mut seq = BlockSeq::new();
        seq.add_range(vec![Block::samples(range, rate, values)]);

        let half_sec = T::from_frames(15, rate).unwrap();
        assert_eq!(
            seq.get_value_at(half_sec, Value::Float(0.0)),
            Value::Float(15.0)
        );

        let one_sec = T::from_frames(30, rate).unwrap();
        assert_eq!(
            seq.get_value_at(one_sec, Value::Float(0.0)),
            Value::Float(30.0)
        );

        // t=2s is the range's exclusive end, so this holds the block's
        // last known value: its final sample, 60.0, not an interpolated
        // point near it.
        let two_sec = T::from_frames(60, rate).unwrap();
        assert_eq!(
            seq.get_value_at(two_sec, Value::Float(0.0)),
            Value::Float(60.0)
        );
    }

    #[test]
    fn scenario_overwrite_truncation() {
        let rate = 30;
        let mut seq = BlockSeq::new();
        let ten_s = T::from_frames(10 * rate as i64, rate).unwrap();
        seq.add_range(vec![Block::constant(
            TimeRange::new(T::ZERO, ten_s),
            tv(1.0), // "A"
        )]);

        let three_s = T::from_frames(3 * rate as i64, rate).unwrap();
        let seven_s = T::from_frames(7 * rate as i64, rate).unwrap();
        let b_len = T::frame_count(TimeRange::new(three_s, seven_s), rate).unwrap() + 1;
        let b_values: Vec<Value> = (0..b_len).map(|_| tv(2.0)).collect(); // "B"
        seq.add_range(vec![Block::samples(
            TimeRange::new(three_s, seven_s),
            rate,
            b_values,
        )]);

        let blocks = seq.blocks();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].range, TimeRange::new(T::ZERO, three_s));
        assert!(matches!(blocks[0].payload, BlockPayload::Constant(Value::Float(v)) if v == 1.0));
        assert_eq!(blocks[1].range, TimeRange::new(three_s, seven_s));
        assert_eq!(blocks[2].range, TimeRange::new(seven_s, ten_s));
        assert!(matches!(blocks[2].payload, BlockPayload::Constant(Value::Float(v)) if v == 1.0));
    }

    #[test]
    fn get_blocks_returns_intersecting_in_time_order() {
        let mut seq = BlockSeq::new();
        seq.add_range(vec![
            Block::constant(TimeRange::new(ticks(0), ticks(10)), tv(1.0)),
            Block::constant(TimeRange::new(ticks(20), ticks(30)), tv(2.0)),
        ]);

        let got: Vec<_> = seq.get_blocks(TimeRange::new(ticks(5), ticks(25))).collect();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].range, TimeRange::new(ticks(0), ticks(10)));
    }

    #[test]
    fn remove_splits_block_around_a_hole() {
        let mut seq = BlockSeq::new();
        seq.add_range(vec![Block::constant(
            TimeRange::new(ticks(0), ticks(100)),
            tv(1.0),
        )]);
        seq.remove(TimeRange::new(ticks(40), ticks(60)));

        let blocks = seq.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].range, TimeRange::new(ticks(0), ticks(40)));
        assert_eq!(blocks[1].range, TimeRange::new(ticks(60), ticks(100)));
    }

    #[test]
    fn shift_translates_every_block() {
        let mut seq = BlockSeq::new();
        seq.add_range(vec![Block::constant(
            TimeRange::new(ticks(0), ticks(10)),
            tv(1.0),
        )]);
        seq.shift(ticks(50));
        assert_eq!(seq.blocks()[0].range, TimeRange::new(ticks(50), ticks(60)));
    }

    #[test]
    fn outside_any_block_holds_last_known_value() {
        let mut seq = BlockSeq::new();
        seq.add_range(vec![Block::constant(
            TimeRange::new(ticks(0), ticks(10)),
            tv(7.0),
        )]);
        assert_eq!(seq.get_value_at(ticks(100), tv(0.0)), tv(7.0));
        assert_eq!(seq.get_value_at(ticks(-5), tv(0.0)), tv(0.0));
    }

    #[test]
    fn idempotent_remove_then_add_back() {
        let rate = 30;
        let range = TimeRange::new(T::ZERO, T::from_frames(60, rate).unwrap());
        let values: Vec<Value> = (0..=60).map(|i| tv(i as f32)).collect();
        let mut seq = BlockSeq::new();
        seq.add_range(vec![Block::samples(range, rate, values.clone())]);
        let before = seq.clone();

        let cut = TimeRange::new(
            T::from_frames(10, rate).unwrap(),
            T::from_frames(20, rate).unwrap(),
        );
        let reinserted = Block::samples(
            cut,
            rate,
            values[10..=20].to_vec(),
        );
        seq.remove(cut);
        seq.add_range(vec![reinserted]);

        assert_eq!(seq.blocks(), before.blocks());
    }
}
