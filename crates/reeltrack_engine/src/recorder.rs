//! The Recorder: consumes live scene values at a fixed rate and emits
//! block data into recording tracks (§4.G).
//!
//! New engineering — `motiongfx_engine` has no record/capture path at all
//! (it is an authoring library, not an editor) — grounded on
//! `crate::player`'s tick shape (a plain `advance(dt)` method rather than
//! an ECS system) and on `crate::block`'s overwrite policy, which `commit`
//! hands finished blocks to.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::binder::Binder;
use crate::block::Block;
use crate::error::{EngineError, Result};
use crate::time::{TimeRange, T};
use crate::track::{TrackId, TrackTree};
use crate::value::Value;

#[derive(Debug, Clone, Copy)]
pub struct RecorderOptions {
    pub sample_rate: u32,
    pub start_time: T,
}

/// Per-track recording state (§4.G's `Idle -> Armed -> Recording ->
/// Finished` machine; tracks that fail to resolve at `start` are simply
/// absent from `states` rather than modeled as `Idle`).
enum TrackState {
    Armed { initial: Value },
    Recording { block_start: T, values: Vec<Value> },
}

/// Provenance stamped on every recording, so downstream blocks can
/// reference where they came from (grounded on moonfire-nvr's recording
/// metadata rows: an id plus a small immutable "how did this get here"
/// blob).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceClipMeta {
    pub id: Uuid,
    /// Unix seconds at the moment the recording started.
    pub recorded_at: i64,
    pub origin: String,
}

impl SourceClipMeta {
    fn new(origin: impl Into<String>) -> Self {
        SourceClipMeta {
            // Time-ordered so provenance ids sort by capture order, the same
            // way moonfire-nvr's recording rows are keyed.
            id: Uuid::now_v7(),
            recorded_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            origin: origin.into(),
        }
    }
}

pub struct Recorder {
    options: RecorderOptions,
    elapsed: T,
    states: HashMap<TrackId, TrackState>,
    finished: HashMap<TrackId, Vec<Block>>,
    source_clip: SourceClipMeta,
}

impl Recorder {
    /// Arm every resolvable track in `tracks`. Tracks that fail to
    /// resolve (`NotBound`) are skipped — they never enter the state
    /// machine and `commit` has nothing to write for them.
    pub fn start(
        binder: &mut dyn Binder,
        tree: &TrackTree,
        tracks: impl IntoIterator<Item = TrackId>,
        options: RecorderOptions,
    ) -> Self {
        let mut states = HashMap::new();
        for track in tracks {
            let Ok(resolved) = binder.resolve_property(tree, track) else {
                debug!(?track, "recorder: track not bound at start, skipping");
                continue;
            };
            let Some(initial) = binder.read(&resolved) else {
                debug!(?track, "recorder: track not bound at start, skipping");
                continue;
            };
            states.insert(track, TrackState::Armed { initial });
        }

        Recorder {
            options,
            elapsed: T::ZERO,
            states,
            finished: HashMap::new(),
            source_clip: SourceClipMeta::new("recorder"),
        }
    }

    pub fn source_clip(&self) -> &SourceClipMeta {
        &self.source_clip
    }

    /// Preview of every block currently being appended to, keyed by
    /// track, for the editor's live waveform/curve display.
    pub fn current_blocks(&self) -> HashMap<TrackId, Block> {
        self.states
            .iter()
            .filter_map(|(track, state)| match state {
                TrackState::Recording { block_start, values } => Some((
                    *track,
                    self.block_from_samples(*block_start, values.clone()),
                )),
                TrackState::Armed { .. } => None,
            })
            .collect()
    }

    /// Blocks already closed out (only populated after [`Recorder::stop`]).
    pub fn finished_blocks(&self) -> &HashMap<TrackId, Vec<Block>> {
        &self.finished
    }

    /// Advance the recording clock by `dt` wall-clock seconds and sample
    /// every armed/recording track.
    ///
    /// Per §7: a per-track `NotBound` this tick is skipped (that track
    /// simply misses a sample); any other error aborts the whole
    /// recording.
    pub fn advance(&mut self, dt: f32, binder: &mut dyn Binder, tree: &TrackTree) -> Result<()> {
        if dt <= 0.0 {
            return Ok(());
        }
        self.elapsed = self
            .elapsed
            .saturating_add(T::from_ticks((dt as f64 * crate::time::BASE_RATE as f64) as i64));

        let grid_period = T::from_frames(1, self.options.sample_rate)?;
        let aligned_time = self.elapsed.floor(grid_period);

        let tracks: Vec<TrackId> = self.states.keys().copied().collect();
        for track in tracks {
            let resolved = match binder.resolve_property(tree, track) {
                Ok(r) => r,
                Err(EngineError::NotBound(_)) => continue,
                Err(other) => return Err(other),
            };
            let Some(value) = binder.read(&resolved) else {
                continue;
            };

            let transition = match self.states.get(&track).expect("tracked") {
                TrackState::Armed { initial } if !value.equal(initial) => {
                    Some(TrackState::Recording {
                        block_start: aligned_time,
                        values: vec![initial.clone(), value.clone()],
                    })
                }
                _ => None,
            };

            if let Some(next) = transition {
                self.states.insert(track, next);
            } else if let TrackState::Recording { values, .. } =
                self.states.get_mut(&track).expect("tracked")
            {
                values.push(value);
            }
        }

        Ok(())
    }

    /// Finalize every in-progress block. After `stop`, [`Recorder::advance`]
    /// no longer mutates recording state.
    pub fn stop(&mut self) {
        let finished: Vec<(TrackId, Block)> = self
            .states
            .iter()
            .filter_map(|(track, state)| match state {
                TrackState::Recording { block_start, values } => {
                    Some((*track, self.block_from_samples(*block_start, values.clone())))
                }
                TrackState::Armed { .. } => None,
            })
            .collect();

        for (track, block) in finished {
            self.finished.entry(track).or_default().push(block);
        }
    }

    /// Collapse a run of samples to a [`Block::constant`] if every sample
    /// is within approximate equality of the first (§8 scenario 5),
    /// otherwise a [`Block::samples`].
    fn block_from_samples(&self, block_start: T, values: Vec<Value>) -> Block {
        let rate = self.options.sample_rate;
        let period = T::from_frames(1, rate).expect("validated at Recorder::start");

        if values.len() < 2 {
            let range = TimeRange::new(block_start, block_start + period);
            return Block::constant(
                range,
                values.into_iter().next().unwrap_or(Value::Bool(false)),
            );
        }

        let span = T::from_frames(values.len() as i64 - 1, rate).expect("validated at Recorder::start");
        let range = TimeRange::new(block_start, block_start + span);

        let first = values[0].clone();
        if values.iter().all(|v| v.almost_equal(&first, None)) {
            Block::constant(range, first)
        } else {
            Block::samples(range, rate, values)
        }
    }

    /// Merge `finished` (and any still-`Recording` tail, auto-stopped)
    /// into `tree` via each track's overwrite policy, shifted to
    /// `options.start_time`.
    pub fn commit(&mut self, tree: &mut TrackTree) -> Result<()> {
        self.stop();

        for (track, blocks) in self.finished.drain() {
            let shifted: Vec<Block> = blocks.iter().map(|b| b.shifted(self.options.start_time)).collect();
            match tree.blocks_mut(track) {
                Ok(seq) => seq.add_range(shifted),
                Err(EngineError::Locked(_)) => {
                    warn!(?track, "recorder: track locked at commit, dropping its recording");
                }
                Err(other) => return Err(other),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackKind;
    use crate::value::ValueTypeId;

    /// A binder bound to a single fixed target whose reported value can be
    /// changed between ticks, for driving the armed/recording transition.
    struct StubBinder {
        bound: bool,
        value: Value,
    }

    impl Binder for StubBinder {
        fn resolve_ref(&mut self, _tree: &TrackTree, _track: TrackId) -> Option<crate::binder::SceneObjectId> {
            None
        }

        fn resolve_property(&mut self, _tree: &TrackTree, track: TrackId) -> Result<crate::binder::ResolvedProperty> {
            if self.bound {
                Ok(crate::binder::ResolvedProperty {
                    target: crate::binder::SceneObjectId(0),
                    value_type: ValueTypeId::Float,
                    writable: true,
                    kind: crate::binder::PropertyKind::Direct {
                        property: "x".into(),
                    },
                })
            } else {
                Err(EngineError::NotBound(track))
            }
        }

        fn read(&self, _resolved: &crate::binder::ResolvedProperty) -> Option<Value> {
            Some(self.value.clone())
        }

        fn write(&mut self, _resolved: &crate::binder::ResolvedProperty, _value: Value) -> bool {
            false
        }

        fn invalidate(&mut self, _target: Option<crate::binder::SceneObjectId>) {}
    }

    #[test]
    fn unbound_track_is_skipped_at_start() {
        let tree = TrackTree::new();
        let track = TrackId::new_v4();
        let mut binder = StubBinder {
            bound: false,
            value: Value::Float(0.0),
        };
        let recorder = Recorder::start(
            &mut binder,
            &tree,
            vec![track],
            RecorderOptions {
                sample_rate: 30,
                start_time: T::ZERO,
            },
        );
        assert!(recorder.finished_blocks().is_empty());
    }

    #[test]
    fn advance_transitions_armed_to_recording_on_value_change() {
        let tree = TrackTree::new();
        let track = TrackId::new_v4();
        let mut binder = StubBinder {
            bound: true,
            value: Value::Float(1.0),
        };
        let mut recorder = Recorder::start(
            &mut binder,
            &tree,
            vec![track],
            RecorderOptions {
                sample_rate: 30,
                start_time: T::ZERO,
            },
        );
        assert!(matches!(recorder.states.get(&track), Some(TrackState::Armed { .. })));

        binder.value = Value::Float(2.0);
        recorder.advance(1.0 / 30.0, &mut binder, &tree).unwrap();

        assert!(matches!(
            recorder.states.get(&track),
            Some(TrackState::Recording { .. })
        ));
    }

    #[test]
    fn constant_recording_collapses_to_one_constant_block() {
        // Mirrors §8 scenario 5 at the `block_from_samples` level: a run
        // of identical samples collapses under approximate equality.
        let values = vec![Value::Float(1.0); 60];
        let recorder = Recorder {
            options: RecorderOptions {
                sample_rate: 30,
                start_time: T::ZERO,
            },
            elapsed: T::ZERO,
            states: HashMap::new(),
            finished: HashMap::new(),
            source_clip: SourceClipMeta::new("test"),
        };
        let block = recorder.block_from_samples(T::ZERO, values);
        assert!(matches!(block.payload, crate::block::BlockPayload::Constant(_)));
    }

    #[test]
    fn varying_recording_stays_a_samples_block() {
        let values: Vec<Value> = (0..10).map(|i| Value::Float(i as f32)).collect();
        let recorder = Recorder {
            options: RecorderOptions {
                sample_rate: 30,
                start_time: T::ZERO,
            },
            elapsed: T::ZERO,
            states: HashMap::new(),
            finished: HashMap::new(),
            source_clip: SourceClipMeta::new("test"),
        };
        let block = recorder.block_from_samples(T::ZERO, values);
        assert!(matches!(block.payload, crate::block::BlockPayload::Samples(_)));
    }

    #[test]
    fn commit_shifts_blocks_to_start_time() {
        let mut tree = TrackTree::new();
        let root = tree.add_root("Cube", TrackKind::Ref, None, 30).unwrap();
        let prop = tree
            .add_child(root, "Position", TrackKind::Prop, Some(ValueTypeId::Float), 30)
            .unwrap();

        let start_time = T::from_ticks(10_000);
        let mut recorder = Recorder {
            options: RecorderOptions {
                sample_rate: 30,
                start_time,
            },
            elapsed: T::ZERO,
            states: HashMap::new(),
            finished: HashMap::new(),
            source_clip: SourceClipMeta::new("test"),
        };
        recorder.finished.insert(
            prop,
            vec![Block::constant(
                TimeRange::new(T::ZERO, T::from_ticks(1000)),
                Value::Float(1.0),
            )],
        );

        recorder.commit(&mut tree).unwrap();

        let blocks = tree.blocks(prop).unwrap();
        let got: Vec<_> = blocks.get_blocks(TimeRange::new(T::MIN, T::MAX)).collect();
        assert_eq!(got.len(), 1);
        assert_eq!(
            got[0].range,
            TimeRange::new(start_time, start_time + T::from_ticks(1000))
        );
    }
}
