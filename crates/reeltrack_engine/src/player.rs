//! The Player: samples a clip's track tree at a time and writes the
//! result through a [`Binder`].
//!
//! Grounded on `motiongfx_engine`'s `SequencePlayer` (`player.rs`) for the
//! play/pause/time-scale shape — `Playing`/`Paused`/time-scale fields
//! survive from there — but no longer an ECS component driven by a
//! `bevy_app` system: per this engine's explicit `Context`-object design
//! (no singletons), `Player::advance` is a plain method the host's own
//! tick calls, taking its delta time as a parameter instead of reading a
//! global `Res<Time>`.

use tracing::{debug, warn};

use crate::binder::Binder;
use crate::error::Result;
use crate::time::T;
use crate::track::TrackTree;
use crate::value::Value;

/// Playback state. `Scrubbing` is not a distinct variant at rest — it is
/// the transient effect of [`Player::set_time`] while [`PlayMode::Paused`]
/// or [`PlayMode::Playing`], per §4.F.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Playing,
    Paused,
}

/// Samples one clip's [`TrackTree`] at a time and writes through a
/// [`Binder`]. Holds no scene state itself.
pub struct Player {
    clip: Option<TrackTree>,
    time: T,
    mode: PlayMode,
    time_scale: f32,
    /// Tracks the Player skips this tick (e.g. a recorder's muted set, see
    /// `crate::recorder`).
    muted: Vec<crate::track::TrackId>,
}

impl Default for Player {
    fn default() -> Self {
        Player {
            clip: None,
            time: T::ZERO,
            mode: PlayMode::Paused,
            time_scale: 1.0,
            muted: Vec::new(),
        }
    }
}

impl Player {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_clip(&mut self, clip: TrackTree) {
        self.clip = Some(clip);
    }

    pub fn clip(&self) -> Option<&TrackTree> {
        self.clip.as_ref()
    }

    pub fn clip_mut(&mut self) -> Option<&mut TrackTree> {
        self.clip.as_mut()
    }

    pub fn take_clip(&mut self) -> Option<TrackTree> {
        self.clip.take()
    }

    pub fn time(&self) -> T {
        self.time
    }

    /// Scrub to an explicit time, regardless of play mode.
    pub fn set_time(&mut self, time: T) {
        self.time = time;
    }

    pub fn play(&mut self) {
        self.mode = PlayMode::Playing;
    }

    pub fn pause(&mut self) {
        self.mode = PlayMode::Paused;
    }

    pub fn mode(&self) -> PlayMode {
        self.mode
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale;
    }

    /// Present the given tracks to the Player as muted (read from
    /// pre-recording state, not written): used by `crate::recorder` while
    /// a track is armed or recording (§4.G).
    pub fn set_muted(&mut self, tracks: Vec<crate::track::TrackId>) {
        self.muted = tracks;
    }

    /// Advance playback time by `dt` wall-clock seconds (a no-op while
    /// `Paused`), then sample and write every property track.
    ///
    /// Never aborts: per §7, unresolved tracks are silently skipped this
    /// tick, and a failed write yields no error to the caller (it is
    /// logged and the tick continues).
    pub fn advance(&mut self, dt: f32, binder: &mut dyn Binder) {
        if self.mode == PlayMode::Playing {
            let delta_ticks = (dt * self.time_scale * crate::time::BASE_RATE as f32) as i64;
            self.time = self.time.saturating_add(T::from_ticks(delta_ticks));
        }
        self.sample_and_write(binder);
    }

    /// Sample every property track at the current time and write through
    /// `binder`, without advancing time (used for scrubbing and preview).
    pub fn sample_and_write(&self, binder: &mut dyn Binder) {
        let Some(clip) = &self.clip else {
            return;
        };

        for track in clip.prop_tracks() {
            if self.muted.contains(&track) {
                continue;
            }
            self.sample_and_write_one(clip, track, binder);
        }
    }

    fn sample_and_write_one(&self, clip: &TrackTree, track: crate::track::TrackId, binder: &mut dyn Binder) {
        let Some(node) = clip.find(track) else {
            return;
        };
        let Some(target_type) = node.target_type else {
            return;
        };

        let resolved = match binder.resolve_property(clip, track) {
            Ok(r) => r,
            Err(err) => {
                debug!(?track, %err, "player: property unresolved this tick, skipping");
                return;
            }
        };

        let blocks = match clip.blocks(track) {
            Ok(b) => b,
            Err(_) => return,
        };
        let value = blocks.get_value_at(self.time, Value::default_for(target_type));

        if !binder.write(&resolved, value) {
            warn!(?track, "player: write rejected by binder, skipping");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::time::TimeRange;
    use crate::track::TrackKind;
    use crate::value::ValueTypeId;

    #[test]
    fn advance_while_paused_does_not_move_time() {
        let mut player = Player::new();
        player.pause();
        player.set_time(T::from_ticks(100));
        let mut binder = NullBinder;
        player.advance(1.0, &mut binder);
        assert_eq!(player.time(), T::from_ticks(100));
    }

    #[test]
    fn advance_while_playing_moves_time_by_scale() {
        let mut player = Player::new();
        player.play();
        player.set_time_scale(2.0);
        let mut binder = NullBinder;
        player.advance(1.0, &mut binder);
        assert_eq!(player.time(), T::from_ticks(2 * crate::time::BASE_RATE as i64));
    }

    struct NullBinder;
    impl Binder for NullBinder {
        fn resolve_ref(&mut self, _tree: &TrackTree, _track: crate::track::TrackId) -> Option<crate::binder::SceneObjectId> {
            None
        }
        fn resolve_property(
            &mut self,
            _tree: &TrackTree,
            track: crate::track::TrackId,
        ) -> Result<crate::binder::ResolvedProperty> {
            Err(crate::error::EngineError::NotBound(track))
        }
        fn read(&self, _resolved: &crate::binder::ResolvedProperty) -> Option<Value> {
            None
        }
        fn write(&mut self, _resolved: &crate::binder::ResolvedProperty, _value: Value) -> bool {
            false
        }
        fn invalidate(&mut self, _target: Option<crate::binder::SceneObjectId>) {}
    }

    #[test]
    fn unresolved_track_is_skipped_without_panic() {
        let mut tree = TrackTree::new();
        let root = tree.add_root("Cube", TrackKind::Ref, None, 30).unwrap();
        let prop = tree
            .add_child(root, "Position", TrackKind::Prop, Some(ValueTypeId::Float), 30)
            .unwrap();
        tree.blocks_mut(prop)
            .unwrap()
            .add_range(vec![Block::constant(
                TimeRange::new(T::ZERO, T::from_ticks(1000)),
                Value::Float(1.0),
            )]);

        let mut player = Player::new();
        player.set_clip(tree);
        let mut binder = NullBinder;
        // Must not panic even though NullBinder never resolves anything.
        player.advance(0.0, &mut binder);
    }
}
