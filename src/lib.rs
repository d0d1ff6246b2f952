//! [`TrackTree`]: reeltrack_engine::track::TrackTree
//! [`Player`]: reeltrack_engine::player::Player
//! [`Recorder`]: reeltrack_engine::recorder::Recorder
//! [`Modification`]: reeltrack_engine::modification::Modification
//!
//! Reeltrack is the data model and edit-time machinery behind a movie-maker
//! timeline editor for a 3D scene runtime.
//!
//! A movie is a forest of tracks ([`TrackTree`]) binding to scene targets
//! through a `Binder`. Playing the movie ([`Player`]) samples tracks at a
//! point in time and writes the results back into the scene. Scrubbing the
//! live scene into a track ([`Recorder`]) runs the same binding in reverse.
//! [`Modification`]s are read-only analyses over existing tracks (bone
//! baking, rotate-with-motion, motion-to-parameters) that emit new compiled
//! tracks without touching their sources.
//!
//! This crate is a thin façade; all engineering lives in
//! [`reeltrack_engine`].

pub use reeltrack_engine;

pub mod prelude {
    pub use reeltrack_engine::prelude::*;
}
