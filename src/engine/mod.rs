//! Playback engine for playd.
//!
//! The engine owns the single decode/output resource. It knows nothing about
//! playlists: it loads one track at a time, plays and pauses it, and reports
//! when the track finishes on its own.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   load/play/pause/stop   ┌──────────────────┐
//! │ PlaybackService  │ ───────────────────────▶ │  PlaybackEngine  │
//! │ (control thread) │                          │  (RodioEngine)   │
//! └────────▲─────────┘                          └────────┬─────────┘
//!          │                                             │
//!          │         Completion { token }                ▼
//!          └──────────────────────────────────── completion watcher
//!                    (crossbeam channel)              (worker thread)
//! ```
//!
//! Every successful `load` returns a [`LoadToken`]. The completion event for
//! that load carries the same token, so a stale event (one that raced with a
//! `stop` or a track change) can be told apart from the current one.

mod error;
mod mock;
mod player;

pub use error::EngineError;
pub use mock::{MockEngine, MockEngineControl};
pub use player::RodioEngine;

use crate::types::{PlaybackState, Track};

/// Identifies one successful `load` call.
pub type LoadToken = u64;

/// Natural end-of-track notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Completion {
    /// Token of the load that finished
    pub token: LoadToken,
}

/// Channel on which an engine delivers completion events.
pub type CompletionSender = crossbeam_channel::Sender<Completion>;

/// Trait for playback engine implementations.
///
/// This trait abstracts the audio backend, allowing for different
/// implementations (rodio-based, mock for testing).
pub trait PlaybackEngine {
    /// Releases any loaded track and binds `track`, leaving it paused.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is unreadable or malformed. The engine
    /// is idle afterwards.
    fn load(&mut self, track: &Track) -> Result<LoadToken, EngineError>;

    /// Starts or resumes the loaded track. Ignored when idle.
    fn play(&mut self);

    /// Pauses the track if it is playing.
    fn pause(&mut self);

    /// Releases the loaded track. No completion event fires for it afterwards.
    fn stop(&mut self);

    /// Returns the engine state.
    fn state(&self) -> PlaybackState;

    /// Returns true if the track is sounding.
    fn is_playing(&self) -> bool {
        self.state() == PlaybackState::Playing
    }
}
