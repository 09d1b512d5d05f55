//! Playback service for playd.
//!
//! This module contains the playlist player itself:
//! - `player`: the state machine binding catalog, cursor and engine
//! - `runtime`: the control thread and its cloneable async handle
//! - `observer`: the single weak observer slot and stock observers
//! - `keepalive`: the claim that keeps the daemon alive while a track is loaded
//!
//! # States
//!
//! ```text
//!            select / next / previous / play
//!   Idle ───────────────────────────────────▶ Playing ◀──┐
//!    ▲                                        │   ▲      │ completion
//!    │ stop / load failure           pause    │   │ play │ (advance)
//!    │                                        ▼   │      │
//!    └──────────────────────────────────────  Paused ────┘
//! ```

mod error;
mod keepalive;
mod observer;
mod player;
mod runtime;

pub use error::ServiceError;
pub use keepalive::{KeepAlive, MockKeepAlive, WatchKeepAlive};
pub use observer::{ChannelObserver, ObserverSlot, PlaybackObserver, RecordingObserver};
pub use player::PlaybackService;
pub use runtime::ServiceHandle;
