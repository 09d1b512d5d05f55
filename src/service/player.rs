//! Playback service state machine.
//!
//! `PlaybackService` composes the engine, the catalog cursor, the keep-alive
//! claim and the observer slot. It is single-threaded: the runtime drives it
//! from one control thread, and tests drive it directly.
//!
//! `select`, `next`, `previous` and auto-advance all go through
//! [`PlaybackService::advance_to`], the one load + play + notify path.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::error::ServiceError;
use super::keepalive::KeepAlive;
use super::observer::{ObserverSlot, PlaybackObserver};
use crate::engine::{Completion, LoadToken, PlaybackEngine};
use crate::playlist::{Catalog, Cursor};
use crate::types::{PlaybackSnapshot, PlaybackState};

/// The playback service.
pub struct PlaybackService<E, K> {
    engine: E,
    keep_alive: K,
    catalog: Catalog,
    /// None when the catalog is empty
    cursor: Option<Cursor>,
    state: PlaybackState,
    /// Token of the load that is bound to the engine right now
    active_token: Option<LoadToken>,
    /// The bound load ran out while paused; the next `play` advances
    finished: bool,
    observer: ObserverSlot,
}

impl<E: PlaybackEngine, K: KeepAlive> PlaybackService<E, K> {
    /// Creates an idle service with an empty catalog.
    pub fn new(engine: E, keep_alive: K) -> Self {
        Self {
            engine,
            keep_alive,
            catalog: Catalog::default(),
            cursor: None,
            state: PlaybackState::Idle,
            active_token: None,
            finished: false,
            observer: ObserverSlot::new(),
        }
    }

    /// Installs the session catalog and places the cursor at `initial_index`.
    ///
    /// Any playing track is stopped first, so calling `start` twice with the
    /// same arguments leaves the service in the same state. Playback does not
    /// begin until `play` or `select` is called.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` for a non-empty catalog and an out-of-range
    /// index; the service is left untouched.
    pub fn start(&mut self, catalog: Catalog, initial_index: usize) -> Result<(), ServiceError> {
        let len = catalog.len();
        if len > 0 && initial_index >= len {
            return Err(ServiceError::InvalidIndex {
                index: initial_index,
                len,
            });
        }

        let was_active = self.halt();
        self.catalog = catalog;
        self.cursor = Cursor::new(len, initial_index);

        info!("Service started with {} tracks", len);
        if was_active {
            self.push_state();
        }
        Ok(())
    }

    /// Jumps to the track at `index` and starts playing it.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` if `index` is out of range (no state change),
    /// or `MediaLoad` if the track cannot be loaded (the service is idle).
    pub fn select(&mut self, index: usize) -> Result<PlaybackSnapshot, ServiceError> {
        let len = self.catalog.len();
        if index >= len {
            return Err(ServiceError::InvalidIndex { index, len });
        }
        self.advance_to(index)
    }

    /// Starts or resumes playback.
    ///
    /// A paused track resumes where it was; an idle service loads the track
    /// under the cursor. Already playing is a no-op. If the paused track ran
    /// out before the pause took effect, playback moves on to the next track.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPlaylist` when idle with nothing to load, or `MediaLoad`
    /// if loading the cursor track fails.
    pub fn play(&mut self) -> Result<PlaybackSnapshot, ServiceError> {
        match self.state {
            PlaybackState::Playing => Ok(self.query_state()),
            PlaybackState::Loaded | PlaybackState::Paused if self.finished => {
                let cursor = self.cursor.ok_or(ServiceError::EmptyPlaylist)?;
                info!("Paused track already finished, advancing");
                self.advance_to(cursor.peek_next())
            }
            PlaybackState::Loaded | PlaybackState::Paused => {
                self.engine.play();
                self.state = PlaybackState::Playing;
                self.notify_now_playing();
                Ok(self.query_state())
            }
            PlaybackState::Idle => {
                let cursor = self.cursor.ok_or(ServiceError::EmptyPlaylist)?;
                self.advance_to(cursor.current())
            }
        }
    }

    /// Pauses playback. No-op unless playing.
    pub fn pause(&mut self) -> PlaybackSnapshot {
        if self.state == PlaybackState::Playing {
            self.engine.pause();
            self.state = PlaybackState::Paused;
            debug!("Paused");
            self.observer.notify(|o| o.play_state_changed(false));
        }
        self.query_state()
    }

    /// Stops playback, releases the output and clears the now playing display.
    ///
    /// The cursor is kept, so a later `play` starts the same track again.
    pub fn stop(&mut self) -> PlaybackSnapshot {
        if self.halt() {
            info!("Stopped");
            self.push_state();
        }
        self.query_state()
    }

    /// Skips to the next track, wrapping to the first.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPlaylist` for an empty catalog, or `MediaLoad`.
    pub fn next(&mut self) -> Result<PlaybackSnapshot, ServiceError> {
        let cursor = self.cursor.ok_or(ServiceError::EmptyPlaylist)?;
        self.advance_to(cursor.peek_next())
    }

    /// Goes back to the previous track, wrapping to the last.
    ///
    /// # Errors
    ///
    /// Returns `EmptyPlaylist` for an empty catalog, or `MediaLoad`.
    pub fn previous(&mut self) -> Result<PlaybackSnapshot, ServiceError> {
        let cursor = self.cursor.ok_or(ServiceError::EmptyPlaylist)?;
        self.advance_to(cursor.peek_previous())
    }

    /// Reacts to a natural end of track by advancing to the next one.
    ///
    /// Events for any load other than the bound one are stale (the track was
    /// stopped or replaced first) and are discarded. An end that arrives
    /// after a pause is remembered and the advance happens on the next
    /// `play`. Returns true if the event was acted on.
    pub fn on_completion(&mut self, completion: Completion) -> bool {
        if !self.state.has_track() || self.active_token != Some(completion.token) {
            debug!(
                "Discarding stale completion (token {}, active {:?}, state {})",
                completion.token,
                self.active_token,
                self.state.as_str()
            );
            return false;
        }

        let Some(cursor) = self.cursor else {
            return false;
        };

        if self.state != PlaybackState::Playing {
            debug!("Track finished while {}, advancing on play", self.state.as_str());
            self.finished = true;
            return true;
        }

        info!("Track finished, advancing");
        if let Err(e) = self.advance_to(cursor.peek_next()) {
            warn!("Auto-advance failed: {}", e);
        }
        true
    }

    /// Attaches `observer`, replacing any previous one, and pushes the
    /// current state to it.
    pub fn attach(&mut self, observer: &Arc<dyn PlaybackObserver>) -> PlaybackSnapshot {
        self.observer.attach(observer);
        debug!("Observer attached");
        self.push_state();
        self.query_state()
    }

    /// Detaches the observer. Playback is unaffected.
    pub fn detach(&mut self) {
        self.observer.detach();
        debug!("Observer detached");
    }

    /// Returns the current state.
    #[must_use]
    pub fn query_state(&self) -> PlaybackSnapshot {
        let index = self.cursor.map(|c| c.current());
        let title = if self.state.has_track() {
            index
                .and_then(|i| self.catalog.get(i))
                .map(|t| t.title.clone())
        } else {
            None
        };

        PlaybackSnapshot {
            state: self.state,
            index,
            title,
            is_playing: self.state == PlaybackState::Playing,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Releases the engine unconditionally and detaches the observer.
    ///
    /// Safe to call any number of times.
    pub fn shutdown(&mut self) {
        if self.halt() {
            self.push_state();
        }
        self.observer.detach();
        info!("Service shut down");
    }

    /// Moves the cursor to `index`, loads that track, plays it and notifies.
    ///
    /// On a load failure the service falls back to idle and reports the
    /// error to the observer; it never retries.
    fn advance_to(&mut self, index: usize) -> Result<PlaybackSnapshot, ServiceError> {
        let track = self
            .catalog
            .get(index)
            .cloned()
            .ok_or(ServiceError::InvalidIndex {
                index,
                len: self.catalog.len(),
            })?;

        self.engine.stop();
        self.active_token = None;
        self.finished = false;
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.move_to(index);
        }

        match self.engine.load(&track) {
            Ok(token) => {
                self.active_token = Some(token);
                self.state = PlaybackState::Loaded;
                self.keep_alive.acquire(&track.title);

                self.engine.play();
                self.state = PlaybackState::Playing;

                info!("Now playing [{}] {}", index, track.title);
                self.notify_now_playing();
                Ok(self.query_state())
            }
            Err(source) => {
                warn!("Failed to load [{}] {}: {}", index, track.title, source);
                self.state = PlaybackState::Idle;
                self.keep_alive.release();
                self.observer.notify(|o| {
                    o.title_changed(None);
                    o.play_state_changed(false);
                    o.load_error(index, &track, &source);
                });
                Err(ServiceError::MediaLoad {
                    index,
                    title: track.title,
                    source,
                })
            }
        }
    }

    /// Stops the engine and returns to idle. Returns true if a track was bound.
    fn halt(&mut self) -> bool {
        let was_active = self.state.has_track();
        self.engine.stop();
        self.active_token = None;
        self.finished = false;
        self.state = PlaybackState::Idle;
        self.keep_alive.release();
        was_active
    }

    fn notify_now_playing(&mut self) {
        let snapshot = self.query_state();
        self.observer.notify(|o| {
            o.title_changed(snapshot.title.as_deref());
            o.play_state_changed(true);
        });
    }

    /// Pushes title and play state as they are right now.
    fn push_state(&mut self) {
        let snapshot = self.query_state();
        self.observer.notify(|o| {
            o.title_changed(snapshot.title.as_deref());
            o.play_state_changed(snapshot.is_playing);
        });
    }
}

impl<E, K> std::fmt::Debug for PlaybackService<E, K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackService")
            .field("tracks", &self.catalog.len())
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .field("active_token", &self.active_token)
            .field("observer", &self.observer)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
