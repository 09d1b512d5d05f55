//! In-memory playback engine for tests.
//!
//! `MockEngineControl` is the test side: it builds the engine, marks paths
//! unreadable, and simulates a track finishing on its own. Both sides share
//! one state, so the control keeps working after the engine has been moved
//! onto the service's control thread.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::EngineError;
use super::{Completion, CompletionSender, LoadToken, PlaybackEngine};
use crate::types::{PlaybackState, Track};

#[derive(Debug, Default)]
struct MockState {
    state: PlaybackState,
    current_token: Option<LoadToken>,
    last_token: LoadToken,
    unreadable: HashSet<PathBuf>,
    loads: Vec<PathBuf>,
    play_calls: usize,
    stop_calls: usize,
    completion_tx: Option<CompletionSender>,
}

fn lock(shared: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    shared.lock().unwrap_or_else(|e| e.into_inner())
}

/// Mock playback engine.
#[derive(Debug)]
pub struct MockEngine {
    shared: Arc<Mutex<MockState>>,
}

/// Test-side handle to a [`MockEngine`].
#[derive(Debug, Clone, Default)]
pub struct MockEngineControl {
    shared: Arc<Mutex<MockState>>,
}

impl MockEngineControl {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the engine half, wired to deliver completions on `completion_tx`.
    #[must_use]
    pub fn build_engine(&self, completion_tx: CompletionSender) -> MockEngine {
        lock(&self.shared).completion_tx = Some(completion_tx);
        MockEngine {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Makes every future `load` of `path` fail with a decode error.
    pub fn set_unreadable(&self, path: impl Into<PathBuf>) {
        lock(&self.shared).unreadable.insert(path.into());
    }

    /// Reverses `set_unreadable`.
    pub fn set_readable(&self, path: impl Into<PathBuf>) {
        lock(&self.shared).unreadable.remove(&path.into());
    }

    /// Simulates the natural end of the playing track.
    ///
    /// Returns the token that was reported, or `None` if nothing is playing.
    pub fn finish_track(&self) -> Option<LoadToken> {
        let state = lock(&self.shared);
        if state.state != PlaybackState::Playing {
            return None;
        }
        let token = state.current_token?;
        if let Some(tx) = &state.completion_tx {
            let _ = tx.send(Completion { token });
        }
        Some(token)
    }

    /// Delivers a completion for an arbitrary token, bypassing the engine's checks.
    ///
    /// Used to simulate an event that was already in flight when the track changed.
    pub fn send_completion(&self, token: LoadToken) {
        if let Some(tx) = &lock(&self.shared).completion_tx {
            let _ = tx.send(Completion { token });
        }
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        lock(&self.shared).state
    }

    #[must_use]
    pub fn current_token(&self) -> Option<LoadToken> {
        lock(&self.shared).current_token
    }

    /// Paths passed to `load`, in call order (failed loads included).
    #[must_use]
    pub fn load_history(&self) -> Vec<PathBuf> {
        lock(&self.shared).loads.clone()
    }

    #[must_use]
    pub fn load_count(&self) -> usize {
        lock(&self.shared).loads.len()
    }

    #[must_use]
    pub fn play_calls(&self) -> usize {
        lock(&self.shared).play_calls
    }

    #[must_use]
    pub fn stop_calls(&self) -> usize {
        lock(&self.shared).stop_calls
    }
}

impl PlaybackEngine for MockEngine {
    fn load(&mut self, track: &Track) -> Result<LoadToken, EngineError> {
        let mut state = lock(&self.shared);
        state.state = PlaybackState::Idle;
        state.current_token = None;
        state.loads.push(track.path.clone());

        if state.unreadable.contains(&track.path) {
            return Err(EngineError::DecodeError(format!(
                "{}: mock unreadable",
                track.path.display()
            )));
        }

        state.last_token += 1;
        let token = state.last_token;
        state.current_token = Some(token);
        state.state = PlaybackState::Loaded;
        Ok(token)
    }

    fn play(&mut self) {
        let mut state = lock(&self.shared);
        state.play_calls += 1;
        if matches!(state.state, PlaybackState::Loaded | PlaybackState::Paused) {
            state.state = PlaybackState::Playing;
        }
    }

    fn pause(&mut self) {
        let mut state = lock(&self.shared);
        if state.state == PlaybackState::Playing {
            state.state = PlaybackState::Paused;
        }
    }

    fn stop(&mut self) {
        let mut state = lock(&self.shared);
        state.stop_calls += 1;
        state.state = PlaybackState::Idle;
        state.current_token = None;
    }

    fn state(&self) -> PlaybackState {
        lock(&self.shared).state
    }
}
