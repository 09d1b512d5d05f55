//! Observer notification plumbing.
//!
//! The service keeps at most one observer, and only as a `Weak` reference:
//! whoever attached it owns it, and dropping that `Arc` is a valid way to
//! detach. Notifications to a dead or missing observer are dropped.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tracing::debug;

use crate::engine::EngineError;
use crate::types::{ObserverEvent, Track};

/// Receives state changes from the playback service.
///
/// Callbacks run on the service's control thread and must not block.
pub trait PlaybackObserver: Send + Sync {
    /// The now playing title changed. `None` clears the display.
    fn title_changed(&self, title: Option<&str>);

    /// Playback started or stopped sounding.
    fn play_state_changed(&self, is_playing: bool);

    /// The track at `index` could not be loaded.
    fn load_error(&self, index: usize, track: &Track, error: &EngineError);
}

/// Single weak observer slot.
#[derive(Default)]
pub struct ObserverSlot {
    observer: Option<Weak<dyn PlaybackObserver>>,
}

impl ObserverSlot {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any previous observer.
    pub fn attach(&mut self, observer: &Arc<dyn PlaybackObserver>) {
        self.observer = Some(Arc::downgrade(observer));
    }

    pub fn detach(&mut self) {
        self.observer = None;
    }

    /// Returns true if an observer is attached and still alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.observer
            .as_ref()
            .is_some_and(|weak| weak.strong_count() > 0)
    }

    /// Runs `f` against the observer if it is still alive.
    ///
    /// A dead observer is cleared from the slot.
    pub fn notify(&mut self, f: impl FnOnce(&dyn PlaybackObserver)) {
        let Some(weak) = &self.observer else {
            return;
        };
        match weak.upgrade() {
            Some(observer) => f(observer.as_ref()),
            None => {
                debug!("Observer dropped, clearing slot");
                self.observer = None;
            }
        }
    }
}

impl std::fmt::Debug for ObserverSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSlot")
            .field("attached", &self.is_attached())
            .finish()
    }
}

fn load_error_event(index: usize, track: &Track, error: &EngineError) -> ObserverEvent {
    ObserverEvent::LoadError {
        index,
        path: track.path.clone(),
        message: error.to_string(),
    }
}

// ============================================================================
// ChannelObserver
// ============================================================================

/// Observer that forwards every notification into a channel.
///
/// Used by the IPC `watch` command to stream events to a client.
#[derive(Debug)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<ObserverEvent>,
}

impl ChannelObserver {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<ObserverEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: ObserverEvent) {
        // The receiver going away is the same as being detached.
        let _ = self.tx.send(event);
    }
}

impl PlaybackObserver for ChannelObserver {
    fn title_changed(&self, title: Option<&str>) {
        self.send(ObserverEvent::TitleChanged {
            title: title.map(str::to_string),
        });
    }

    fn play_state_changed(&self, is_playing: bool) {
        self.send(ObserverEvent::PlayStateChanged { is_playing });
    }

    fn load_error(&self, index: usize, track: &Track, error: &EngineError) {
        self.send(load_error_event(index, track, error));
    }
}

// ============================================================================
// RecordingObserver
// ============================================================================

/// Observer that records every notification, for testing.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObserverEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Returns and clears the recorded events.
    pub fn take_events(&self) -> Vec<ObserverEvent> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(|e| e.into_inner()))
    }

    fn record(&self, event: ObserverEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

impl PlaybackObserver for RecordingObserver {
    fn title_changed(&self, title: Option<&str>) {
        self.record(ObserverEvent::TitleChanged {
            title: title.map(str::to_string),
        });
    }

    fn play_state_changed(&self, is_playing: bool) {
        self.record(ObserverEvent::PlayStateChanged { is_playing });
    }

    fn load_error(&self, index: usize, track: &Track, error: &EngineError) {
        self.record(load_error_event(index, track, error));
    }
}
