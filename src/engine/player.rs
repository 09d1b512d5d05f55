//! Playback engine implementation using rodio.
//!
//! This module provides the `RodioEngine` which uses the rodio v0.20 audio
//! library. Each loaded track gets its own `Sink`; a watcher thread polls the
//! sink and reports the natural end of the track.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, warn};

use super::error::EngineError;
use super::{Completion, CompletionSender, LoadToken, PlaybackEngine};
use crate::types::{PlaybackState, Track};

/// How often the watcher checks whether the sink has drained.
const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// The track currently bound to the output.
struct LoadedTrack {
    sink: Arc<Sink>,
    /// Set before the sink is stopped so the watcher stays silent.
    stop_flag: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

/// A playback engine that uses rodio for audio output.
///
/// The output stream is not `Send`, so the engine must be created on the
/// thread that drives it.
pub struct RodioEngine {
    /// The audio output stream (must be kept alive for playback).
    _stream: OutputStream,
    /// Handle to the output stream for creating sinks.
    stream_handle: OutputStreamHandle,
    /// Where completion events are delivered.
    completion_tx: CompletionSender,
    current: Option<LoadedTrack>,
    state: PlaybackState,
    last_token: LoadToken,
}

impl RodioEngine {
    /// Creates a new engine on the default output device.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::DeviceNotAvailable` if no audio output device
    /// is available.
    pub fn new(completion_tx: CompletionSender) -> Result<Self, EngineError> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| EngineError::DeviceNotAvailable(e.to_string()))?;

        debug!("Audio output stream initialized");

        Ok(Self {
            _stream: stream,
            stream_handle,
            completion_tx,
            current: None,
            state: PlaybackState::Idle,
            last_token: 0,
        })
    }

    /// Opens and decodes a track into a new, paused sink.
    fn open_sink(&self, track: &Track) -> Result<Sink, EngineError> {
        let file = File::open(&track.path)
            .map_err(|e| EngineError::FileNotFound(format!("{}: {}", track.path.display(), e)))?;

        let decoder = Decoder::new(BufReader::new(file))
            .map_err(|e| EngineError::DecodeError(format!("{}: {}", track.path.display(), e)))?;

        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| EngineError::StreamError(e.to_string()))?;

        sink.pause();
        sink.append(decoder);
        Ok(sink)
    }

    /// Stops and drops the current sink, waiting for its watcher to exit.
    fn release(&mut self) {
        if let Some(mut loaded) = self.current.take() {
            loaded.stop_flag.store(true, Ordering::SeqCst);
            loaded.sink.stop();
            if let Some(watcher) = loaded.watcher.take() {
                if watcher.join().is_err() {
                    warn!("Completion watcher panicked");
                }
            }
            debug!("Released audio sink");
        }
        self.state = PlaybackState::Idle;
    }
}

/// Spawns the thread that reports the natural end of a track.
fn spawn_completion_watcher(
    sink: Arc<Sink>,
    stop_flag: Arc<AtomicBool>,
    token: LoadToken,
    completion_tx: CompletionSender,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("playd-watch-{token}"))
        .spawn(move || loop {
            thread::sleep(WATCH_INTERVAL);

            if stop_flag.load(Ordering::SeqCst) {
                return;
            }

            // A paused sink still holds its source, so only a drained sink is empty.
            if sink.empty() {
                if !stop_flag.load(Ordering::SeqCst) {
                    debug!("Track finished (token {})", token);
                    let _ = completion_tx.send(Completion { token });
                }
                return;
            }
        })
}

impl PlaybackEngine for RodioEngine {
    fn load(&mut self, track: &Track) -> Result<LoadToken, EngineError> {
        self.release();

        let sink = Arc::new(self.open_sink(track)?);
        let stop_flag = Arc::new(AtomicBool::new(false));
        let token = self.last_token + 1;

        let watcher = spawn_completion_watcher(
            Arc::clone(&sink),
            Arc::clone(&stop_flag),
            token,
            self.completion_tx.clone(),
        )
        .map_err(|e| {
            sink.stop();
            EngineError::StreamError(format!("completion watcher: {}", e))
        })?;

        self.last_token = token;
        self.current = Some(LoadedTrack {
            sink,
            stop_flag,
            watcher: Some(watcher),
        });
        self.state = PlaybackState::Loaded;

        debug!("Loaded {} (token {})", track.path.display(), token);
        Ok(token)
    }

    fn play(&mut self) {
        match (&self.current, self.state) {
            (Some(loaded), PlaybackState::Loaded | PlaybackState::Paused) => {
                loaded.sink.play();
                self.state = PlaybackState::Playing;
            }
            (_, PlaybackState::Playing) => {}
            _ => debug!("play() ignored: nothing loaded"),
        }
    }

    fn pause(&mut self) {
        if let (Some(loaded), PlaybackState::Playing) = (&self.current, self.state) {
            loaded.sink.pause();
            self.state = PlaybackState::Paused;
        }
    }

    fn stop(&mut self) {
        self.release();
    }

    fn state(&self) -> PlaybackState {
        self.state
    }
}

impl Drop for RodioEngine {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for RodioEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RodioEngine")
            .field("state", &self.state)
            .field("last_token", &self.last_token)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Note: These tests may fail in environments without audio hardware
    // (e.g., CI containers). Tests are designed to handle this gracefully.

    fn create_engine() -> Option<(RodioEngine, crossbeam_channel::Receiver<Completion>)> {
        let (tx, rx) = crossbeam_channel::unbounded();
        RodioEngine::new(tx).ok().map(|engine| (engine, rx))
    }

    #[test]
    fn test_new_engine_is_idle() {
        let Some((engine, _rx)) = create_engine() else {
            return;
        };
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_load_missing_file_stays_idle() {
        let Some((mut engine, rx)) = create_engine() else {
            return;
        };

        let result = engine.load(&Track::from_path("/nonexistent/path/song.mp3"));

        assert!(matches!(result, Err(EngineError::FileNotFound(_))));
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_load_garbage_file_is_decode_error() {
        let Some((mut engine, _rx)) = create_engine() else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.mp3");
        std::fs::write(&path, b"definitely not audio").unwrap();

        let result = engine.load(&Track::from_path(&path));

        assert!(matches!(result, Err(EngineError::DecodeError(_))));
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_play_when_idle_is_ignored() {
        let Some((mut engine, _rx)) = create_engine() else {
            return;
        };
        engine.play();
        assert_eq!(engine.state(), PlaybackState::Idle);
        engine.pause();
        assert_eq!(engine.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_debug_impl() {
        let Some((engine, _rx)) = create_engine() else {
            return;
        };
        let debug_str = format!("{:?}", engine);
        assert!(debug_str.contains("RodioEngine"));
    }
}
