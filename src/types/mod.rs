//! Core data types for playd.
//!
//! This module defines the data structures used for:
//! - Track descriptors and playback state
//! - State snapshots returned by the playback service
//! - Observer events streamed to watching clients
//! - IPC request/response serialization

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// ============================================================================
// Track
// ============================================================================

/// A playable track in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Path to the audio file
    pub path: PathBuf,
    /// Display title (file name without its format suffix)
    pub title: String,
}

impl Track {
    /// Creates a track with an explicit title.
    pub fn new(path: impl Into<PathBuf>, title: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            title: title.into(),
        }
    }

    /// Creates a track whose title is the file name with the extension stripped.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let title = title_from_path(&path);
        Self { path, title }
    }
}

fn title_from_path(path: &Path) -> String {
    path.file_stem()
        .or_else(|| path.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// PlaybackState
// ============================================================================

/// Playback state shared by the engine and the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    /// No track is loaded
    #[default]
    Idle,
    /// A track is prepared but not sounding
    Loaded,
    /// A track is sounding
    Playing,
    /// A track is loaded and paused
    Paused,
}

impl PlaybackState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loaded => "loaded",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
        }
    }

    /// Returns true if a track is bound to the output, i.e. audio could still be produced.
    pub fn has_track(&self) -> bool {
        !matches!(self, PlaybackState::Idle)
    }
}

// ============================================================================
// PlaybackSnapshot
// ============================================================================

/// Point-in-time view of the playback service.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    /// Current state
    pub state: PlaybackState,
    /// Cursor position (None when the catalog is empty)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Now playing title (None when idle)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether audio is sounding
    pub is_playing: bool,
}

// ============================================================================
// ObserverEvent
// ============================================================================

/// Notifications delivered to an attached observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ObserverEvent {
    /// The now playing title changed (None clears the display)
    TitleChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    /// Playback started or stopped sounding
    PlayStateChanged {
        #[serde(rename = "isPlaying")]
        is_playing: bool,
    },
    /// A track could not be loaded
    LoadError {
        /// Catalog index of the failed track
        index: usize,
        /// Path of the failed track
        path: PathBuf,
        /// Error description
        message: String,
    },
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IpcRequest {
    /// Jump to a track and start playing it
    Select {
        /// Catalog index
        index: usize,
    },
    /// Start or resume playback
    Play,
    /// Pause playback
    Pause,
    /// Stop playback and release the output
    Stop,
    /// Skip to the next track
    Next,
    /// Go back to the previous track
    Previous,
    /// Query the current status
    Status,
    /// List the catalog
    List,
    /// Attach as the observer and stream events
    Watch,
    /// Stop playback and terminate the daemon
    Shutdown,
}

/// Response data for IPC responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseData {
    /// Current state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    /// Cursor position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    /// Now playing title
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Whether audio is sounding
    #[serde(rename = "isPlaying", skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    /// Catalog listing (list command only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracks: Option<Vec<Track>>,
}

impl ResponseData {
    /// Creates response data from a service snapshot.
    pub fn from_snapshot(snapshot: &PlaybackSnapshot) -> Self {
        Self {
            state: Some(snapshot.state.as_str().to_string()),
            index: snapshot.index,
            title: snapshot.title.clone(),
            is_playing: Some(snapshot.is_playing),
            tracks: None,
        }
    }

    /// Creates response data carrying a catalog listing.
    pub fn from_tracks(snapshot: &PlaybackSnapshot, tracks: Vec<Track>) -> Self {
        Self {
            tracks: Some(tracks),
            ..Self::from_snapshot(snapshot)
        }
    }
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// Optional response data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<ResponseData>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    /// Returns true if this is an error response.
    pub fn is_error(&self) -> bool {
        self.status == "error"
    }
}

// ============================================================================
// Tests
// ============================================================================
