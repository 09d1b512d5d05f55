//! playd library
//!
//! This library provides the core functionality for the playd music daemon.
//! It includes:
//! - Playback engine abstraction with a rodio backend and a mock for tests
//! - Track catalog, directory scanning and wraparound navigation
//! - Playback service state machine and its control thread
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing and display utilities
//! - Daemon configuration

pub mod cli;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod playlist;
pub mod service;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{
    IpcRequest, IpcResponse, ObserverEvent, PlaybackSnapshot, PlaybackState, ResponseData, Track,
};

pub use config::{ConfigError, DaemonConfig};

pub use engine::{
    Completion, EngineError, LoadToken, MockEngine, MockEngineControl, PlaybackEngine, RodioEngine,
};

pub use playlist::{scan_music_dir, Catalog, CatalogError, Cursor};

pub use service::{
    ChannelObserver, KeepAlive, MockKeepAlive, PlaybackObserver, PlaybackService,
    RecordingObserver, ServiceError, ServiceHandle, WatchKeepAlive,
};
