//! Playback engine error types.
//!
//! A failed `load` always leaves the engine idle, so none of these errors
//! require cleanup by the caller.

use thiserror::Error;

/// Errors that can occur in the playback engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Audio device is not available (e.g., no speakers connected).
    #[error("オーディオデバイスが利用できません: {0}")]
    DeviceNotAvailable(String),

    /// Audio file could not be opened.
    #[error("音声ファイルを開けません: {0}")]
    FileNotFound(String),

    /// Failed to decode the audio file.
    #[error("音声ファイルのデコードに失敗しました: {0}")]
    DecodeError(String),

    /// Failed to create the audio output stream.
    #[error("オーディオストリームの作成に失敗しました: {0}")]
    StreamError(String),
}

impl EngineError {
    /// Returns true if this error is related to device availability.
    #[must_use]
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::DeviceNotAvailable(_) | Self::StreamError(_))
    }

    /// Returns true if the track itself is unreadable or malformed.
    #[must_use]
    pub fn is_media_error(&self) -> bool {
        matches!(self, Self::FileNotFound(_) | Self::DecodeError(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::DeviceNotAvailable(_) => "オーディオデバイスを接続してください",
            Self::FileNotFound(_) => "ファイルが移動または削除されていないか確認してください",
            Self::DecodeError(_) => "音声ファイルが破損している可能性があります",
            Self::StreamError(_) => "オーディオ設定を確認してください",
        }
    }
}
