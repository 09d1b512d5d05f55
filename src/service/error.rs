//! Playback service error types.
//!
//! None of these are fatal: the service stays controllable after reporting
//! any of them.

use thiserror::Error;

use crate::engine::EngineError;

/// Errors reported by the playback service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Navigation requested against an empty catalog.
    #[error("プレイリストが空です")]
    EmptyPlaylist,

    /// Track index outside the catalog.
    #[error("無効なトラック番号です: {index} (曲数: {len})")]
    InvalidIndex { index: usize, len: usize },

    /// The selected track could not be loaded; the service is idle.
    #[error("トラックを読み込めません: {title}: {source}")]
    MediaLoad {
        index: usize,
        title: String,
        #[source]
        source: EngineError,
    },

    /// The playback engine could not be created.
    #[error("再生エンジンを初期化できません: {0}")]
    EngineInit(#[source] EngineError),

    /// The control thread could not be started.
    #[error("制御スレッドを起動できません: {0}")]
    ControlThread(String),

    /// The control thread has exited.
    #[error("再生サービスは停止しています")]
    ServiceStopped,
}

impl ServiceError {
    /// Returns true if the service is still running and accepts commands.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::EmptyPlaylist | Self::InvalidIndex { .. } | Self::MediaLoad { .. }
        )
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::EmptyPlaylist => "音楽フォルダに曲を追加してからデーモンを再起動してください",
            Self::InvalidIndex { .. } => "'playd list' で曲番号を確認してください",
            Self::MediaLoad { .. } => "別の曲を選択してください",
            Self::EngineInit(e) => e.suggestion(),
            Self::ControlThread(_) | Self::ServiceStopped => "デーモンを再起動してください",
        }
    }
}
