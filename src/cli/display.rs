//! Display utilities for the playd CLI.
//!
//! This module provides formatted output for:
//! - Success messages
//! - Error messages
//! - Status display
//! - Playlist listing and watch events

use crate::types::{IpcResponse, ObserverEvent, ResponseData};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the result of a transport command (play, next, select, ...).
    pub fn show_transport(response: &IpcResponse) {
        let symbol = match response.data.as_ref().and_then(|d| d.state.as_deref()) {
            Some("playing") => ">",
            Some("paused") => "||",
            _ => "[]",
        };
        println!("{} {}", symbol, response.message);

        if let Some(line) = response.data.as_ref().and_then(Self::now_playing_line) {
            println!("  {}", line);
        }
    }

    /// Shows the current playback status.
    pub fn show_status(response: &IpcResponse) {
        println!("playd ステータス");
        println!("─────────────────────────────");

        let Some(data) = &response.data else {
            println!("再生サービスは起動していません");
            return;
        };

        let state = data.state.as_deref().unwrap_or("unknown");
        println!("状態: {}", Self::state_label(state));

        match Self::now_playing_line(data) {
            Some(line) => println!("{}", line),
            None => {
                if let Some(index) = data.index {
                    println!("次の曲: #{}", index);
                }
            }
        }
    }

    /// Shows the playlist, marking the cursor position.
    pub fn show_list(response: &IpcResponse) {
        let Some(data) = &response.data else {
            return;
        };
        let tracks = data.tracks.as_deref().unwrap_or_default();
        if tracks.is_empty() {
            println!("プレイリストは空です");
            return;
        }

        for (i, track) in tracks.iter().enumerate() {
            let marker = if data.index == Some(i) { "*" } else { " " };
            println!("{} {:>3}  {}", marker, i, track.title);
        }
        println!("─────────────────────────────");
        println!("{}", response.message);
    }

    /// Shows the reply to `watch` before events start flowing.
    pub fn show_watch_started(response: &IpcResponse) {
        println!("* {} (Ctrl-C で終了)", response.message);
    }

    /// Shows one observer event.
    pub fn show_event(event: &ObserverEvent) {
        println!("{}", Self::format_event(event));
    }

    /// Shows a success message for daemon shutdown.
    pub fn show_shutdown_success(response: &IpcResponse) {
        println!("* {}", response.message);
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    fn state_label(state: &str) -> &str {
        match state {
            "playing" => "再生中",
            "paused" => "一時停止中",
            "loaded" => "準備完了",
            "idle" => "停止中",
            other => other,
        }
    }

    fn now_playing_line(data: &ResponseData) -> Option<String> {
        let title = data.title.as_deref()?;
        Some(match data.index {
            Some(index) => format!("曲: #{} {}", index, title),
            None => format!("曲: {}", title),
        })
    }

    fn format_event(event: &ObserverEvent) -> String {
        match event {
            ObserverEvent::TitleChanged { title: Some(title) } => format!("♪ {}", title),
            ObserverEvent::TitleChanged { title: None } => "♪ -".to_string(),
            ObserverEvent::PlayStateChanged { is_playing: true } => "> 再生中".to_string(),
            ObserverEvent::PlayStateChanged { is_playing: false } => "|| 停止中".to_string(),
            ObserverEvent::LoadError { index, message, .. } => {
                format!("! #{} を読み込めません: {}", index, message)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
