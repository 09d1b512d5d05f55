//! IPC Client for communicating with the playd daemon.
//!
//! This module provides:
//! - Unix Domain Socket client
//! - Request/response handling
//! - Connection retry logic
//! - Timeout handling
//! - Event streaming for `watch`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::config::default_socket_path;
use crate::types::{IpcRequest, IpcResponse, ObserverEvent};

// ============================================================================
// Constants
// ============================================================================

/// Connection timeout in seconds
const CONNECTION_TIMEOUT_SECS: u64 = 5;

/// Read/write timeout in seconds
const IO_TIMEOUT_SECS: u64 = 5;

/// Maximum response size in bytes (1MB, enough for large `list` replies)
const MAX_RESPONSE_SIZE: u64 = 1024 * 1024;

/// Maximum connection attempts
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds (base delay, multiplied by attempt number)
const RETRY_DELAY_MS: u64 = 500;

// ============================================================================
// IpcClient
// ============================================================================

/// IPC client for daemon communication.
#[derive(Debug, Clone)]
pub struct IpcClient {
    /// Socket path
    socket_path: PathBuf,
    /// Connection timeout
    timeout: Duration,
}

impl IpcClient {
    /// Creates a new IPC client with the default socket path.
    pub fn new() -> Self {
        Self::with_socket_path(default_socket_path())
    }

    /// Creates a new IPC client with a custom socket path.
    pub fn with_socket_path(socket_path: PathBuf) -> Self {
        Self {
            socket_path,
            timeout: Duration::from_secs(CONNECTION_TIMEOUT_SECS),
        }
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    pub async fn play(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Play).await
    }

    pub async fn pause(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Pause).await
    }

    pub async fn stop(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Stop).await
    }

    pub async fn next(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Next).await
    }

    pub async fn previous(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Previous).await
    }

    pub async fn select(&self, index: usize) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Select { index }).await
    }

    pub async fn status(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Status).await
    }

    pub async fn list(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::List).await
    }

    pub async fn shutdown(&self) -> Result<IpcResponse> {
        self.send_request(&IpcRequest::Shutdown).await
    }

    /// Attaches as the daemon's observer and calls `on_event` for every
    /// event until the daemon closes the connection.
    ///
    /// `on_start` receives the daemon's reply before the first event.
    pub async fn watch(
        &self,
        on_start: impl FnOnce(&IpcResponse),
        mut on_event: impl FnMut(&ObserverEvent),
    ) -> Result<()> {
        let mut stream = self.connect_with_retry().await?;

        // The write side stays open: closing it tells the daemon we left.
        self.write_request(&mut stream, &IpcRequest::Watch).await?;

        let mut lines = BufReader::new(stream).lines();
        let first = timeout(Duration::from_secs(IO_TIMEOUT_SECS), lines.next_line())
            .await
            .context("読み込みがタイムアウトしました")?
            .context("レスポンスの受信に失敗しました")?
            .context("Daemonからの応答がありませんでした")?;
        let response = parse_response(first.as_bytes())?;
        on_start(&response);

        while let Some(line) = lines
            .next_line()
            .await
            .context("イベントの受信に失敗しました")?
        {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<ObserverEvent>(&line) {
                Ok(event) => on_event(&event),
                Err(e) => tracing::warn!("不明なイベントを無視しました: {}", e),
            }
        }

        Ok(())
    }

    /// Connects to the daemon, retrying with linear backoff.
    async fn connect_with_retry(&self) -> Result<UnixStream> {
        let mut attempt = 1;
        loop {
            match self.connect().await {
                Ok(stream) => return Ok(stream),
                Err(e) if attempt < MAX_RETRIES => {
                    tracing::warn!("接続失敗 (試行 {}/{}): {}", attempt, MAX_RETRIES, e);
                    let delay = Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt));
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn connect(&self) -> Result<UnixStream> {
        timeout(self.timeout, UnixStream::connect(&self.socket_path))
            .await
            .context("接続がタイムアウトしました")?
            .context("Daemonに接続できません。'playd daemon' を起動してください")
    }

    async fn write_request(&self, stream: &mut UnixStream, request: &IpcRequest) -> Result<()> {
        let mut request_json =
            serde_json::to_vec(request).context("リクエストのシリアライズに失敗しました")?;
        request_json.push(b'\n');

        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            stream.write_all(&request_json),
        )
        .await
        .context("書き込みがタイムアウトしました")?
        .context("リクエストの送信に失敗しました")?;

        timeout(Duration::from_secs(IO_TIMEOUT_SECS), stream.flush())
            .await
            .context("フラッシュがタイムアウトしました")?
            .context("フラッシュに失敗しました")?;
        Ok(())
    }

    /// Sends a single request and reads the reply.
    ///
    /// Only the connection is retried: a request that reached the daemon is
    /// never sent twice.
    async fn send_request(&self, request: &IpcRequest) -> Result<IpcResponse> {
        let mut stream = self.connect_with_retry().await?;
        self.write_request(&mut stream, request).await?;

        // Shutdown write side to signal end of request
        stream
            .shutdown()
            .await
            .context("シャットダウンに失敗しました")?;

        let mut buffer = Vec::new();
        timeout(
            Duration::from_secs(IO_TIMEOUT_SECS),
            (&mut stream).take(MAX_RESPONSE_SIZE).read_to_end(&mut buffer),
        )
        .await
        .context("読み込みがタイムアウトしました")?
        .context("レスポンスの受信に失敗しました")?;

        if buffer.is_empty() {
            anyhow::bail!("Daemonからの応答がありませんでした");
        }

        let response = parse_response(&buffer)?;
        if response.is_error() {
            anyhow::bail!("{}", response.message);
        }
        Ok(response)
    }
}

impl Default for IpcClient {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_response(bytes: &[u8]) -> Result<IpcResponse> {
    serde_json::from_slice(bytes.trim_ascii()).context("レスポンスのパースに失敗しました")
}

// ============================================================================
// Tests
// ============================================================================
