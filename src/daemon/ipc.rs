//! IPC Server for the playd daemon.
//!
//! This module provides Unix Domain Socket IPC functionality:
//! - Server that listens on a Unix socket
//! - Request/response handling for playback commands
//! - Event streaming for `watch` connections
//!
//! Every message is one JSON document followed by a newline. A connection
//! carries one request; `watch` keeps the connection open and streams
//! [`ObserverEvent`]s after the response until the client hangs up.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Notify};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::service::{ChannelObserver, PlaybackObserver, ServiceError, ServiceHandle};
use crate::types::{IpcRequest, IpcResponse, PlaybackSnapshot, ResponseData};

// ============================================================================
// Constants
// ============================================================================

/// Maximum request size in bytes (4KB)
pub const MAX_REQUEST_SIZE: usize = 4096;

/// Read timeout in seconds
const READ_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// IpcError
// ============================================================================

/// IPC-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Read error
    #[error("Failed to read request: {0}")]
    ReadError(String),

    /// The client closed the connection before sending a request
    #[error("Connection closed by client")]
    ConnectionClosed,

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Request too large
    #[error("Request too large (max {MAX_REQUEST_SIZE} bytes)")]
    RequestTooLarge,
}

// ============================================================================
// IpcServer
// ============================================================================

/// Unix Domain Socket IPC server.
pub struct IpcServer {
    /// Unix socket listener
    listener: UnixListener,
    /// Socket path (for cleanup)
    socket_path: PathBuf,
}

impl IpcServer {
    /// Creates a new IPC server bound to the specified socket path.
    ///
    /// If the socket file already exists, it will be removed before binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub fn new(socket_path: &Path) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(socket_path)
                .with_context(|| format!("Failed to remove existing socket: {:?}", socket_path))?;
        }

        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create socket directory: {:?}", parent))?;
        }

        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind Unix socket: {:?}", socket_path))?;

        info!("Listening on {}", socket_path.display());
        Ok(Self {
            listener,
            socket_path: socket_path.to_path_buf(),
        })
    }

    /// Accepts an incoming client connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be accepted.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .context("Failed to accept connection")?;
        Ok(stream)
    }

    /// Receives and deserializes an IPC request from the stream.
    ///
    /// Applies a read timeout to prevent blocking indefinitely.
    ///
    /// # Errors
    ///
    /// Returns an error if reading or deserialization fails, or if the
    /// request exceeds [`MAX_REQUEST_SIZE`].
    pub async fn receive_request<R: AsyncRead + Unpin>(stream: &mut R) -> Result<IpcRequest> {
        // One spare byte to tell a full request from an oversized one.
        let mut buffer = vec![0u8; MAX_REQUEST_SIZE + 1];

        let read_result = timeout(
            Duration::from_secs(READ_TIMEOUT_SECS),
            stream.read(&mut buffer),
        )
        .await;

        let n = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(IpcError::ReadError(e.to_string()).into()),
            Err(_) => return Err(IpcError::Timeout.into()),
        };

        if n == 0 {
            return Err(IpcError::ConnectionClosed.into());
        }
        if n > MAX_REQUEST_SIZE {
            return Err(IpcError::RequestTooLarge.into());
        }

        let request: IpcRequest = serde_json::from_slice(buffer[..n].trim_ascii())
            .with_context(|| "Failed to deserialize IPC request")?;

        Ok(request)
    }

    /// Serializes and sends an IPC response to the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub async fn send_response<W: AsyncWrite + Unpin>(
        stream: &mut W,
        response: &IpcResponse,
    ) -> Result<()> {
        write_line(stream, response)
            .await
            .context("Failed to write response")
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Writes `value` as one line of JSON and flushes.
async fn write_line<W, T>(stream: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut json = serde_json::to_vec(value).context("Failed to serialize message")?;
    json.push(b'\n');
    stream.write_all(&json).await?;
    stream.flush().await?;
    Ok(())
}

// ============================================================================
// RequestHandler
// ============================================================================

/// Handles IPC requests by dispatching to the playback service.
#[derive(Debug, Clone)]
pub struct RequestHandler {
    service: ServiceHandle,
    /// Signalled when a client asks the daemon to exit
    shutdown: Arc<Notify>,
}

impl RequestHandler {
    /// Creates a new request handler for the given service.
    pub fn new(service: ServiceHandle, shutdown: Arc<Notify>) -> Self {
        Self { service, shutdown }
    }

    /// Serves one client connection from request to hang-up.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be read or the reply written.
    pub async fn serve(&self, mut stream: UnixStream) -> Result<()> {
        let request = IpcServer::receive_request(&mut stream).await?;
        debug!("Received request: {:?}", request);

        if request == IpcRequest::Watch {
            return self.watch(stream).await;
        }

        let response = self.handle(request).await;
        IpcServer::send_response(&mut stream, &response).await?;
        let _ = stream.shutdown().await;
        Ok(())
    }

    /// Handles a single-shot IPC request and returns the response.
    ///
    /// `watch` needs the connection and is answered with an error here; use
    /// [`RequestHandler::serve`] for it.
    pub async fn handle(&self, request: IpcRequest) -> IpcResponse {
        match request {
            IpcRequest::Select { index } => {
                snapshot_response(self.service.select(index).await, "曲を選択しました")
            }
            IpcRequest::Play => snapshot_response(self.service.play().await, "再生を開始しました"),
            IpcRequest::Pause => {
                snapshot_response(self.service.pause().await, "一時停止しました")
            }
            IpcRequest::Stop => snapshot_response(self.service.stop().await, "停止しました"),
            IpcRequest::Next => {
                snapshot_response(self.service.next().await, "次の曲へ移動しました")
            }
            IpcRequest::Previous => {
                snapshot_response(self.service.previous().await, "前の曲へ移動しました")
            }
            IpcRequest::Status => snapshot_response(self.service.query_state().await, ""),
            IpcRequest::List => self.handle_list().await,
            IpcRequest::Watch => {
                IpcResponse::error("watch は接続を保持したまま使用してください")
            }
            IpcRequest::Shutdown => self.handle_shutdown().await,
        }
    }

    async fn handle_list(&self) -> IpcResponse {
        let catalog = match self.service.catalog().await {
            Ok(catalog) => catalog,
            Err(e) => return IpcResponse::error(e.to_string()),
        };
        match self.service.query_state().await {
            Ok(snapshot) => IpcResponse::success(
                format!("{}曲", catalog.len()),
                Some(ResponseData::from_tracks(&snapshot, catalog.tracks().to_vec())),
            ),
            Err(e) => IpcResponse::error(e.to_string()),
        }
    }

    async fn handle_shutdown(&self) -> IpcResponse {
        if let Err(e) = self.service.shutdown().await {
            return IpcResponse::error(e.to_string());
        }
        self.shutdown.notify_one();
        IpcResponse::success("デーモンを終了します", None)
    }

    /// Attaches a channel observer and streams its events until the client
    /// disconnects.
    async fn watch(&self, mut stream: UnixStream) -> Result<()> {
        let session = Uuid::new_v4();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer: Arc<dyn PlaybackObserver> = Arc::new(ChannelObserver::new(tx));

        let snapshot = match self.service.attach(Arc::clone(&observer)).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                IpcServer::send_response(&mut stream, &IpcResponse::error(e.to_string())).await?;
                return Ok(());
            }
        };
        info!("Watch session {} started", session);

        let (mut reader, mut writer) = stream.split();
        IpcServer::send_response(
            &mut writer,
            &IpcResponse::success(
                "監視を開始しました",
                Some(ResponseData::from_snapshot(&snapshot)),
            ),
        )
        .await?;

        let mut probe = [0u8; 64];
        loop {
            tokio::select! {
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = write_line(&mut writer, &event).await {
                        debug!("Watch session {} write failed: {}", session, e);
                        break;
                    }
                }
                read = reader.read(&mut probe) => {
                    match read {
                        Ok(0) | Err(_) => break,
                        Ok(_) => {}
                    }
                }
            }
        }

        // Dropping the only strong reference kills the service's weak slot.
        drop(observer);
        info!("Watch session {} ended", session);
        Ok(())
    }
}

fn snapshot_response(result: Result<PlaybackSnapshot, ServiceError>, message: &str) -> IpcResponse {
    match result {
        Ok(snapshot) => {
            IpcResponse::success(message, Some(ResponseData::from_snapshot(&snapshot)))
        }
        Err(e) => {
            if e.is_recoverable() {
                debug!("Request failed: {}", e);
            } else {
                warn!("Request failed: {}", e);
            }
            IpcResponse::error(e.to_string())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    use crate::engine::{EngineError, MockEngine, MockEngineControl};
    use crate::playlist::Catalog;
    use crate::service::MockKeepAlive;
    use crate::types::ObserverEvent;

    // ------------------------------------------------------------------------
    // Helper functions
    // ------------------------------------------------------------------------

    fn create_temp_socket_path() -> PathBuf {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sock");
        // Keep the directory so it's not deleted
        std::mem::forget(dir);
        path
    }

    fn create_handler() -> (RequestHandler, MockEngineControl, Arc<Notify>) {
        let control = MockEngineControl::new();
        let engine_control = control.clone();
        let (service, _thread) = ServiceHandle::spawn(
            Catalog::from_paths(["/m/A.mp3", "/m/B.mp3", "/m/C.mp3"]),
            0,
            MockKeepAlive::new(),
            move |tx| Ok::<MockEngine, EngineError>(engine_control.build_engine(tx)),
        )
        .unwrap();
        let shutdown = Arc::new(Notify::new());
        (
            RequestHandler::new(service, Arc::clone(&shutdown)),
            control,
            shutdown,
        )
    }

    async fn read_response(stream: &mut UnixStream) -> IpcResponse {
        let mut buf = Vec::new();
        stream.read_to_end(&mut buf).await.unwrap();
        serde_json::from_slice(buf.trim_ascii()).unwrap()
    }

    // ------------------------------------------------------------------------
    // IpcServer Tests
    // ------------------------------------------------------------------------

    mod ipc_server_tests {
        use super::*;

        #[tokio::test]
        async fn test_server_creation() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path);

            assert!(server.is_ok());
            assert!(socket_path.exists());
        }

        #[tokio::test]
        async fn test_server_removes_existing_socket() {
            let socket_path = create_temp_socket_path();
            std::fs::write(&socket_path, "dummy").unwrap();

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
        }

        #[tokio::test]
        async fn test_server_creates_parent_directory() {
            let dir = tempfile::tempdir().unwrap();
            let socket_path = dir.path().join("subdir").join("test.sock");

            let server = IpcServer::new(&socket_path);
            assert!(server.is_ok());
            assert!(socket_path.parent().unwrap().exists());
        }

        #[tokio::test]
        async fn test_receive_request_select() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let client_handle = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                stream
                    .write_all(b"{\"command\":\"select\",\"index\":2}\n")
                    .await
                    .unwrap();
                stream.flush().await.unwrap();
                stream
            });

            let mut stream = server.accept().await.unwrap();
            let request = IpcServer::receive_request(&mut stream).await.unwrap();
            assert_eq!(request, IpcRequest::Select { index: 2 });

            client_handle.await.unwrap();
        }

        #[tokio::test]
        async fn test_receive_request_invalid_json() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();

            let client_path = socket_path.clone();
            let _client = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                stream.write_all(b"not valid json").await.unwrap();
                stream.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(200)).await;
            });

            let mut stream = server.accept().await.unwrap();
            assert!(IpcServer::receive_request(&mut stream).await.is_err());
        }

        #[tokio::test]
        async fn test_receive_request_too_large() {
            let mut input: &[u8] = &[b' '; MAX_REQUEST_SIZE + 10];
            let err = IpcServer::receive_request(&mut input).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<IpcError>(),
                Some(IpcError::RequestTooLarge)
            ));
        }

        #[tokio::test]
        async fn test_connection_closed() {
            let mut input: &[u8] = &[];
            let err = IpcServer::receive_request(&mut input).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<IpcError>(),
                Some(IpcError::ConnectionClosed)
            ));
        }

        #[tokio::test]
        async fn test_send_response_is_one_line() {
            let mut out = Vec::new();
            IpcServer::send_response(&mut out, &IpcResponse::success("ok", None))
                .await
                .unwrap();

            assert_eq!(out.last(), Some(&b'\n'));
            assert_eq!(out.iter().filter(|b| **b == b'\n').count(), 1);
        }

        #[tokio::test]
        async fn test_server_drop_cleanup() {
            let socket_path = create_temp_socket_path();
            {
                let server = IpcServer::new(&socket_path).unwrap();
                assert_eq!(server.socket_path(), socket_path);
                assert!(socket_path.exists());
            }
            assert!(!socket_path.exists());
        }

        #[test]
        fn test_ipc_error_display() {
            assert_eq!(IpcError::Timeout.to_string(), "Operation timed out");
            assert!(IpcError::RequestTooLarge.to_string().contains("4096"));
        }
    }

    // ------------------------------------------------------------------------
    // RequestHandler Tests
    // ------------------------------------------------------------------------

    mod request_handler_tests {
        use super::*;

        #[tokio::test]
        async fn test_handle_status() {
            let (handler, _control, _shutdown) = create_handler();

            let response = handler.handle(IpcRequest::Status).await;

            assert_eq!(response.status, "success");
            let data = response.data.unwrap();
            assert_eq!(data.state, Some("idle".to_string()));
            assert_eq!(data.index, Some(0));
            assert_eq!(data.is_playing, Some(false));
        }

        #[tokio::test]
        async fn test_handle_play_pause_stop() {
            let (handler, _control, _shutdown) = create_handler();

            let response = handler.handle(IpcRequest::Play).await;
            assert_eq!(response.message, "再生を開始しました");
            assert_eq!(response.data.unwrap().title, Some("A".to_string()));

            let response = handler.handle(IpcRequest::Pause).await;
            assert_eq!(response.data.unwrap().state, Some("paused".to_string()));

            let response = handler.handle(IpcRequest::Stop).await;
            assert_eq!(response.data.unwrap().state, Some("idle".to_string()));
        }

        #[tokio::test]
        async fn test_handle_navigation() {
            let (handler, _control, _shutdown) = create_handler();

            let response = handler.handle(IpcRequest::Previous).await;
            assert_eq!(response.data.unwrap().index, Some(2));

            let response = handler.handle(IpcRequest::Next).await;
            assert_eq!(response.data.unwrap().index, Some(0));

            let response = handler.handle(IpcRequest::Select { index: 1 }).await;
            let data = response.data.unwrap();
            assert_eq!(data.index, Some(1));
            assert_eq!(data.is_playing, Some(true));
        }

        #[tokio::test]
        async fn test_handle_select_out_of_range() {
            let (handler, _control, _shutdown) = create_handler();

            let response = handler.handle(IpcRequest::Select { index: 3 }).await;

            assert!(response.is_error());
            assert!(response.message.contains("無効なトラック番号"));
        }

        #[tokio::test]
        async fn test_handle_unreadable_track() {
            let (handler, control, _shutdown) = create_handler();
            control.set_unreadable("/m/B.mp3");

            let response = handler.handle(IpcRequest::Select { index: 1 }).await;
            assert!(response.is_error());
            assert!(response.message.contains('B'));

            let response = handler.handle(IpcRequest::Status).await;
            assert_eq!(response.data.unwrap().state, Some("idle".to_string()));
        }

        #[tokio::test]
        async fn test_handle_list() {
            let (handler, _control, _shutdown) = create_handler();

            let response = handler.handle(IpcRequest::List).await;

            let tracks = response.data.unwrap().tracks.unwrap();
            let titles: Vec<_> = tracks.iter().map(|t| t.title.as_str()).collect();
            assert_eq!(titles, vec!["A", "B", "C"]);
        }

        #[tokio::test]
        async fn test_handle_watch_without_connection() {
            let (handler, _control, _shutdown) = create_handler();
            assert!(handler.handle(IpcRequest::Watch).await.is_error());
        }

        #[tokio::test]
        async fn test_handle_shutdown_signals_daemon() {
            let (handler, control, shutdown) = create_handler();
            handler.handle(IpcRequest::Play).await;

            let response = handler.handle(IpcRequest::Shutdown).await;

            assert_eq!(response.status, "success");
            timeout(Duration::from_secs(1), shutdown.notified())
                .await
                .unwrap();
            assert_eq!(control.state(), crate::types::PlaybackState::Idle);
            assert!(handler.handle(IpcRequest::Status).await.is_error());
        }
    }

    // ------------------------------------------------------------------------
    // Connection Tests
    // ------------------------------------------------------------------------

    mod connection_tests {
        use super::*;

        #[tokio::test]
        async fn test_serve_single_request() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();
            let (handler, _control, _shutdown) = create_handler();

            let client_path = socket_path.clone();
            let client = tokio::spawn(async move {
                let mut stream = UnixStream::connect(&client_path).await.unwrap();
                stream.write_all(b"{\"command\":\"next\"}\n").await.unwrap();
                stream.shutdown().await.unwrap();
                read_response(&mut stream).await
            });

            let stream = server.accept().await.unwrap();
            handler.serve(stream).await.unwrap();

            let response = client.await.unwrap();
            assert_eq!(response.message, "次の曲へ移動しました");
            assert_eq!(response.data.unwrap().index, Some(1));
        }

        #[tokio::test]
        async fn test_watch_streams_events() {
            let socket_path = create_temp_socket_path();
            let server = IpcServer::new(&socket_path).unwrap();
            let (handler, _control, _shutdown) = create_handler();

            let watch_handler = handler.clone();
            let server_task = tokio::spawn(async move {
                let stream = server.accept().await.unwrap();
                watch_handler.serve(stream).await
            });

            let stream = UnixStream::connect(&socket_path).await.unwrap();
            let (read_half, mut write_half) = stream.into_split();
            write_half
                .write_all(b"{\"command\":\"watch\"}\n")
                .await
                .unwrap();
            let mut lines = BufReader::new(read_half).lines();

            let first = lines.next_line().await.unwrap().unwrap();
            let response: IpcResponse = serde_json::from_str(&first).unwrap();
            assert_eq!(response.status, "success");

            // Current state pushed on attach
            let event: ObserverEvent =
                serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(event, ObserverEvent::TitleChanged { title: None });
            lines.next_line().await.unwrap().unwrap();

            handler.handle(IpcRequest::Select { index: 2 }).await;
            let event: ObserverEvent =
                serde_json::from_str(&lines.next_line().await.unwrap().unwrap()).unwrap();
            assert_eq!(
                event,
                ObserverEvent::TitleChanged {
                    title: Some("C".to_string())
                }
            );

            drop(write_half);
            drop(lines);
            timeout(Duration::from_secs(2), server_task)
                .await
                .unwrap()
                .unwrap()
                .unwrap();

            // Playback carries on with nobody watching.
            let response = handler.handle(IpcRequest::Next).await;
            assert_eq!(response.data.unwrap().index, Some(0));
        }
    }
}
