//! Control thread and async handle for the playback service.
//!
//! The service and its engine live on one dedicated thread. Commands from
//! the IPC layer and completion events from the engine are multiplexed on
//! that thread, so the service never sees two inputs at once and a
//! completion can never interleave with a command half-way through.

use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use super::error::ServiceError;
use super::keepalive::KeepAlive;
use super::observer::PlaybackObserver;
use super::player::PlaybackService;
use crate::engine::{Completion, CompletionSender, EngineError, PlaybackEngine};
use crate::playlist::Catalog;
use crate::types::PlaybackSnapshot;

/// Name of the control thread.
const CONTROL_THREAD_NAME: &str = "playd-control";

type Reply<T> = oneshot::Sender<T>;

enum Command {
    Start {
        catalog: Catalog,
        initial_index: usize,
        reply: Reply<Result<(), ServiceError>>,
    },
    Select {
        index: usize,
        reply: Reply<Result<PlaybackSnapshot, ServiceError>>,
    },
    Play(Reply<Result<PlaybackSnapshot, ServiceError>>),
    Pause(Reply<PlaybackSnapshot>),
    Stop(Reply<PlaybackSnapshot>),
    Next(Reply<Result<PlaybackSnapshot, ServiceError>>),
    Previous(Reply<Result<PlaybackSnapshot, ServiceError>>),
    QueryState(Reply<PlaybackSnapshot>),
    Catalog(Reply<Catalog>),
    Attach {
        observer: Arc<dyn PlaybackObserver>,
        reply: Reply<PlaybackSnapshot>,
    },
    Detach(Reply<()>),
    Shutdown(Reply<()>),
}

/// Cloneable async handle to a running playback service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    tx: Sender<Command>,
}

impl ServiceHandle {
    /// Starts the control thread and the service on it.
    ///
    /// `make_engine` runs on the control thread, so the engine does not need
    /// to be `Send`. It receives the sender for completion events. The call
    /// returns once the service has started with `catalog` and
    /// `initial_index`.
    ///
    /// # Errors
    ///
    /// Returns `EngineInit` if the engine cannot be created, `InvalidIndex`
    /// if `initial_index` is out of range, or `ControlThread` if the thread
    /// cannot be spawned.
    pub fn spawn<E, K, F>(
        catalog: Catalog,
        initial_index: usize,
        keep_alive: K,
        make_engine: F,
    ) -> Result<(Self, JoinHandle<()>), ServiceError>
    where
        E: PlaybackEngine + 'static,
        K: KeepAlive + 'static,
        F: FnOnce(CompletionSender) -> Result<E, EngineError> + Send + 'static,
    {
        let (tx, rx) = crossbeam_channel::unbounded::<Command>();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), ServiceError>>(1);

        let thread = std::thread::Builder::new()
            .name(CONTROL_THREAD_NAME.to_string())
            .spawn(move || {
                let (completion_tx, completion_rx) = crossbeam_channel::unbounded();
                let engine = match make_engine(completion_tx) {
                    Ok(engine) => engine,
                    Err(e) => {
                        let _ = ready_tx.send(Err(ServiceError::EngineInit(e)));
                        return;
                    }
                };

                let mut service = PlaybackService::new(engine, keep_alive);
                if let Err(e) = service.start(catalog, initial_index) {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                let shutdown_reply = control_loop(&mut service, &rx, completion_rx);
                service.shutdown();
                if let Some(reply) = shutdown_reply {
                    let _ = reply.send(());
                }
                debug!("Control thread exiting");
            })
            .map_err(|e| ServiceError::ControlThread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Playback service running");
                Ok((Self { tx }, thread))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(ServiceError::ControlThread(
                    "制御スレッドが起動中に終了しました".to_string(),
                ))
            }
        }
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, ServiceError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(command(reply))
            .map_err(|_| ServiceError::ServiceStopped)?;
        rx.await.map_err(|_| ServiceError::ServiceStopped)
    }

    /// Replaces the catalog and cursor. See [`PlaybackService::start`].
    pub async fn start(&self, catalog: Catalog, initial_index: usize) -> Result<(), ServiceError> {
        self.request(|reply| Command::Start {
            catalog,
            initial_index,
            reply,
        })
        .await?
    }

    pub async fn select(&self, index: usize) -> Result<PlaybackSnapshot, ServiceError> {
        self.request(|reply| Command::Select { index, reply }).await?
    }

    pub async fn play(&self) -> Result<PlaybackSnapshot, ServiceError> {
        self.request(Command::Play).await?
    }

    pub async fn pause(&self) -> Result<PlaybackSnapshot, ServiceError> {
        self.request(Command::Pause).await
    }

    pub async fn stop(&self) -> Result<PlaybackSnapshot, ServiceError> {
        self.request(Command::Stop).await
    }

    pub async fn next(&self) -> Result<PlaybackSnapshot, ServiceError> {
        self.request(Command::Next).await?
    }

    pub async fn previous(&self) -> Result<PlaybackSnapshot, ServiceError> {
        self.request(Command::Previous).await?
    }

    pub async fn query_state(&self) -> Result<PlaybackSnapshot, ServiceError> {
        self.request(Command::QueryState).await
    }

    pub async fn catalog(&self) -> Result<Catalog, ServiceError> {
        self.request(Command::Catalog).await
    }

    /// Attaches `observer`, replacing any previous one.
    ///
    /// Only a weak reference is kept: the observer stays attached for as long
    /// as the caller holds `observer`.
    pub async fn attach(
        &self,
        observer: Arc<dyn PlaybackObserver>,
    ) -> Result<PlaybackSnapshot, ServiceError> {
        self.request(|reply| Command::Attach { observer, reply })
            .await
    }

    pub async fn detach(&self) -> Result<(), ServiceError> {
        self.request(Command::Detach).await
    }

    /// Stops playback and ends the control thread.
    ///
    /// Calling this on a service that has already shut down succeeds.
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        match self.request(Command::Shutdown).await {
            Ok(()) | Err(ServiceError::ServiceStopped) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Runs until a shutdown command arrives or every handle is dropped.
///
/// Returns the reply channel of the shutdown command, if there was one.
fn control_loop<E: PlaybackEngine, K: KeepAlive>(
    service: &mut PlaybackService<E, K>,
    commands: &Receiver<Command>,
    completions: Receiver<Completion>,
) -> Option<Reply<()>> {
    let mut completions = completions;

    loop {
        let mut completions_closed = false;

        crossbeam_channel::select! {
            recv(commands) -> msg => match msg {
                Ok(command) => {
                    if let ControlFlow::Break(reply) = dispatch(service, command) {
                        return Some(reply);
                    }
                }
                Err(_) => {
                    debug!("All service handles dropped");
                    return None;
                }
            },
            recv(completions) -> msg => match msg {
                Ok(completion) => {
                    service.on_completion(completion);
                }
                Err(_) => completions_closed = true,
            },
        }

        if completions_closed {
            error!("Engine completion channel closed; auto-advance disabled");
            completions = crossbeam_channel::never();
        }
    }
}

/// Runs one command. Breaks with the reply channel on shutdown, which is
/// answered once the service has been released.
fn dispatch<E: PlaybackEngine, K: KeepAlive>(
    service: &mut PlaybackService<E, K>,
    command: Command,
) -> ControlFlow<Reply<()>> {
    // A dropped reply receiver means the requester gave up; nothing to do.
    match command {
        Command::Start {
            catalog,
            initial_index,
            reply,
        } => {
            let _ = reply.send(service.start(catalog, initial_index));
        }
        Command::Select { index, reply } => {
            let _ = reply.send(service.select(index));
        }
        Command::Play(reply) => {
            let _ = reply.send(service.play());
        }
        Command::Pause(reply) => {
            let _ = reply.send(service.pause());
        }
        Command::Stop(reply) => {
            let _ = reply.send(service.stop());
        }
        Command::Next(reply) => {
            let _ = reply.send(service.next());
        }
        Command::Previous(reply) => {
            let _ = reply.send(service.previous());
        }
        Command::QueryState(reply) => {
            let _ = reply.send(service.query_state());
        }
        Command::Catalog(reply) => {
            let _ = reply.send(service.catalog().clone());
        }
        Command::Attach { observer, reply } => {
            let _ = reply.send(service.attach(&observer));
        }
        Command::Detach(reply) => {
            service.detach();
            let _ = reply.send(());
        }
        Command::Shutdown(reply) => return ControlFlow::Break(reply),
    }
    ControlFlow::Continue(())
}

// ============================================================================
// Tests
// ============================================================================
