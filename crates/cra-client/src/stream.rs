//! Review-stream session: one WebSocket per viewed contract.
//!
//! Frames are decoded into `StageEvent`s on the session task and forwarded,
//! tagged with the session generation, over an mpsc channel. Undecodable
//! frames are logged and dropped. Once a session is closed no further
//! message from it is forwarded, even if the socket still delivers one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cra_core::Error;
use cra_pipeline::StageEvent;
use futures::{SinkExt, Stream, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SocketState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Opened,
    Stage(StageEvent),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionMessage {
    pub generation: u64,
    pub event: SessionEvent,
}

/// Decode one text frame; `None` (logged) when it is not a stage event.
pub fn decode_frame(text: &str) -> Option<StageEvent> {
    match StageEvent::decode(text) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Dropping undecodable review message: {}", e);
            None
        }
    }
}

/// Shared between the session handle and its task.
struct Shared {
    generation: u64,
    alive: AtomicBool,
    state: Mutex<SocketState>,
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl Shared {
    fn set_state(&self, state: SocketState) {
        *self.state.lock() = state;
    }

    /// Forward an event unless the session has been torn down.
    fn dispatch(&self, event: SessionEvent) -> bool {
        if !self.alive.load(Ordering::Acquire) {
            debug!("Discarding message from closed session {}", self.generation);
            return false;
        }
        self.tx
            .send(SessionMessage {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

enum PumpExit {
    CloseRequested,
    Ended,
}

async fn pump<S>(stream: &mut S, shared: &Shared, close_rx: &mut oneshot::Receiver<()>) -> PumpExit
where
    S: Stream<Item = std::result::Result<Message, WsError>> + Unpin,
{
    loop {
        tokio::select! {
            _ = &mut *close_rx => return PumpExit::CloseRequested,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(event) = decode_frame(&text) {
                        if !shared.dispatch(SessionEvent::Stage(event)) {
                            return PumpExit::Ended;
                        }
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    debug!("Review stream closed by server: {:?}", frame);
                    return PumpExit::Ended;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("Review stream error: {}", e);
                    return PumpExit::Ended;
                }
                None => return PumpExit::Ended,
            }
        }
    }
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn open_socket(url: &str) -> cra_core::Result<Socket> {
    tokio_tungstenite::connect_async(url)
        .await
        .map(|(ws, _)| ws)
        .map_err(|e| Error::Transport(format!("{}: {}", url, e)))
}

pub struct StreamSession {
    shared: Arc<Shared>,
    close_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl StreamSession {
    /// Open a WebSocket to `url` on a background task.
    pub fn connect(url: String, generation: u64, tx: mpsc::UnboundedSender<SessionMessage>) -> Self {
        let shared = Arc::new(Shared {
            generation,
            alive: AtomicBool::new(true),
            state: Mutex::new(SocketState::Connecting),
            tx,
        });
        let (close_tx, mut close_rx) = oneshot::channel();
        let task_shared = shared.clone();

        let task = tokio::spawn(async move {
            let shared = task_shared;
            let connected = tokio::select! {
                r = open_socket(&url) => r,
                _ = &mut close_rx => {
                    // Still connecting: nothing to close.
                    shared.set_state(SocketState::Closed);
                    return;
                }
            };

            let ws = match connected {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("Failed to connect review stream: {}", e);
                    shared.set_state(SocketState::Closed);
                    shared.dispatch(SessionEvent::Closed);
                    return;
                }
            };
            info!("Connected to review stream {}", url);
            shared.set_state(SocketState::Open);
            shared.dispatch(SessionEvent::Opened);

            let (mut sink, mut stream) = ws.split();
            if let PumpExit::CloseRequested = pump(&mut stream, &shared, &mut close_rx).await {
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!("Close frame not delivered: {}", e);
                }
            }
            shared.set_state(SocketState::Closed);
            info!("Review stream {} disconnected", url);
            shared.dispatch(SessionEvent::Closed);
        });

        Self {
            shared,
            close_tx: Some(close_tx),
            task: Some(task),
        }
    }

    /// Run a session over an already-open frame stream.
    pub fn from_stream<S>(stream: S, generation: u64, tx: mpsc::UnboundedSender<SessionMessage>) -> Self
    where
        S: Stream<Item = std::result::Result<Message, WsError>> + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared {
            generation,
            alive: AtomicBool::new(true),
            state: Mutex::new(SocketState::Open),
            tx,
        });
        let (close_tx, mut close_rx) = oneshot::channel();
        let task_shared = shared.clone();

        let task = tokio::spawn(async move {
            let mut stream = stream;
            pump(&mut stream, &task_shared, &mut close_rx).await;
            task_shared.set_state(SocketState::Closed);
            task_shared.dispatch(SessionEvent::Closed);
        });

        Self {
            shared,
            close_tx: Some(close_tx),
            task: Some(task),
        }
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation
    }

    pub fn state(&self) -> SocketState {
        *self.shared.state.lock()
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// Stop forwarding and close the socket if it is open. Idempotent.
    pub fn close(&mut self) {
        if self.shared.alive.swap(false, Ordering::AcqRel) {
            debug!("Closing review session {}", self.shared.generation);
        }
        if let Some(tx) = self.close_tx.take() {
            // The task may already have finished; that is fine.
            let _ = tx.send(());
        }
    }

    /// Close and wait for the session task to finish.
    pub async fn shutdown(mut self) {
        self.close();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Review session task failed: {}", e);
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.close();
    }
}
