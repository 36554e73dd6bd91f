//! Push Channel Connection
//!
//! One WebSocket shared by every streamed call of a client:
//! - Opened lazily by the first streamed call
//! - Reference counted, closed when the last call finishes
//! - Reopened with backoff after an unexpected close while calls are pending
//! - Broadcasts state changes for UI updates

use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use super::dispatch::Dispatcher;
use super::frames::{FrameKind, PushFrame};
use crate::config::BackoffStrategy;

/// Push channel state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    /// No socket and no pending streamed call
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Socket open
    Connected,
    /// Socket dropped while calls are pending, retrying
    Reconnecting,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Events emitted by the push channel
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Connection state changed
    StateChanged {
        old_state: ConnectionState,
        new_state: ConnectionState,
    },
    /// Server announced the session id for the current socket
    SessionAssigned { session_id: String },
    /// A reconnect attempt is scheduled
    ReconnectScheduled { attempt: u32, delay_ms: u64 },
}

/// Mutable connection bookkeeping, guarded by one lock
#[derive(Default)]
struct Link {
    state: ConnectionState,
    /// In-flight streamed calls
    refcount: usize,
    /// Bumped whenever a connection task is started or retired
    generation: u64,
    task: Option<JoinHandle<()>>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// State shared between a client and its connection task
pub(crate) struct Channel {
    ws_url: String,
    backoff: BackoffStrategy,
    link: Mutex<Link>,
    pub(crate) dispatcher: Mutex<Dispatcher>,
    session_tx: watch::Sender<Option<String>>,
    event_tx: broadcast::Sender<TransportEvent>,
}

impl Channel {
    pub(crate) fn new(ws_url: impl Into<String>, backoff: BackoffStrategy) -> Arc<Self> {
        let (session_tx, _) = watch::channel(None);
        let (event_tx, _) = broadcast::channel(100);
        Arc::new(Self {
            ws_url: ws_url.into(),
            backoff,
            link: Mutex::new(Link::default()),
            dispatcher: Mutex::new(Dispatcher::new()),
            session_tx,
            event_tx,
        })
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.link.lock().state
    }

    pub(crate) fn refcount(&self) -> usize {
        self.link.lock().refcount
    }

    pub(crate) fn session_id(&self) -> Option<String> {
        self.session_tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.event_tx.subscribe()
    }

    fn set_state(&self, link: &mut Link, new_state: ConnectionState) {
        let old_state = link.state;
        if old_state == new_state {
            return;
        }
        link.state = new_state;
        info!("Push channel {} -> {}", old_state, new_state);
        let _ = self.event_tx.send(TransportEvent::StateChanged { old_state, new_state });
    }

    /// Count a streamed call in, opening the socket if needed
    pub(crate) fn acquire(self: &Arc<Self>) {
        let mut link = self.link.lock();
        link.refcount += 1;
        debug!("Push channel acquired (refcount {})", link.refcount);

        if link.state == ConnectionState::Disconnected {
            link.generation += 1;
            let generation = link.generation;
            let (shutdown_tx, shutdown_rx) = oneshot::channel();
            link.shutdown = Some(shutdown_tx);
            self.set_state(&mut link, ConnectionState::Connecting);
            link.task = Some(tokio::spawn(run_connection(
                self.clone(),
                generation,
                shutdown_rx,
            )));
        }
    }

    /// Count a streamed call out, closing the socket at zero
    pub(crate) fn release(&self) {
        // Lock order is dispatcher, then link. Handlers run under the
        // dispatcher lock and may read the link through the client.
        let mut dispatcher = self.dispatcher.lock();
        let mut link = self.link.lock();
        link.refcount = link.refcount.saturating_sub(1);
        debug!("Push channel released (refcount {})", link.refcount);

        if link.refcount > 0 || link.state == ConnectionState::Disconnected {
            return;
        }

        link.generation += 1;
        if let Some(shutdown) = link.shutdown.take() {
            let _ = shutdown.send(());
        }
        // The task closes the socket itself once it sees the shutdown signal
        link.task = None;
        self.set_state(&mut link, ConnectionState::Disconnected);
        self.session_tx.send_replace(None);
        dispatcher.clear_cache();
    }

    /// Wait until the server has announced a session id
    pub(crate) async fn wait_for_session(&self, wait: Duration) -> Option<String> {
        let mut rx = self.session_tx.subscribe();
        let session = match tokio::time::timeout(wait, rx.wait_for(Option::is_some)).await {
            Ok(Ok(session)) => (*session).clone(),
            _ => None,
        };
        session
    }

    /// Abort the connection task without waiting for pending calls
    pub(crate) fn abort(&self) {
        let mut link = self.link.lock();
        link.generation += 1;
        link.shutdown = None;
        if let Some(task) = link.task.take() {
            task.abort();
        }
        link.state = ConnectionState::Disconnected;
        self.session_tx.send_replace(None);
    }

    /// Record a successful open; false if this task was retired
    fn mark_connected(&self, generation: u64) -> bool {
        let mut link = self.link.lock();
        if link.generation != generation {
            return false;
        }
        self.set_state(&mut link, ConnectionState::Connected);
        true
    }

    /// Decide whether to retry after the socket closed or failed to open
    fn begin_reconnect(&self, generation: u64) -> bool {
        let mut link = self.link.lock();
        if link.generation != generation {
            return false;
        }

        // The session died with the socket
        self.session_tx.send_replace(None);

        if link.refcount == 0 {
            link.task = None;
            link.shutdown = None;
            self.set_state(&mut link, ConnectionState::Disconnected);
            return false;
        }

        self.set_state(&mut link, ConnectionState::Reconnecting);
        true
    }

    /// Replace a connection task that died without retiring itself
    fn restart(self: &Arc<Self>, generation: u64) {
        let mut link = self.link.lock();
        if link.generation != generation {
            return;
        }

        self.session_tx.send_replace(None);
        link.task = None;
        link.shutdown = None;

        if link.refcount == 0 {
            self.set_state(&mut link, ConnectionState::Disconnected);
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("Push channel task died outside a runtime, cannot restart");
            self.set_state(&mut link, ConnectionState::Disconnected);
            return;
        };

        link.generation += 1;
        let generation = link.generation;
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        link.shutdown = Some(shutdown_tx);
        self.set_state(&mut link, ConnectionState::Reconnecting);
        link.task = Some(runtime.spawn(run_connection(self.clone(), generation, shutdown_rx)));
    }

    fn handle_text(&self, generation: u64, text: &str) {
        let frame = match PushFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Dropping push frame: {}", e);
                return;
            }
        };

        match frame.kind() {
            FrameKind::Uuid => {
                let Some(session_id) = frame.session_uuid() else {
                    warn!("uuid frame without a session id");
                    return;
                };
                if self.link.lock().generation != generation {
                    return;
                }
                info!("Push channel session: {}", session_id);
                self.session_tx.send_replace(Some(session_id.to_string()));
                let _ = self.event_tx.send(TransportEvent::SessionAssigned {
                    session_id: session_id.to_string(),
                });
            }
            FrameKind::Callback | FrameKind::Finish => {
                self.dispatcher.lock().dispatch(frame);
            }
            FrameKind::Other(kind) => {
                warn!("Ignoring push frame of unknown type '{}'", kind);
            }
        }
    }
}

/// Restarts the connection if its task unwinds
struct TaskGuard {
    channel: Arc<Channel>,
    generation: u64,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            error!("Push channel task panicked, restarting");
            self.channel.restart(self.generation);
        }
    }
}

/// Connection task: open, read until closed, retry while calls are pending
async fn run_connection(
    channel: Arc<Channel>,
    generation: u64,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let _guard = TaskGuard {
        channel: channel.clone(),
        generation,
    };
    let mut attempt: u32 = 0;

    loop {
        match tokio_tungstenite::connect_async(channel.ws_url.as_str()).await {
            Ok((stream, _)) => {
                attempt = 0;
                if !channel.mark_connected(generation) {
                    return;
                }

                let (mut write, mut read) = stream.split();
                loop {
                    tokio::select! {
                        _ = &mut shutdown_rx => {
                            debug!("Closing push channel");
                            let _ = write.send(Message::Close(None)).await;
                            return;
                        }
                        message = read.next() => match message {
                            Some(Ok(Message::Text(text))) => channel.handle_text(generation, text.as_str()),
                            Some(Ok(Message::Close(_))) | None => break,
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                warn!("Push channel read error: {}", e);
                                break;
                            }
                        }
                    }
                }
                warn!("Push channel closed by server");
            }
            Err(e) => {
                warn!("Failed to open push channel at {}: {}", channel.ws_url, e);
            }
        }

        if !channel.begin_reconnect(generation) {
            return;
        }

        let delay = channel.backoff.delay_for(attempt);
        attempt = attempt.saturating_add(1);
        let _ = channel.event_tx.send(TransportEvent::ReconnectScheduled {
            attempt,
            delay_ms: delay.as_millis() as u64,
        });
        info!("Reconnecting push channel in {}ms (attempt {})", delay.as_millis(), attempt);

        tokio::select! {
            _ = &mut shutdown_rx => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
