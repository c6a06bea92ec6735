//! Transport session state and outbound buffering
//!
//! A session owns exactly one client connection. Outbound messages are queued
//! on a bounded channel drained by the connection's writer task; a full
//! buffer marks the client as a slow consumer and the session is closed
//! rather than letting it stall the rest of the server.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::protocol::Message;
use crate::util::time::unix_millis;

use super::ConnId;

/// Session lifecycle: Open -> Closing -> Closed, never backwards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepting reads and writes
    Open,
    /// Draining queued writes; no new messages accepted
    Closing,
    /// All resources released
    Closed,
}

/// Failure to enqueue an outbound message
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("outbound buffer full")]
    BufferFull,

    #[error("session is not open")]
    NotOpen,
}

/// One live client connection
pub struct Session {
    id: ConnId,
    remote: SocketAddr,
    state: Mutex<SessionState>,
    outbound: mpsc::Sender<Message>,
    closing_tx: watch::Sender<bool>,
    malformed_frames: AtomicU32,
    opened_at_ms: u64,
}

impl Session {
    /// Create a session together with the receiver its writer task drains
    pub fn new(id: ConnId, remote: SocketAddr, buffer: usize) -> (Arc<Self>, mpsc::Receiver<Message>) {
        let (outbound, outbound_rx) = mpsc::channel(buffer);
        let (closing_tx, _) = watch::channel(false);
        let session = Arc::new(Self {
            id,
            remote,
            state: Mutex::new(SessionState::Open),
            outbound,
            closing_tx,
            malformed_frames: AtomicU32::new(0),
            opened_at_ms: unix_millis(),
        });
        (session, outbound_rx)
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Milliseconds since the Unix epoch at which the connection was accepted
    pub fn opened_at_ms(&self) -> u64 {
        self.opened_at_ms
    }

    /// Queue a message for writing without blocking the caller
    pub fn send(&self, message: Message) -> Result<(), SendError> {
        if !self.is_open() {
            return Err(SendError::NotOpen);
        }
        self.outbound.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendError::BufferFull,
            mpsc::error::TrySendError::Closed(_) => SendError::NotOpen,
        })
    }

    /// Move Open -> Closing and wake the connection tasks
    ///
    /// Returns true only for the call that performed the transition, so close
    /// paths stay idempotent.
    pub fn begin_close(&self) -> bool {
        let mut state = self.state.lock();
        if *state != SessionState::Open {
            return false;
        }
        *state = SessionState::Closing;
        drop(state);
        let _ = self.closing_tx.send(true);
        true
    }

    /// Terminal transition; safe to call any number of times
    pub fn mark_closed(&self) {
        let mut state = self.state.lock();
        if *state != SessionState::Closed {
            *state = SessionState::Closed;
            drop(state);
            let _ = self.closing_tx.send(true);
        }
    }

    /// Observe the close signal; resolves once the session leaves Open
    pub fn closing(&self) -> watch::Receiver<bool> {
        self.closing_tx.subscribe()
    }

    /// Count a malformed inbound frame; true once the limit is exceeded
    pub fn record_malformed(&self, limit: u32) -> bool {
        let seen = self.malformed_frames.fetch_add(1, Ordering::Relaxed) + 1;
        seen > limit
    }

    pub fn malformed_frames(&self) -> u32 {
        self.malformed_frames.load(Ordering::Relaxed)
    }
}
