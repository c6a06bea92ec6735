//! Session registry, inbound queue fan-in and broadcast fan-out
//!
//! The manager owns every live session and the producing side of the single
//! inbound command queue. Session tasks push decoded messages here; the game
//! controller is the queue's only consumer. Pushes await on the bounded
//! channel, so a controller falling behind applies backpressure to session
//! read loops instead of growing memory without bound.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::game::InboundCommand;
use crate::protocol::Message;
use crate::util::time::unix_millis;

use super::session::{SendError, Session};
use super::{ConnId, InboundClosed};

/// Registry of live sessions plus the inbound queue producer
pub struct NetworkManager {
    sessions: DashMap<ConnId, Arc<Session>>,
    inbound_tx: mpsc::Sender<InboundCommand>,
    next_conn_id: AtomicU64,
    config: Arc<Config>,
}

impl NetworkManager {
    pub fn new(inbound_tx: mpsc::Sender<InboundCommand>, config: Arc<Config>) -> Arc<Self> {
        Arc::new(Self {
            sessions: DashMap::new(),
            inbound_tx,
            next_conn_id: AtomicU64::new(0),
            config,
        })
    }

    /// Admit a new connection, or reject it when the session table is full
    pub fn register(
        &self,
        remote: SocketAddr,
    ) -> Option<(Arc<Session>, mpsc::Receiver<Message>)> {
        if self.sessions.len() >= self.config.max_sessions {
            warn!(%remote, "rejecting connection, session table full");
            return None;
        }

        let id = ConnId(self.next_conn_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (session, outbound_rx) = Session::new(id, remote, self.config.session_buffer);
        self.sessions.insert(id, session.clone());
        info!(conn = %id, %remote, "session opened");
        Some((session, outbound_rx))
    }

    /// Push a decoded inbound message onto the command queue
    ///
    /// Awaits when the queue is full, which stalls the calling read loop and
    /// backpressures the client.
    pub async fn dispatch(&self, conn: ConnId, message: Message) -> Result<(), InboundClosed> {
        self.inbound_tx
            .send(InboundCommand { conn, message })
            .await
            .map_err(|_| InboundClosed)
    }

    /// Ask a session to close; the actual teardown happens on its own tasks
    pub fn request_close(&self, conn: ConnId) {
        if let Some(session) = self.sessions.get(&conn) {
            if session.begin_close() {
                debug!(conn = %conn, "close requested");
            }
        }
    }

    /// Final teardown after a session's read loop has ended
    ///
    /// Removes the session from the registry and emits a synthetic Leave so
    /// the controller observes the disconnect in queue order. Safe to call
    /// more than once per connection.
    pub async fn finish(&self, conn: ConnId) {
        let Some((_, session)) = self.sessions.remove(&conn) else {
            return;
        };
        session.begin_close();
        session.mark_closed();
        info!(
            conn = %conn,
            remote = %session.remote(),
            lifetime_ms = unix_millis().saturating_sub(session.opened_at_ms()),
            "session closed"
        );

        // The controller resolves the departing player from the connection
        // id, so the synthetic Leave carries no meaningful player id.
        let _ = self
            .inbound_tx
            .send(InboundCommand {
                conn,
                message: Message::Leave { player_id: 0 },
            })
            .await;
    }

    /// Queue a message on every open session
    ///
    /// Sessions whose outbound buffer is full are slow consumers and get
    /// closed so they cannot hold up the rest of the arena.
    pub fn broadcast(&self, message: &Message) {
        let mut slow = Vec::new();
        for entry in self.sessions.iter() {
            let session = entry.value();
            match session.send(message.clone()) {
                Ok(()) => {}
                Err(SendError::BufferFull) => slow.push(session.id()),
                // Already closing; its teardown is in flight
                Err(SendError::NotOpen) => {}
            }
        }
        for conn in slow {
            warn!(conn = %conn, "closing slow consumer");
            self.request_close(conn);
        }
    }

    /// Queue a message on one session
    pub fn send_to(&self, conn: ConnId, message: Message) -> bool {
        match self.sessions.get(&conn) {
            Some(session) => session.send(message).is_ok(),
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drain in-flight writes and close every session
    ///
    /// Writers flush their queued frames while we wait; whatever survives the
    /// grace period is force-closed.
    pub async fn shutdown(&self, grace: Duration) {
        info!(sessions = self.sessions.len(), "draining sessions for shutdown");
        for entry in self.sessions.iter() {
            entry.value().begin_close();
        }

        let deadline = Instant::now() + grace;
        while !self.sessions.is_empty() && Instant::now() < deadline {
            sleep(Duration::from_millis(50)).await;
        }

        let remaining: Vec<ConnId> = self.sessions.iter().map(|e| *e.key()).collect();
        for conn in remaining {
            if let Some((_, session)) = self.sessions.remove(&conn) {
                warn!(conn = %conn, "force-closing session after grace period");
                session.mark_closed();
            }
        }
    }
}
