//! WebSocket upgrade handler and per-connection tasks
//!
//! Each accepted socket is split into a writer task draining the session's
//! outbound buffer and a read loop feeding decoded frames into the inbound
//! command queue. Every protocol frame travels as exactly one binary
//! WebSocket message.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::protocol::{codec, Message};
use crate::util::rate_limit::SessionRateLimiter;

use super::session::Session;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, remote, state))
}

/// Drive one upgraded connection until it closes
async fn handle_socket(socket: WebSocket, remote: SocketAddr, state: AppState) {
    let Some((session, outbound_rx)) = state.manager.register(remote) else {
        // Registry refused the connection; drop the socket immediately
        let mut socket = socket;
        let _ = socket.send(WsMessage::Close(None)).await;
        return;
    };

    let (ws_sink, ws_stream) = socket.split();
    let writer = tokio::spawn(write_loop(session.clone(), outbound_rx, ws_sink));

    read_loop(&state, &session, ws_stream).await;

    // Teardown: deregister, emit the synthetic Leave, then give the writer a
    // moment to flush before cutting it loose.
    state.manager.finish(session.id()).await;
    let mut writer = writer;
    if tokio::time::timeout(Duration::from_secs(1), &mut writer)
        .await
        .is_err()
    {
        debug!(conn = %session.id(), "writer did not finish in time");
        writer.abort();
    }
}

/// Forward inbound frames into the command queue
async fn read_loop(
    state: &AppState,
    session: &Arc<Session>,
    mut stream: SplitStream<WebSocket>,
) {
    let limiter = SessionRateLimiter::new();
    let mut closing = session.closing();

    loop {
        let incoming = tokio::select! {
            incoming = stream.next() => incoming,
            _ = closing.wait_for(|closing| *closing) => {
                debug!(conn = %session.id(), "read loop stopped by close request");
                break;
            }
        };

        let Some(result) = incoming else {
            break;
        };

        match result {
            Ok(WsMessage::Binary(buf)) => {
                if buf.len() > state.config.max_frame_bytes {
                    warn!(conn = %session.id(), len = buf.len(), "oversized frame");
                    if session.record_malformed(state.config.malformed_frame_limit) {
                        break;
                    }
                    continue;
                }
                if !limiter.check_frame() {
                    warn!(conn = %session.id(), "rate limited inbound frame");
                    continue;
                }
                match codec::decode(&buf) {
                    Ok(message) => {
                        // Awaiting here is the backpressure point: a full
                        // queue stalls this client's reads, not the server.
                        if state.manager.dispatch(session.id(), message).await.is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(conn = %session.id(), error = %err, "dropping malformed frame");
                        if session.record_malformed(state.config.malformed_frame_limit) {
                            warn!(
                                conn = %session.id(),
                                frames = session.malformed_frames(),
                                "malformed frame limit exceeded, closing session"
                            );
                            break;
                        }
                    }
                }
            }
            Ok(WsMessage::Text(_)) => {
                // The protocol is binary-only
                warn!(conn = %session.id(), "ignoring text frame");
                if session.record_malformed(state.config.malformed_frame_limit) {
                    break;
                }
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {
                debug!(conn = %session.id(), "websocket keepalive");
            }
            Ok(WsMessage::Close(_)) => {
                info!(conn = %session.id(), "client initiated close");
                break;
            }
            Err(err) => {
                debug!(conn = %session.id(), error = %err, "websocket read error");
                break;
            }
        }
    }
}

/// Drain the session's outbound buffer onto the socket
async fn write_loop(
    session: Arc<Session>,
    mut outbound_rx: mpsc::Receiver<Message>,
    mut sink: SplitSink<WebSocket, WsMessage>,
) {
    let mut closing = session.closing();

    loop {
        tokio::select! {
            maybe = outbound_rx.recv() => {
                match maybe {
                    Some(message) => {
                        if sink.send(WsMessage::Binary(codec::encode(&message))).await.is_err() {
                            session.begin_close();
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = async { let _ = closing.wait_for(|closing| *closing).await; } => {
                // Flush whatever is already queued, then say goodbye
                while let Ok(message) = outbound_rx.try_recv() {
                    if sink
                        .send(WsMessage::Binary(codec::encode(&message)))
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
        }
    }
}
