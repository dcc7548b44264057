//! WebSocket endpoint for live duel events.
//!
//! # Protocol
//!
//! ```text
//! Client                     Handler                      EventBus
//!   │                           │                            │
//!   ├─ GET /ws/duels/:code ────>│                            │
//!   │                           ├─ subscribe(duel-code:X) ──>│
//!   │<─ {"type":"snapshot"} ────┤                            │
//!   │                           │<── round-start ────────────┤
//!   │<─ {"type":"round-start"} ─┤                            │
//!   ├─ {"type":"resync"} ──────>│                            │
//!   │<─ {"type":"snapshot"} ────┤                            │
//!   ├─ {"type":"ping"} ────────>│                            │
//!   │<─ {"type":"pong"} ────────┤                            │
//! ```
//!
//! Events are forwarded exactly as published (`round-start`, `round-resolve`,
//! `answer`). Delivery is at-most-once: when the connection falls behind, the
//! missed events are dropped and a fresh snapshot frame is sent instead.

use crate::error::AppError;
use crate::handlers::duel::join_code;
use crate::state::AppState;
use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use duel_arena_core::{EventBusError, EventStream, JoinCode};
use duel_arena_runtime::{Arena, Snapshot};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Frames the server sends besides forwarded events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerFrame {
    /// Full state, on connect, on request and after lagging
    Snapshot {
        /// The current snapshot
        snapshot: Box<Snapshot>,
    },
    /// Reply to a client ping
    Pong,
    /// A client frame could not be handled
    Error {
        /// Error description
        message: String,
    },
}

/// Frames a client may send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientFrame {
    /// Keep-alive
    Ping,
    /// Ask for a fresh snapshot
    Resync,
}

/// `GET /ws/duels/:code`
///
/// The session is looked up and subscribed before the upgrade, so an unknown
/// code is a plain 404.
///
/// # Errors
///
/// 404 for an unknown code, 500 if the subscription fails.
pub async fn connect(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Response, AppError> {
    let code = join_code(&code)?;
    let events = state.arena.subscribe(&code).await?;
    info!(%code, "Live connection requested");
    Ok(ws.on_upgrade(move |socket| run(socket, state.arena, code, events)))
}

async fn run(mut socket: WebSocket, arena: Arena, code: JoinCode, mut events: EventStream) {
    if send_snapshot(&mut socket, &arena, &code).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(message)) = incoming else { break };
                match message {
                    Message::Text(text) => {
                        let reply = match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::Ping) => send_frame(&mut socket, &ServerFrame::Pong).await,
                            Ok(ClientFrame::Resync) => send_snapshot(&mut socket, &arena, &code).await,
                            Err(e) => {
                                debug!(error = %e, "Unrecognized client frame");
                                let frame = ServerFrame::Error { message: format!("unrecognized frame: {e}") };
                                send_frame(&mut socket, &frame).await
                            }
                        };
                        if reply.is_err() {
                            break;
                        }
                    }
                    Message::Close(_) => break,
                    // Protocol pings are answered by axum
                    Message::Binary(_) | Message::Ping(_) | Message::Pong(_) => {}
                }
            }
            event = events.next() => {
                let sent = match event {
                    Some(Ok(event)) => match serde_json::to_string(&event) {
                        Ok(json) => socket.send(Message::Text(json)).await,
                        Err(e) => {
                            warn!(error = %e, "Failed to serialize event");
                            Ok(())
                        }
                    },
                    Some(Err(EventBusError::Lagged { skipped, .. })) => {
                        warn!(%code, skipped, "Live connection lagged, resyncing");
                        send_snapshot(&mut socket, &arena, &code).await
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, "Event stream failed");
                        break;
                    }
                    None => break,
                };
                if sent.is_err() {
                    break;
                }
            }
        }
    }

    info!(%code, "Live connection closed");
}

async fn send_snapshot(socket: &mut WebSocket, arena: &Arena, code: &JoinCode) -> Result<(), axum::Error> {
    let frame = match arena.snapshot(code).await {
        Ok(snapshot) => ServerFrame::Snapshot {
            snapshot: Box::new(snapshot),
        },
        Err(e) => ServerFrame::Error {
            message: e.to_string(),
        },
    };
    send_frame(socket, &frame).await
}

async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) -> Result<(), axum::Error> {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json)).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize frame");
            Ok(())
        }
    }
}
