//! Voice WebSocket: `GET /ws?token=...`.
//!
//! The client sends one JSON handshake frame, then binary PCM. Audio goes
//! through the packetizer to the transcriber; transcriber events come back
//! on a channel and drive the turn dispatcher from this connection's loop.

use crate::responder::Responder;
use crate::AppState;
use axum::{
    extract::{
        ws::{CloseFrame, Message as AxumMessage, WebSocket, WebSocketUpgrade},
        ConnectInfo, Query,
    },
    response::{IntoResponse, Response},
    Extension,
};
use futures_util::{SinkExt, StreamExt};
use parley_agent::{OrchestratorError, Session};
use parley_types::{Handshake, Identity};
use parley_voice::{run_ingest, ConnectorEvent, RawTurn, StreamParams, TurnDecision};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Spoken when a turn exceeds its time budget.
pub const TIMEOUT_TEXT: &str = "Hmm, I didn't get that fast enough. Mind trying again?";

const CLOSE_INVALID_HANDSHAKE: u16 = 1002;
const CLOSE_TRANSCRIBER_FAILED: u16 = 1011;

/// Outbound events buffered per connection before the writer falls behind.
const OUTBOUND_CAPACITY: usize = 256;
const AUDIO_CAPACITY: usize = 64;
const CONNECTOR_EVENT_CAPACITY: usize = 64;

#[derive(Debug, Deserialize)]
pub struct WsConnectParams {
    pub token: Option<String>,
}

/// Resolves the token before upgrading; failures never reach the socket.
pub async fn ws_handler(
    Extension(state): Extension<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
    Query(params): Query<WsConnectParams>,
) -> Response {
    match state.auth.resolve(params.token.as_deref()).await {
        Ok(identity) => {
            tracing::info!(
                user_id = identity.user_id,
                remote_addr = %addr,
                "websocket auth success"
            );
            ws.on_upgrade(move |socket| handle_socket(socket, state, identity, addr))
        }
        Err(e) => {
            tracing::warn!(remote_addr = %addr, error = %e, "websocket auth failed");
            e.status().into_response()
        }
    }
}

/// Reads frames until the handshake arrives. Anything other than a valid
/// JSON handshake text frame is rejected.
async fn read_handshake(socket: &mut WebSocket) -> Option<Handshake> {
    while let Some(Ok(msg)) = socket.recv().await {
        match msg {
            AxumMessage::Text(text) => {
                return match serde_json::from_str(text.as_str()) {
                    Ok(handshake) => Some(handshake),
                    Err(e) => {
                        tracing::warn!(error = %e, "invalid handshake");
                        None
                    }
                };
            }
            AxumMessage::Ping(_) | AxumMessage::Pong(_) => continue,
            _ => return None,
        }
    }
    None
}

async fn close_with(mut socket: WebSocket, code: u16, reason: &'static str) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    if let Err(e) = socket.send(AxumMessage::Close(Some(frame))).await {
        tracing::debug!(error = %e, "failed to send close frame");
    }
}

async fn handle_socket(
    mut socket: WebSocket,
    state: Arc<AppState>,
    identity: Identity,
    addr: SocketAddr,
) {
    let Some(handshake) = read_handshake(&mut socket).await else {
        close_with(socket, CLOSE_INVALID_HANDSHAKE, "Invalid initial data").await;
        return;
    };

    let user_info = match state.store.user_info(identity.user_id).await {
        Ok(info) => info,
        Err(e) => {
            tracing::warn!(user_id = identity.user_id, error = %e, "failed to load user info");
            String::new()
        }
    };
    let session = state
        .sessions
        .insert(Session::new(identity, addr.ip().to_string(), handshake, user_info))
        .await;
    let session_id = session.id;

    let (event_tx, mut event_rx) = mpsc::channel::<ConnectorEvent>(CONNECTOR_EVENT_CAPACITY);
    let params = StreamParams {
        session_id,
        sample_rate: state.asr.sample_rate,
    };
    let connector = match state.transcriber.connect(&params, event_tx).await {
        Ok(connector) => connector,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "transcriber setup failed");
            state.sessions.remove(session_id).await;
            close_with(socket, CLOSE_TRANSCRIBER_FAILED, "Transcriber setup failed").await;
            return;
        }
    };
    tracing::info!(session_id = %session_id, remote_addr = %addr, "voice session started");

    let (audio_tx, audio_rx) = mpsc::channel::<Vec<u8>>(AUDIO_CAPACITY);
    tokio::spawn(run_ingest(state.asr.packetizer(), audio_rx, connector));

    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sender.send(AxumMessage::Text(msg.into())).await.is_err() {
                break;
            }
        }
    });

    let responder = Responder::new(tx);
    let mut turn_task: Option<JoinHandle<()>> = None;
    let mut transcriber_open = true;

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(AxumMessage::Binary(bytes))) => {
                    if audio_tx.send(bytes.to_vec()).await.is_err() {
                        tracing::debug!(session_id = %session_id, "audio ingest stopped, dropping frame");
                    }
                }
                Some(Ok(AxumMessage::Text(_))) => {
                    tracing::debug!(session_id = %session_id, "ignoring text frame after handshake");
                }
                Some(Ok(AxumMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(session_id = %session_id, error = %e, "websocket read failed");
                    break;
                }
            },
            event = event_rx.recv(), if transcriber_open => match event {
                Some(ConnectorEvent::Turn(raw)) => {
                    if let Some(task) = on_turn(&state, &session, &responder, raw).await {
                        // A new turn only starts once the previous one has
                        // released its permit, so this handle is already done.
                        if let Some(previous) = turn_task.replace(task) {
                            previous.abort();
                        }
                    }
                }
                Some(ConnectorEvent::Opened { stream_id }) => {
                    tracing::info!(session_id = %session_id, ?stream_id, "transcriber stream opened");
                }
                Some(ConnectorEvent::Error(message)) => {
                    tracing::warn!(session_id = %session_id, %message, "transcriber error");
                }
                Some(ConnectorEvent::Closed) | None => {
                    tracing::info!(session_id = %session_id, "transcriber stream closed");
                    transcriber_open = false;
                }
            },
        }
    }

    if let Some(task) = turn_task {
        task.abort();
    }
    // Closing the audio channel lets ingest flush its tail and disconnect.
    drop(audio_tx);
    send_task.abort();
    if state.sessions.remove(session_id).await {
        tracing::info!(session_id = %session_id, "voice session ended");
    }
}

/// Feeds one recognizer result through the dispatcher. Returns the spawned
/// turn when the result starts one.
async fn on_turn(
    state: &Arc<AppState>,
    session: &Arc<Session>,
    responder: &Responder,
    raw: RawTurn,
) -> Option<JoinHandle<()>> {
    let decision = {
        let mut session_state = session.state().await;
        state
            .dispatcher
            .dispatch(&mut session_state.turn, &session.gate, raw.into_event())
    };

    match decision {
        TurnDecision::Caption(text) => responder.caption(text).await,
        TurnDecision::TooShort => responder.end("").await,
        TurnDecision::Duplicate => {
            tracing::debug!(session_id = %session.id, "skipping duplicate final");
        }
        TurnDecision::Busy => {
            tracing::debug!(session_id = %session.id, "turn in progress, dropping final");
        }
        TurnDecision::Ignored => {}
        TurnDecision::Run { transcript, permit } => {
            let orchestrator = Arc::clone(&state.orchestrator);
            let session = Arc::clone(session);
            let responder = responder.clone();
            return Some(tokio::spawn(async move {
                responder.start().await;
                match orchestrator.run_turn(&session, &transcript).await {
                    Ok(outcome) => responder.finish(&outcome).await,
                    Err(OrchestratorError::Timeout(_)) => responder.error(TIMEOUT_TEXT).await,
                }
                // The terminal event is queued first; the next turn's `start`
                // can only follow it on the outbound channel.
                drop(permit);
            }));
        }
    }
    None
}
