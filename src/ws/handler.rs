//! WebSocket upgrade handler

use std::time::Duration;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaHandle, GameCommand};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, PlayerId, ServerMsg};

/// Outbound queue depth per connection; a client this far behind is dropped
pub const OUTBOUND_QUEUE: usize = 256;

/// WebSocket upgrade handler. Anything that is not a well-formed upgrade
/// request gets a plain 400.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Ok(ws) => ws.on_upgrade(move |socket| handle_socket(socket, state)),
        Err(rejection) => {
            warn!(error = %rejection, "Rejected malformed WebSocket upgrade");
            (StatusCode::BAD_REQUEST, rejection.body_text()).into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);

    let arena = state.arena.clone();
    if arena
        .send(GameCommand::Connect {
            player_id,
            outbound: outbound_tx,
        })
        .await
        .is_err()
    {
        error!(player_id = %player_id, "Arena unavailable, closing connection");
        return;
    }

    let mut limiter = ConnectionRateLimiter::new(state.config.input_rate_limit);
    run_session(
        player_id,
        ws_sink,
        ws_stream,
        outbound_rx,
        &arena,
        &mut limiter,
        state.config.idle_timeout,
    )
    .await;

    if limiter.dropped() > 0 {
        info!(player_id = %player_id, dropped = limiter.dropped(), "Session had rate-limited messages");
    }

    // Cleanup on disconnect
    let _ = arena.send(GameCommand::Disconnect { player_id }).await;

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: PlayerId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbound_rx: mpsc::Receiver<ServerMsg>,
    arena: &ArenaHandle,
    limiter: &mut ConnectionRateLimiter,
    idle_timeout: Duration,
) {
    // Writer task: arena -> WebSocket. Ends when the arena drops our queue.
    let mut writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                return;
            }
        }
        let _ = ws_sink.send(Message::Close(None)).await;
    });

    // Reader loop: WebSocket -> arena
    loop {
        let frame = tokio::select! {
            _ = &mut writer_handle => {
                debug!(player_id = %player_id, "Outbound queue closed by server");
                break;
            }
            frame = tokio::time::timeout(idle_timeout, ws_stream.next()) => frame,
        };

        let result = match frame {
            Ok(Some(result)) => result,
            Ok(None) => break,
            Err(_) => {
                info!(player_id = %player_id, idle_secs = idle_timeout.as_secs(), "Closing idle connection");
                break;
            }
        };

        let command = match result {
            Ok(Message::Text(text)) => {
                if !limiter.admit() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    GameCommand::Activity { player_id }
                } else {
                    match ClientMsg::decode(&text) {
                        Ok(msg) => GameCommand::Message { player_id, msg },
                        Err(e) => {
                            warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                            GameCommand::Activity { player_id }
                        }
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
                GameCommand::Activity { player_id }
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => GameCommand::Activity { player_id },
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                warn!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        };

        if arena.send(command).await.is_err() {
            debug!(player_id = %player_id, "Arena channel closed");
            break;
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
