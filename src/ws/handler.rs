//! WebSocket upgrade handler - one session per observer

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::r#match::MatchHandle;
use crate::game::PlayerId;
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Requested display name; empty gets an authority-assigned default
    #[serde(default)]
    pub name: String,
    /// Requested character loadout
    #[serde(default)]
    pub loadout: u8,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, query: WsQuery, state: AppState) {
    // Opaque connection token for this transport session
    let session = Uuid::new_v4();
    let handle = state.match_handle.clone();

    // Subscribe before requesting admission so no notification between the
    // two is lost
    let events_rx = handle.subscribe();

    let (mut ws_sink, ws_stream) = socket.split();

    let admission = match handle.connect(session, query.name, query.loadout).await {
        Ok(admission) => admission,
        Err(e) => {
            info!(%session, error = %e, "connection refused");
            let refusal = ServerMsg::Error {
                code: e.code().to_string(),
                message: e.to_string(),
            };
            let _ = send_msg(&mut ws_sink, &refusal).await;
            let _ = ws_sink.close().await;
            return;
        }
    };

    let player_id = admission.player_id;
    info!(player_id, %session, "session admitted");

    let welcome = ServerMsg::Welcome {
        player_id,
        spawn: admission.spawn,
        server_time: unix_millis(),
        state: admission.state,
        players: admission.players,
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id, error = %e, "failed to send welcome");
        handle.disconnect(player_id).await;
        return;
    }

    run_session(player_id, &handle, ws_sink, ws_stream, events_rx).await;

    // Cleanup on disconnect
    handle.disconnect(player_id).await;
    info!(player_id, "session closed");
}

/// Run the session with read/write split. The single reader loop forwards
/// intents in arrival order, so one observer's requests are never reordered.
async fn run_session(
    player_id: PlayerId,
    handle: &MatchHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut events_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    // Writer task: match notifications -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match events_rx.recv().await {
                Ok(msg) => {
                    if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                        debug!(player_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(player_id, lagged = n, "client lagged, skipping {} events", n);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id, "event channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> authority mailbox
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id, "rate limited intent message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle.intent(player_id, msg).await,
                    Err(e) => {
                        warn!(player_id, error = %e, "failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id, "received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id, "client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
