use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{error, info, warn};
use warp::ws::{Message, WebSocket};

use crate::hub::RoomHub;
use crate::signing::JoinSigner;
use geo_types::{ClientMessage, ServerMessage, ToastKind};

pub mod connection;
pub mod handlers;
pub mod rate_limiter;

use connection::ConnectionId;
pub use connection::ConnectionManager;
use handlers::MessageHandler;
use rate_limiter::RateLimiter;

/// Join parameters carried in the upgrade URL:
/// `/ws?room=CODE&user=ID&sig=...&name=...`.
#[derive(Debug, Deserialize)]
pub struct JoinParams {
    pub room: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub sig: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub async fn handle_connection(
    websocket: WebSocket,
    params: JoinParams,
    hub: Arc<RoomHub>,
    connection_manager: Arc<ConnectionManager>,
    signer: Arc<JoinSigner>,
) {
    let (mut ws_sender, mut ws_receiver) = websocket.split();

    let code = params.room.trim().to_uppercase();
    let user_id = params.user.trim().to_string();

    // Refused before any player record exists
    let Some(room_handle) = hub.get(&code) else {
        info!(room = %code, "join refused: room not found");
        let _ = send_refusal(&mut ws_sender, "Room not found").await;
        return;
    };
    if user_id.is_empty() {
        let _ = send_refusal(&mut ws_sender, "Missing user id").await;
        return;
    }

    let verified = params
        .sig
        .as_deref()
        .is_some_and(|sig| signer.verify(&code, &user_id, sig));

    let connection_id = ConnectionId::new();
    info!(room = %code, user = %user_id, verified, "new connection {connection_id}");

    let message_receiver = connection_manager.create_connection(connection_id).await;
    connection_manager
        .attach(connection_id, &code, &user_id)
        .await;

    let message_handler = MessageHandler::new(
        connection_id,
        user_id.clone(),
        connection_manager.clone(),
        room_handle,
    );

    // Registers the player and pushes the fresh snapshot into this
    // connection's queue before the pumps start.
    if let Err(err) = message_handler
        .handle_join(params.name.as_deref().unwrap_or(""), verified)
        .await
    {
        warn!(room = %code, user = %user_id, "join refused: {err}");
        let _ = send_refusal(&mut ws_sender, &err.to_string()).await;
        connection_manager.remove_connection(connection_id).await;
        return;
    }

    let incoming = {
        let message_handler = message_handler.clone();
        let connection_manager = connection_manager.clone();
        let mut rate_limiter = RateLimiter::new();

        async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(msg) => {
                        // Every inbound frame counts as liveness, pings and
                        // pongs included, so a player who joins and only
                        // watches is never reaped by the inactivity sweep.
                        connection_manager.update_activity(connection_id).await;
                        handle_frame(msg, &mut rate_limiter, &message_handler, connection_id).await;
                    }
                    Err(e) => {
                        warn!("WebSocket error for {connection_id}: {e}");
                        break;
                    }
                }
            }
        }
    };

    let outgoing = async move {
        let mut receiver = message_receiver;

        while let Some(message) = receiver.recv().await {
            let json = match serde_json::to_string(&message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message: {e:?}");
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(Message::text(json)).await {
                warn!("Failed to send message to {connection_id}: {e:?}");
                break;
            }
        }
    };

    tokio::select! {
        _ = incoming => {},
        _ = outgoing => {},
    }

    info!("Connection {connection_id} disconnected");
    message_handler.handle_disconnect().await;
    connection_manager.remove_connection(connection_id).await;
}

async fn handle_frame(
    msg: Message,
    rate_limiter: &mut RateLimiter,
    message_handler: &MessageHandler,
    connection_id: ConnectionId,
) {
    if !msg.is_text() {
        return;
    }
    if !rate_limiter.allow() {
        warn!("Rate limit exceeded for connection {connection_id}");
        return;
    }

    let Ok(text) = msg.to_str() else {
        return;
    };

    match serde_json::from_str::<ClientMessage>(text) {
        Ok(client_message) => message_handler.handle_message(client_message).await,
        Err(e) => message_handler.handle_malformed(&e.to_string()).await,
    }
}

async fn send_refusal(
    ws_sender: &mut (impl SinkExt<Message> + Unpin),
    text: &str,
) -> Result<(), ()> {
    let toast = ServerMessage::Toast {
        kind: ToastKind::Error,
        text: text.to_string(),
    };
    let json = serde_json::to_string(&toast).map_err(|_| ())?;
    ws_sender.send(Message::text(json)).await.map_err(|_| ())
}
