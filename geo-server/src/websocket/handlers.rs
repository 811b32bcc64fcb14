use std::sync::Arc;

use tracing::{info, warn};

use crate::hub::{RoomHandle, now_ms, render_events};
use crate::websocket::connection::{ConnectionId, ConnectionManager};
use geo_types::{ClientMessage, RoomError, ServerMessage, ToastKind};

/// Per-connection command dispatcher. Every intent locks the room, runs
/// the command, and either broadcasts the resulting events to the room or
/// toasts the rejection back to this connection alone.
#[derive(Clone)]
pub struct MessageHandler {
    connection_id: ConnectionId,
    room_code: String,
    user_id: String,
    connections: Arc<ConnectionManager>,
    room: Arc<RoomHandle>,
}

impl MessageHandler {
    pub fn new(
        connection_id: ConnectionId,
        user_id: String,
        connections: Arc<ConnectionManager>,
        room: Arc<RoomHandle>,
    ) -> Self {
        Self {
            connection_id,
            room_code: room.code.clone(),
            user_id,
            connections,
            room,
        }
    }

    /// Register (or reattach) the player. A full room refuses the join
    /// before any player record is created.
    pub async fn handle_join(&self, name: &str, verified: bool) -> Result<(), RoomError> {
        let messages = {
            let mut room = self.room.room.lock().await;
            let events = room.join(&self.user_id, name, verified)?;
            render_events(&room, events)
        };
        self.connections
            .broadcast_to_room(&self.room_code, messages)
            .await;
        Ok(())
    }

    pub async fn handle_message(&self, message: ClientMessage) {
        let outcome = match message {
            ClientMessage::Guess { lat, lng } => {
                let mut room = self.room.room.lock().await;
                room.submit_guess(&self.user_id, lat, lng, now_ms())
                    .map(|events| render_events(&room, events))
            }
            ClientMessage::StartGame => {
                let mut room = self.room.room.lock().await;
                room.start_game(&self.user_id, now_ms())
                    .map(|events| render_events(&room, events))
            }
            ClientMessage::Reroll { auto } => {
                let mut room = self.room.room.lock().await;
                room.reroll(&self.user_id, auto, &mut rand::thread_rng())
                    .map(|events| render_events(&room, events))
            }
            ClientMessage::SetSettings { region, country } => {
                let mut room = self.room.room.lock().await;
                room.set_settings(&self.user_id, &region, &country)
                    .map(|events| render_events(&room, events))
            }
            ClientMessage::PanoReady {
                true_lat,
                true_lng,
                generation,
            } => {
                let mut room = self.room.room.lock().await;
                room.pano_ready(&self.user_id, true_lat, true_lng, generation, now_ms())
                    .map(|events| render_events(&room, events))
            }
        };

        match outcome {
            Ok(messages) => {
                self.connections
                    .broadcast_to_room(&self.room_code, messages)
                    .await;
            }
            Err(err) => {
                warn!(
                    room = %self.room_code,
                    user = %self.user_id,
                    "rejected command: {err}"
                );
                self.toast_error(err.to_string()).await;
            }
        }
    }

    /// Malformed payloads are dropped with a toast; the connection stays
    /// open.
    pub async fn handle_malformed(&self, detail: &str) {
        warn!(room = %self.room_code, user = %self.user_id, "malformed message: {detail}");
        self.toast_error("Malformed message".to_string()).await;
    }

    pub async fn handle_disconnect(&self) {
        info!(
            room = %self.room_code,
            user = %self.user_id,
            "handling disconnect for connection {}",
            self.connection_id
        );
        let messages = {
            let mut room = self.room.room.lock().await;
            let events = room.mark_disconnected(&self.user_id);
            render_events(&room, events)
        };
        self.connections
            .broadcast_to_room(&self.room_code, messages)
            .await;
    }

    async fn toast_error(&self, text: String) {
        let _ = self
            .connections
            .send_to_connection(
                self.connection_id,
                ServerMessage::Toast {
                    kind: ToastKind::Error,
                    text,
                },
            )
            .await;
    }
}
