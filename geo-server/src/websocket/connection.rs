use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use geo_types::ServerMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub room_code: Option<String>,
    pub user_id: Option<String>,
    pub connected_at: Instant,
    pub last_activity: Instant,
    pub sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId) -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let now = Instant::now();

        let connection = Self {
            id,
            room_code: None,
            user_id: None,
            connected_at: now,
            last_activity: now,
            sender,
        };

        (connection, receiver)
    }

    pub fn send_message(&self, message: ServerMessage) -> Result<(), String> {
        self.sender
            .send(message)
            .map_err(|_| "Connection closed".to_string())
    }

    pub fn is_inactive(&self, timeout: Duration) -> bool {
        self.last_activity.elapsed() > timeout
    }
}

/// Registry of live websocket connections. The unbounded per-connection
/// channel keeps room broadcast non-blocking; a slow or dead receiver
/// drops its messages and resyncs from the next full snapshot.
pub struct ConnectionManager {
    connections: RwLock<HashMap<ConnectionId, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_connection(
        &self,
        id: ConnectionId,
    ) -> mpsc::UnboundedReceiver<ServerMessage> {
        let (conn, receiver) = Connection::new(id);

        {
            let mut connections = self.connections.write().await;
            connections.insert(id, conn);
        }

        receiver
    }

    pub async fn remove_connection(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        connections.remove(&id);
    }

    pub async fn get_connection(&self, id: ConnectionId) -> Option<Connection> {
        let connections = self.connections.read().await;
        connections.get(&id).cloned()
    }

    /// Bind a connection to the room and user it joined as.
    pub async fn attach(&self, id: ConnectionId, room_code: &str, user_id: &str) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.room_code = Some(room_code.to_string());
            connection.user_id = Some(user_id.to_string());
        }
    }

    pub async fn update_activity(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&id) {
            connection.last_activity = Instant::now();
        }
    }

    pub async fn send_to_connection(
        &self,
        id: ConnectionId,
        message: ServerMessage,
    ) -> Result<(), String> {
        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(&id) {
            connection.send_message(message)
        } else {
            Err("Connection not found".to_string())
        }
    }

    pub async fn broadcast_to_room(&self, room_code: &str, messages: Vec<ServerMessage>) {
        let connections = self.connections.read().await;
        for message in messages {
            for connection in connections.values() {
                if connection.room_code.as_deref() == Some(room_code) {
                    let _ = connection.send_message(message.clone());
                }
            }
        }
    }

    pub async fn connections_in_room(&self, room_code: &str) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|conn| conn.room_code.as_deref() == Some(room_code))
            .count()
    }

    pub async fn cleanup_inactive_connections(&self, timeout: Duration) {
        let inactive: Vec<ConnectionId> = {
            let connections = self.connections.read().await;
            connections
                .values()
                .filter(|conn| conn.is_inactive(timeout))
                .map(|conn| conn.id)
                .collect()
        };

        for connection_id in inactive {
            tracing::info!("Removing inactive connection: {}", connection_id);
            self.remove_connection(connection_id).await;
        }
    }

    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::ToastKind;

    fn toast(text: &str) -> ServerMessage {
        ServerMessage::Toast {
            kind: ToastKind::Info,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn test_connection_creation_and_removal() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();

        let _receiver = manager.create_connection(conn_id).await;
        assert_eq!(manager.connection_count().await, 1);

        manager.remove_connection(conn_id).await;
        assert_eq!(manager.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_room_scoped_broadcast() {
        let manager = ConnectionManager::new();
        let in_room1 = ConnectionId::new();
        let in_room2 = ConnectionId::new();
        let elsewhere = ConnectionId::new();

        let mut rx1 = manager.create_connection(in_room1).await;
        let mut rx2 = manager.create_connection(in_room2).await;
        let mut rx3 = manager.create_connection(elsewhere).await;

        manager.attach(in_room1, "ABC234", "u1").await;
        manager.attach(in_room2, "ABC234", "u2").await;
        manager.attach(elsewhere, "XYZ789", "u3").await;

        manager
            .broadcast_to_room("ABC234", vec![toast("hello")])
            .await;

        assert!(rx1.try_recv().is_ok());
        assert!(rx2.try_recv().is_ok());
        assert!(rx3.try_recv().is_err());
        assert_eq!(manager.connections_in_room("ABC234").await, 2);
    }

    #[tokio::test]
    async fn test_broadcast_preserves_message_order() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();
        let mut rx = manager.create_connection(conn_id).await;
        manager.attach(conn_id, "ABC234", "u1").await;

        manager
            .broadcast_to_room("ABC234", vec![toast("first"), toast("second")])
            .await;

        let first = rx.try_recv().unwrap();
        let second = rx.try_recv().unwrap();
        assert!(matches!(first, ServerMessage::Toast { text, .. } if text == "first"));
        assert!(matches!(second, ServerMessage::Toast { text, .. } if text == "second"));
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_errors() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();

        let receiver = manager.create_connection(conn_id).await;
        drop(receiver);

        let result = manager.send_to_connection(conn_id, toast("test")).await;
        assert_eq!(result.unwrap_err(), "Connection closed");
    }

    #[tokio::test]
    async fn test_inactive_connection_cleanup() {
        let manager = ConnectionManager::new();
        let conn_id = ConnectionId::new();
        let _receiver = manager.create_connection(conn_id).await;

        let short_timeout = Duration::from_millis(10);
        manager.cleanup_inactive_connections(short_timeout).await;
        assert_eq!(manager.connection_count().await, 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        manager.cleanup_inactive_connections(short_timeout).await;
        assert_eq!(manager.connection_count().await, 0);
    }
}
