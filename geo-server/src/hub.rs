use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

use crate::websocket::ConnectionManager;
use geo_core::{Room, RoomEvent, RoomSettings};
use geo_types::{RoomStatus, ServerMessage};

/// Room-code alphabet, with easily-confused characters (0/O, 1/I/L)
/// removed.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 6;

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Turn room events into wire messages. The snapshot is taken while the
/// caller still holds the room lock, so broadcasts never observe a
/// half-applied mutation.
pub fn render_events(room: &Room, events: Vec<RoomEvent>) -> Vec<ServerMessage> {
    events
        .into_iter()
        .map(|event| match event {
            RoomEvent::StateChanged => ServerMessage::State {
                state: room.snapshot(),
            },
            RoomEvent::Countdown { ends_at_ms } => ServerMessage::Countdown { ends_at_ms },
            RoomEvent::Timer { phase, ms_left } => ServerMessage::Timer { phase, ms_left },
            RoomEvent::RoundEnd {
                winners,
                no_guess,
                best_distance_km,
            } => ServerMessage::RoundEnd {
                winners,
                no_guess,
                best_distance_km,
            },
            RoomEvent::Toast { kind, text } => ServerMessage::Toast { kind, text },
        })
        .collect()
}

/// Concurrency unit for one room: all mutation happens under the mutex,
/// so a deadline tick can never race a last-moment guess.
pub struct RoomHandle {
    pub code: String,
    pub room: Mutex<Room>,
    ticker: std::sync::Mutex<Option<JoinHandle<()>>>,
    /// Epoch-ms of the sweep that first saw this room with zero attached
    /// connections; 0 while connections are attached.
    idle_since_ms: AtomicI64,
}

impl RoomHandle {
    fn new(room: Room) -> Self {
        Self {
            code: room.code.clone(),
            room: Mutex::new(room),
            ticker: std::sync::Mutex::new(None),
            idle_since_ms: AtomicI64::new(0),
        }
    }

    fn set_ticker(&self, handle: JoinHandle<()>) {
        if let Ok(mut ticker) = self.ticker.lock() {
            *ticker = Some(handle);
        }
    }

    fn abort_ticker(&self) {
        if let Ok(mut ticker) = self.ticker.lock() {
            if let Some(handle) = ticker.take() {
                handle.abort();
            }
        }
    }
}

/// Process-wide registry of live rooms, keyed by 6-character code.
pub struct RoomHub {
    rooms: DashMap<String, Arc<RoomHandle>>,
    defaults: RoomSettings,
    public_url: String,
    connections: Arc<ConnectionManager>,
}

impl RoomHub {
    pub fn new(
        defaults: RoomSettings,
        public_url: String,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            rooms: DashMap::new(),
            defaults,
            public_url,
            connections,
        }
    }

    pub fn defaults(&self) -> &RoomSettings {
        &self.defaults
    }

    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    pub fn get(&self, code: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Allocate a code, register the room, and start its ticker.
    pub fn create_room(
        &self,
        host_user_id: &str,
        host_name: &str,
        settings: RoomSettings,
    ) -> Arc<RoomHandle> {
        let mut rng = rand::thread_rng();
        loop {
            let code = generate_code(&mut rng);
            let entry = self.rooms.entry(code.clone());
            if let dashmap::mapref::entry::Entry::Vacant(vacant) = entry {
                let room = Room::new(
                    code.clone(),
                    host_user_id.to_string(),
                    host_name.to_string(),
                    settings,
                    now_ms(),
                );
                let handle = Arc::new(RoomHandle::new(room));
                handle.set_ticker(spawn_ticker(handle.clone(), self.connections.clone()));
                vacant.insert(handle.clone());
                info!(code = %code, host = %host_user_id, "room created");
                return handle;
            }
            // Collision with a live room; roll a new code.
        }
    }

    /// Drop rooms that have had no attached connections for the idle
    /// period, and finished rooms once everyone has left. Meant to run on
    /// a periodic sweep.
    pub async fn sweep_idle(&self, idle: Duration) {
        let now = now_ms();
        let idle_ms = idle.as_millis() as i64;
        let handles: Vec<Arc<RoomHandle>> = self
            .rooms
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut to_remove = Vec::new();
        for handle in handles {
            let attached = self.connections.connections_in_room(&handle.code).await;
            if attached > 0 {
                handle.idle_since_ms.store(0, Ordering::Relaxed);
                continue;
            }
            let since = handle.idle_since_ms.load(Ordering::Relaxed);
            if since == 0 {
                handle.idle_since_ms.store(now, Ordering::Relaxed);
                continue;
            }
            let finished = { handle.room.lock().await.status == RoomStatus::Finished };
            if finished || now - since >= idle_ms {
                to_remove.push(handle.code.clone());
            }
        }

        for code in to_remove {
            if let Some((_, handle)) = self.rooms.remove(&code) {
                info!(code = %code, "removing idle room");
                handle.abort_ticker();
            }
        }
    }
}

/// Per-room 1 s timer loop: lock, tick, fan out whatever the room emitted.
fn spawn_ticker(handle: Arc<RoomHandle>, connections: Arc<ConnectionManager>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let messages = {
                let mut room = handle.room.lock().await;
                let events = room.tick(now_ms(), &mut rand::thread_rng());
                if events.is_empty() {
                    continue;
                }
                render_events(&room, events)
            };
            connections.broadcast_to_room(&handle.code, messages).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn hub() -> RoomHub {
        RoomHub::new(
            RoomSettings::default(),
            String::new(),
            Arc::new(ConnectionManager::new()),
        )
    }

    #[test]
    fn test_generated_codes_use_the_restricted_alphabet() {
        let mut rng = SmallRng::seed_from_u64(1);
        for _ in 0..100 {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 6);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains('0') && !code.contains('O'));
            assert!(!code.contains('1') && !code.contains('I'));
        }
    }

    #[tokio::test]
    async fn test_create_room_registers_host_and_is_retrievable() {
        let hub = hub();
        let handle = hub.create_room("host", "Alice", RoomSettings::default());

        let fetched = hub.get(&handle.code).expect("room should be registered");
        let room = fetched.room.lock().await;
        assert_eq!(room.host_user_id, "host");
        assert_eq!(room.status, RoomStatus::Lobby);
        assert_eq!(room.players().len(), 1);
        assert!(hub.get("NOPE99").is_none());
    }

    #[tokio::test]
    async fn test_created_codes_are_unique() {
        let hub = hub();
        let mut codes = std::collections::HashSet::new();
        for _ in 0..50 {
            let handle = hub.create_room("host", "Alice", RoomSettings::default());
            assert!(codes.insert(handle.code.clone()));
        }
        assert_eq!(hub.room_count(), 50);
    }

    #[tokio::test]
    async fn test_sweep_removes_room_with_no_connections_after_idle_period() {
        let hub = hub();
        let handle = hub.create_room("host", "Alice", RoomSettings::default());
        let code = handle.code.clone();

        // First sweep only stamps the idle start
        hub.sweep_idle(Duration::from_millis(0)).await;
        assert!(hub.get(&code).is_some());

        // Second sweep sees the elapsed idle period and removes
        hub.sweep_idle(Duration::from_millis(0)).await;
        assert!(hub.get(&code).is_none());
    }

    #[tokio::test]
    async fn test_sweep_keeps_room_with_attached_connections() {
        let connections = Arc::new(ConnectionManager::new());
        let hub = RoomHub::new(RoomSettings::default(), String::new(), connections.clone());
        let handle = hub.create_room("host", "Alice", RoomSettings::default());

        let conn_id = crate::websocket::connection::ConnectionId::new();
        let _rx = connections.create_connection(conn_id).await;
        connections.attach(conn_id, &handle.code, "host").await;

        hub.sweep_idle(Duration::from_millis(0)).await;
        hub.sweep_idle(Duration::from_millis(0)).await;
        assert!(hub.get(&handle.code).is_some());
    }

    #[tokio::test]
    async fn test_render_events_maps_state_changed_to_snapshot() {
        let hub = hub();
        let handle = hub.create_room("host", "Alice", RoomSettings::default());
        let room = handle.room.lock().await;

        let messages = render_events(&room, vec![RoomEvent::StateChanged]);
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            ServerMessage::State { state } => assert_eq!(state.code, handle.code),
            other => panic!("expected state message, got {other:?}"),
        }
    }
}
