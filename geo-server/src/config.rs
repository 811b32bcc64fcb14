use std::env;

use geo_core::RoomSettings;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub rounds_total: u32,
    pub round_seconds: u32,
    pub reveal_seconds: u32,
    pub countdown_seconds: u32,
    pub max_players: usize,
    pub room_idle_seconds: u64,
    pub connection_timeout_seconds: u64,
    /// Base prepended to join URLs handed out by the create-room endpoint.
    pub public_url: String,
    /// HMAC secret for join signatures. Unset means joins are never verified.
    pub signing_secret: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("Invalid PORT"),
            rounds_total: env::var("ROUNDS_TOTAL")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("Invalid ROUNDS_TOTAL"),
            round_seconds: env::var("ROUND_SECONDS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .expect("Invalid ROUND_SECONDS"),
            reveal_seconds: env::var("REVEAL_SECONDS")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .expect("Invalid REVEAL_SECONDS"),
            countdown_seconds: env::var("COUNTDOWN_SECONDS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .expect("Invalid COUNTDOWN_SECONDS"),
            max_players: env::var("MAX_PLAYERS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("Invalid MAX_PLAYERS"),
            room_idle_seconds: env::var("ROOM_IDLE_SECONDS")
                .unwrap_or_else(|_| "600".to_string())
                .parse()
                .expect("Invalid ROOM_IDLE_SECONDS"),
            // Must exceed the longest possible quiet stretch: a maximal
            // round (600 s) plus reveal (40 s) with no frames sent.
            connection_timeout_seconds: env::var("CONNECTION_TIMEOUT_SECONDS")
                .unwrap_or_else(|_| "900".to_string())
                .parse()
                .expect("Invalid CONNECTION_TIMEOUT_SECONDS"),
            public_url: env::var("PUBLIC_URL").unwrap_or_default(),
            signing_secret: env::var("SIGNING_SECRET").ok().filter(|s| !s.is_empty()),
        }
    }

    /// Room defaults derived from the environment; per-room overrides are
    /// clamped against these at creation time.
    pub fn room_defaults(&self) -> RoomSettings {
        RoomSettings {
            rounds_total: self.rounds_total.clamp(1, 20),
            round_seconds: self.round_seconds.clamp(15, 600),
            reveal_seconds: self.reveal_seconds.clamp(5, 40),
            countdown_seconds: self.countdown_seconds,
            max_players: self.max_players,
            ..RoomSettings::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
