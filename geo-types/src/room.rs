use serde::{Deserialize, Serialize};
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Lobby,
    Countdown,
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RoundStatus {
    /// Seed sampled, waiting for the panorama resolver to confirm a true location.
    Pending,
    /// True location confirmed, guessing deadline running.
    Running,
    /// Results computed and disclosed.
    Reveal,
    /// Reveal window elapsed.
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlayerSnapshot {
    pub user_id: String,
    pub name: String,
    pub total_score: u32,
    pub has_guessed: bool,
    pub last_distance_km: Option<f64>,
    pub last_score: Option<u32>,
    pub is_host: bool,
    pub connected: bool,
    pub verified: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct GuessSnapshot {
    pub user_id: String,
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub distance_km: Option<f64>,
    pub score: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoundSnapshot {
    pub number: u32,
    pub seed_lat: f64,
    pub seed_lng: f64,
    /// Monotonically increasing per-seed counter; echo it back in `pano_ready`.
    pub generation: u64,
    pub status: RoundStatus,
    pub started_at_ms: Option<i64>,
    pub deadline_at_ms: Option<i64>,
    pub reveal_ends_at_ms: Option<i64>,
    #[serde(rename = "true")]
    pub true_location: Option<LatLng>,
}

/// An id/name pair for the region and country pickers.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
}

/// Full room state pushed to every connection on any mutation.
///
/// Players are sorted by total score descending; ties keep join order so
/// the leaderboard is deterministic.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RoomSnapshot {
    pub code: String,
    pub host_user_id: String,
    pub status: RoomStatus,
    pub countdown_ends_at_ms: i64,
    pub round_number: u32,
    pub rounds_total: u32,
    pub round_seconds: u32,
    pub reveal_seconds: u32,
    pub region: String,
    pub country: String,
    pub regions: Vec<CatalogEntry>,
    pub countries: Vec<CatalogEntry>,
    pub current_round: Option<RoundSnapshot>,
    pub players: Vec<PlayerSnapshot>,
    pub guesses: Vec<GuessSnapshot>,
}
