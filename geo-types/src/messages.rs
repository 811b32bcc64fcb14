use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::RoomSnapshot;

/// Inbound client intents. Wire format is `{"t": "...", ...}` JSON text.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Guess {
        lat: f64,
        lng: f64,
    },
    StartGame,
    Reroll {
        /// True when the host client rerolls automatically after a
        /// resolver miss; automatic rerolls are bounded per round.
        #[serde(default)]
        auto: bool,
    },
    SetSettings {
        region: String,
        country: String,
    },
    PanoReady {
        #[serde(rename = "trueLat")]
        true_lat: f64,
        #[serde(rename = "trueLng")]
        true_lng: f64,
        /// Seed generation this confirmation belongs to. Optional so the
        /// original client protocol stays valid; absent means "current".
        #[serde(default)]
        generation: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TimerPhase {
    Guess,
    Reveal,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    Info,
    Ok,
    Error,
}

/// Outbound events fanned out to every connection attached to a room.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    State {
        state: RoomSnapshot,
    },
    Timer {
        phase: TimerPhase,
        ms_left: i64,
    },
    Countdown {
        ends_at_ms: i64,
    },
    RoundEnd {
        winners: Vec<String>,
        no_guess: Vec<String>,
        best_distance_km: Option<f64>,
    },
    Toast {
        kind: ToastKind,
        text: String,
    },
}
