use geo_types::{TimerPhase, ToastKind};

/// Events emitted by room command handlers and the room ticker.
///
/// Everything here is broadcast to every connection attached to the room;
/// per-client rejections travel back as `RoomError` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    /// Room state mutated; the gateway should push a fresh snapshot.
    StateChanged,
    /// Pre-game countdown started. The end timestamp is computed once so
    /// every client renders the same deadline.
    Countdown { ends_at_ms: i64 },
    /// Periodic phase timer, sent on the tick cadence.
    Timer { phase: TimerPhase, ms_left: i64 },
    /// Round finalized; emitted exactly once per round.
    RoundEnd {
        winners: Vec<String>,
        no_guess: Vec<String>,
        best_distance_km: Option<f64>,
    },
    Toast { kind: ToastKind, text: String },
}
