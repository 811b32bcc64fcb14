use thiserror::Error;

/// Policy violations and protocol errors raised by room command handlers.
///
/// None of these terminate a room or a connection; the gateway turns them
/// into an error toast for the offending client and leaves state untouched.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoomError {
    #[error("only the host can do that")]
    NotHost,
    #[error("only available in the lobby")]
    NotInLobby,
    #[error("room is full")]
    RoomFull,
    #[error("you are not in this room")]
    PlayerNotFound,
    #[error("guessing is closed right now")]
    GuessNotOpen,
    #[error("the location is already locked in")]
    RerollNotAllowed,
    #[error("could not find a location here, change the region settings")]
    RerollExhausted,
    #[error("coordinates out of range")]
    InvalidCoordinate,
}
