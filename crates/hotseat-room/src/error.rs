//! Error types for the room layer.

use hotseat_protocol::{Phase, PlayerId, QuestionId, RoomCode};

/// Errors that can occur during room operations.
///
/// Request-level errors are reported to the requesting connection and leave
/// the room untouched. The room-fatal ones ([`is_room_fatal`]) push the
/// whole room into [`Phase::Error`].
///
/// [`is_room_fatal`]: RoomError::is_room_fatal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    RoomNotFound(RoomCode),

    #[error("player {player} not in room {room}")]
    PlayerNotFound { room: RoomCode, player: PlayerId },

    #[error("asker {player} not in room {room}")]
    AskerNotFound { room: RoomCode, player: PlayerId },

    #[error("host of room {0} not found")]
    HostNotFound(RoomCode),

    #[error("room {0} is full")]
    RoomFull(RoomCode),

    #[error("room {room} is not joinable in phase {phase}")]
    RoomNotJoinable { room: RoomCode, phase: Phase },

    /// The operation is only valid in another phase.
    #[error("expected phase {expected}, room is {actual}")]
    InvalidPhase { expected: Phase, actual: Phase },

    #[error("illegal phase transition {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    /// A host-only action came from a connection that isn't the host's.
    #[error("only the host of room {0} may do that")]
    NotHost(RoomCode),

    /// A request named a player that another connection serves.
    #[error("this connection does not serve player {player} in room {room}")]
    NotPlayerConnection { room: RoomCode, player: PlayerId },

    #[error("need at least {required} players, room has {actual}")]
    NotEnoughPlayers { required: usize, actual: usize },

    #[error("rounds must be at least 1 and at most {max}, got {rounds}")]
    InvalidRounds { rounds: usize, max: usize },

    #[error("player name must not be empty")]
    InvalidName,

    /// `rounds ≤ players − 1` does not hold. Deterministic, never retried.
    #[error("{rounds} rounds need at least {} players, room has {players}", .rounds + 1)]
    AssignmentPrecondition { rounds: usize, players: usize },

    /// The generated assignment failed its post-condition check.
    #[error("target assignment defect: {0}")]
    AssignmentDefect(String),

    #[error("{submitted} of {total} players have submitted")]
    SubmissionsPending { submitted: usize, total: usize },

    #[error("player {0} has no pending question")]
    NoPendingQuestion(PlayerId),

    /// The turn cursor points past the end of the roster.
    #[error("turn cursor {index} is outside the roster of room {room}")]
    TurnOutOfRange { room: RoomCode, index: usize },

    #[error("question {0} not found for the current player")]
    QuestionNotFound(QuestionId),

    /// The engine actor is gone or its queue is closed.
    #[error("game engine is unavailable")]
    Unavailable,
}

impl RoomError {
    /// HTTP-style status code sent in the `error` event.
    pub fn code(&self) -> u16 {
        match self {
            Self::RoomNotFound(_)
            | Self::PlayerNotFound { .. }
            | Self::AskerNotFound { .. }
            | Self::HostNotFound(_)
            | Self::QuestionNotFound(_) => 404,
            Self::NotHost(_) | Self::NotPlayerConnection { .. } => 403,
            Self::RoomFull(_)
            | Self::RoomNotJoinable { .. }
            | Self::InvalidPhase { .. }
            | Self::InvalidTransition { .. }
            | Self::SubmissionsPending { .. } => 409,
            Self::NotEnoughPlayers { .. }
            | Self::InvalidRounds { .. }
            | Self::InvalidName
            | Self::AssignmentPrecondition { .. } => 400,
            Self::AssignmentDefect(_)
            | Self::NoPendingQuestion(_)
            | Self::TurnOutOfRange { .. }
            | Self::Unavailable => 500,
        }
    }

    /// Returns `true` for faults that escalate the whole room to `error`.
    pub fn is_room_fatal(&self) -> bool {
        matches!(
            self,
            Self::AssignmentDefect(_) | Self::NoPendingQuestion(_) | Self::TurnOutOfRange { .. }
        )
    }
}
