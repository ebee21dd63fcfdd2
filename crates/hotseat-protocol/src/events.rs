//! Client and server events, acknowledgements, and the envelope around them.
//!
//! Events are adjacently tagged so a frame reads like
//! `{"event": "join_room", "data": {"roomCode": "K7QX2B", "playerName": "Ada"}}`.
//! Event names are snake_case, payload keys camelCase.

use serde::{Deserialize, Serialize};

use crate::{
    CurrentTurn, Phase, PlayerId, PlayerView, QuestionDraft, QuestionId,
    RoomCode, RoomView,
};

/// Everything a client can ask the server to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Keep-alive. Answered by the connection handler, never reaches a room.
    Ping { client_time: u64 },

    /// Create a room with the sender as host. Acknowledged with the room.
    CreateRoom {
        player_name: String,
        rounds: usize,
        #[serde(default)]
        enable_guessing: bool,
    },

    /// Join a waiting room. Acknowledged with the room and the new player.
    JoinRoom {
        room_code: RoomCode,
        player_name: String,
    },

    /// Re-attach this connection to a previously issued player id.
    RejoinRoom {
        player_id: PlayerId,
        room_code: RoomCode,
    },

    /// Host only: leave `waiting`, assign targets, open submissions.
    HostStartSubmissionState { room_code: RoomCode },

    /// One asker's questions for their assigned targets.
    SubmitQuestions {
        #[serde(alias = "player")]
        player_id: PlayerId,
        room_code: RoomCode,
        questions: Vec<QuestionDraft>,
    },

    /// Host only: fix turn order and show the first question.
    HostStartPlayingState { room_code: RoomCode },

    /// The current question has been answered out loud.
    AnsweredQuestion {
        room_code: RoomCode,
        question_id: QuestionId,
    },

    /// Host only: skip a stalled player by answering on their behalf.
    HostForceAdvance { room_code: RoomCode },

    /// Ask for the roster to be re-broadcast.
    GetCurrentPlayers { room_code: RoomCode },

    /// Leave the room for good.
    LeaveRoom {
        room_code: RoomCode,
        player_id: PlayerId,
    },
}

impl ClientEvent {
    /// The wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "ping",
            Self::CreateRoom { .. } => "create_room",
            Self::JoinRoom { .. } => "join_room",
            Self::RejoinRoom { .. } => "rejoin_room",
            Self::HostStartSubmissionState { .. } => "host_start_submission_state",
            Self::SubmitQuestions { .. } => "submit_questions",
            Self::HostStartPlayingState { .. } => "host_start_playing_state",
            Self::AnsweredQuestion { .. } => "answered_question",
            Self::HostForceAdvance { .. } => "host_force_advance",
            Self::GetCurrentPlayers { .. } => "get_current_players",
            Self::LeaveRoom { .. } => "leave_room",
        }
    }
}

/// Acknowledgement for a request that carried a `request_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ack {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<RoomView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Ack {
    /// A successful acknowledgement carrying the room and, for joins, the
    /// newly created player.
    pub fn ok(request_id: Option<u64>, room: RoomView, player: Option<PlayerView>) -> Self {
        Self {
            request_id,
            success: true,
            room: Some(room),
            player,
            error: None,
        }
    }

    /// A failed acknowledgement. Room state is untouched.
    pub fn failed(request_id: Option<u64>, error: impl Into<String>) -> Self {
        Self {
            request_id,
            success: false,
            room: None,
            player: None,
            error: Some(error.into()),
        }
    }
}

/// Everything the server can push to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Pong { client_time: u64, server_time: u64 },

    /// Reply to `create_room` / `join_room`.
    Ack(Ack),

    /// The full roster.
    EmitAllPlayers { players: Vec<PlayerView> },

    PlayerLeft { player_id: PlayerId },

    /// Submissions are open; each player finds their targets in the room.
    SubmissionState { room: RoomView },

    SubmissionCountUpdate {
        total_submitted: usize,
        player_count: usize,
    },

    /// Host only: every player has submitted, playing may start.
    AllPlayersHaveSubmitted { room_code: RoomCode },

    CurrentPlayerAndQuestion(CurrentTurn),

    FinishedState { room_code: RoomCode },

    /// The room hit an unrecoverable fault and is abandoned.
    ServerError { phase: Phase, message: String },

    /// `rejoin_room` could not re-attach this connection.
    RejoinFailed {
        room_code: RoomCode,
        player_id: PlayerId,
        reason: String,
    },

    /// A request without an ack failed. Only the requester receives this.
    Error { code: u16, message: String },
}

impl ServerEvent {
    /// The wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pong { .. } => "pong",
            Self::Ack(_) => "ack",
            Self::EmitAllPlayers { .. } => "emit_all_players",
            Self::PlayerLeft { .. } => "player_left",
            Self::SubmissionState { .. } => "submission_state",
            Self::SubmissionCountUpdate { .. } => "submission_count_update",
            Self::AllPlayersHaveSubmitted { .. } => "all_players_have_submitted",
            Self::CurrentPlayerAndQuestion(_) => "current_player_and_question",
            Self::FinishedState { .. } => "finished_state",
            Self::ServerError { .. } => "server_error",
            Self::RejoinFailed { .. } => "rejoin_failed",
            Self::Error { .. } => "error",
        }
    }
}

/// The top-level frame. Every message on the wire is an `Envelope`.
///
/// `seq` counts frames per direction per connection. `request_id` is set by
/// clients that want an [`Ack`]; the matching ack echoes it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub seq: u64,

    /// Milliseconds since the sender started.
    #[serde(default)]
    pub timestamp: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<u64>,

    pub event: T,
}

impl<T> Envelope<T> {
    /// A frame that expects no acknowledgement.
    pub fn new(seq: u64, timestamp: u64, event: T) -> Self {
        Self {
            seq,
            timestamp,
            request_id: None,
            event,
        }
    }

    /// A frame that asks for an acknowledgement tagged with `request_id`.
    pub fn request(seq: u64, request_id: u64, event: T) -> Self {
        Self {
            seq,
            timestamp: 0,
            request_id: Some(request_id),
            event,
        }
    }
}
