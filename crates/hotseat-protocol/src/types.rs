//! Identifiers, the room phase machine, and the views that travel on the wire.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The human-shareable code of a room, e.g. `"K7QX2B"`.
///
/// Immutable once the room is created. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Wraps a code. Codes are compared case-sensitively; the generator
    /// only produces upper-case alphanumerics.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque player identifier, stable across reconnects.
///
/// Clients keep it locally and present it again in `rejoin_room`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a submitted question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// The lifecycle stage of a room.
///
/// ```text
/// Waiting → Submitting → Playing → Finished
///    └──────────┴───────────┴──────────┴──→ Error
/// ```
///
/// No transition is reversible and no stage may be skipped. `Error` is
/// reachable from every other phase and is terminal, like `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Waiting,
    Submitting,
    Playing,
    Finished,
    Error,
}

impl Phase {
    /// Returns the next phase on the happy path, `None` when terminal.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Waiting => Some(Self::Submitting),
            Self::Submitting => Some(Self::Playing),
            Self::Playing => Some(Self::Finished),
            Self::Finished | Self::Error => None,
        }
    }

    /// Returns `true` if moving to `target` is a legal transition.
    pub fn can_transition_to(self, target: Self) -> bool {
        match target {
            Self::Error => self != Self::Error,
            _ => self.next() == Some(target),
        }
    }

    /// Only a waiting room accepts new players.
    pub fn is_joinable(self) -> bool {
        matches!(self, Self::Waiting)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Submitting => "submitting",
            Self::Playing => "playing",
            Self::Finished => "finished",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Game data shared between server state and wire views
// ---------------------------------------------------------------------------

/// One entry of a player's target list: who they must write a question for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedTarget {
    pub id: PlayerId,
    pub name: String,
}

/// A question written by one player about another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub asked_by_id: PlayerId,
    pub target_player_id: PlayerId,
    pub is_answered: bool,
}

/// A question as submitted by the client, before the server assigns an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    pub target_player_id: PlayerId,
    pub text: String,
}

/// Public view of a player. Never carries the connection reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub is_host: bool,
    pub has_submitted: bool,
    pub assigned_targets: Vec<AssignedTarget>,
    pub received_questions: Vec<Question>,
}

/// Public view of a room, as sent in acks and `submission_state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub rounds: usize,
    pub enable_guessing: bool,
    pub phase: Phase,
    pub players: Vec<PlayerView>,
    pub total_submitted: usize,
    pub current_round: usize,
    pub current_player_index: usize,
}

/// Name and id of a player, used in turn announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSummary {
    pub id: PlayerId,
    pub name: String,
}

/// The question currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSummary {
    pub id: QuestionId,
    pub text: String,
}

/// The room's current-turn pointer: who answers, what, and in which round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTurn {
    pub player: PlayerSummary,
    pub question: QuestionSummary,
    pub round: usize,
    pub total_rounds: usize,
}
