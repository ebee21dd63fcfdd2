//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What the turn sequencer does when the current player has nothing left
/// to answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NoPendingPolicy {
    /// Treat it as an upstream defect and push the room into `error`.
    #[default]
    Fatal,
    /// Move the cursor on as if the turn had been taken.
    Skip,
}

/// Configuration shared by every room an engine manages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Smallest roster that may leave `waiting`.
    pub min_players: usize,

    /// Roster cap enforced at join.
    pub max_players: usize,

    /// Target assignment attempts before the room is declared faulty.
    pub max_assignment_attempts: u32,

    /// How long a finished room stays readable before deletion.
    pub finished_cleanup_delay: Duration,

    /// How long an errored room stays readable before deletion.
    pub error_cleanup_delay: Duration,

    pub no_pending_question: NoPendingPolicy,

    /// Length of generated room codes. Zero is treated as one.
    pub room_code_length: usize,

    /// Seed for the engine's random source. `None` seeds from the OS.
    pub rng_seed: Option<u64>,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            min_players: 3,
            max_players: 25,
            max_assignment_attempts: 3,
            finished_cleanup_delay: Duration::from_secs(10 * 60),
            error_cleanup_delay: Duration::from_secs(10 * 60),
            no_pending_question: NoPendingPolicy::Fatal,
            room_code_length: 6,
            rng_seed: None,
        }
    }
}

impl RoomConfig {
    /// Upper bound for `rounds` at creation time: a full room can support
    /// at most `max_players - 1` rounds.
    pub fn max_rounds(&self) -> usize {
        self.max_players.saturating_sub(1).max(1)
    }
}
