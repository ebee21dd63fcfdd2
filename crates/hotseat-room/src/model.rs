//! The Room and Player entities.
//!
//! A [`Room`] is owned by the [`RoomManager`](crate::RoomManager) and
//! mutated in place by the assignment engine, the submission barrier and the
//! turn sequencer. Players belong to exactly one room.

use std::collections::HashSet;

use hotseat_protocol::{
    AssignedTarget, ConnectionId, CurrentTurn, Phase, PlayerId, PlayerSummary,
    PlayerView, Question, QuestionId, RoomCode, RoomView,
};

use crate::RoomError;

/// A participant in one room.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// The live connection serving this player, if any. A lookup key only;
    /// cleared on disconnect, replaced on rejoin.
    pub connection: Option<ConnectionId>,
    pub is_host: bool,
    pub has_submitted: bool,
    /// One target per round, in round order.
    pub assigned_targets: Vec<AssignedTarget>,
    /// Questions other players wrote about this player, in arrival order.
    pub received_questions: Vec<Question>,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        is_host: bool,
        connection: Option<ConnectionId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            connection,
            is_host,
            has_submitted: false,
            assigned_targets: Vec::new(),
            received_questions: Vec::new(),
        }
    }

    /// The earliest received question that hasn't been answered yet.
    pub fn pending_question(&self) -> Option<&Question> {
        self.received_questions.iter().find(|q| !q.is_answered)
    }

    pub fn summary(&self) -> PlayerSummary {
        PlayerSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }

    pub fn view(&self) -> PlayerView {
        PlayerView {
            id: self.id.clone(),
            name: self.name.clone(),
            is_host: self.is_host,
            has_submitted: self.has_submitted,
            assigned_targets: self.assigned_targets.clone(),
            received_questions: self.received_questions.clone(),
        }
    }
}

/// One game session.
#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    pub host_id: PlayerId,
    pub rounds: usize,
    pub enable_guessing: bool,
    pub phase: Phase,
    /// Join order until playing starts, then the shuffled turn order.
    pub players: Vec<Player>,
    /// Barrier counter: players who completed submission.
    pub total_submitted: usize,
    /// Set once the host has been told the barrier is satisfied.
    pub ready_signaled: bool,
    /// 1-based round cursor, meaningful while playing.
    pub current_round: usize,
    pub current_player_index: usize,
    pub current_turn: Option<CurrentTurn>,
    pub answered_question_ids: HashSet<QuestionId>,
}

impl Room {
    /// Creates a waiting room whose only member is `host`.
    pub fn new(code: RoomCode, host: Player, rounds: usize, enable_guessing: bool) -> Self {
        Self {
            code,
            host_id: host.id.clone(),
            rounds,
            enable_guessing,
            phase: Phase::Waiting,
            players: vec![host],
            total_submitted: 0,
            ready_signaled: false,
            current_round: 0,
            current_player_index: 0,
            current_turn: None,
            answered_question_ids: HashSet::new(),
        }
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub fn position(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    pub fn host(&self) -> Option<&Player> {
        self.player(&self.host_id)
    }

    /// Fails with [`RoomError::NotHost`] unless `conn` serves the host.
    pub fn ensure_host(&self, conn: ConnectionId) -> Result<(), RoomError> {
        let host = self
            .host()
            .ok_or_else(|| RoomError::HostNotFound(self.code.clone()))?;
        if host.connection == Some(conn) {
            Ok(())
        } else {
            Err(RoomError::NotHost(self.code.clone()))
        }
    }

    /// Fails with [`RoomError::NotPlayerConnection`] when `player` is in
    /// the room but `conn` is not its current connection. Unknown players
    /// pass, so the operation itself reports the miss.
    pub fn ensure_player_connection(
        &self,
        conn: ConnectionId,
        player: &PlayerId,
    ) -> Result<(), RoomError> {
        match self.player(player) {
            Some(p) if p.connection != Some(conn) => Err(RoomError::NotPlayerConnection {
                room: self.code.clone(),
                player: player.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub fn ensure_phase(&self, expected: Phase) -> Result<(), RoomError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(RoomError::InvalidPhase {
                expected,
                actual: self.phase,
            })
        }
    }

    /// Moves to `to`, refusing skips and reversals.
    pub fn transition(&mut self, to: Phase) -> Result<(), RoomError> {
        if !self.phase.can_transition_to(to) {
            return Err(RoomError::InvalidTransition {
                from: self.phase,
                to,
            });
        }
        tracing::info!(room = %self.code, from = %self.phase, %to, "phase transition");
        self.phase = to;
        Ok(())
    }

    /// Every live connection in the room.
    pub fn connections(&self) -> Vec<ConnectionId> {
        self.players.iter().filter_map(|p| p.connection).collect()
    }

    pub fn roster(&self) -> Vec<PlayerView> {
        self.players.iter().map(Player::view).collect()
    }

    pub fn view(&self) -> RoomView {
        RoomView {
            code: self.code.clone(),
            host_id: self.host_id.clone(),
            rounds: self.rounds,
            enable_guessing: self.enable_guessing,
            phase: self.phase,
            players: self.roster(),
            total_submitted: self.total_submitted,
            current_round: self.current_round,
            current_player_index: self.current_player_index,
        }
    }

    pub fn info(&self, max_players: usize) -> RoomInfo {
        RoomInfo {
            code: self.code.clone(),
            phase: self.phase,
            player_count: self.players.len(),
            max_players,
            rounds: self.rounds,
            current_round: self.current_round,
            total_submitted: self.total_submitted,
        }
    }
}

/// A snapshot of room metadata for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomInfo {
    pub code: RoomCode,
    pub phase: Phase,
    pub player_count: usize,
    pub max_players: usize,
    pub rounds: usize,
    pub current_round: usize,
    pub total_submitted: usize,
}
