//! Turn sequencer.
//!
//! Drives the `playing` phase one question at a time: the current player
//! answers their earliest pending question, the cursor moves to the next
//! player, and after the last player of the last round the room finishes.

use hotseat_protocol::{CurrentTurn, Phase, QuestionId, QuestionSummary};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::{NoPendingPolicy, Room, RoomError};

/// Where the game stands after the cursor moved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A new turn is on screen.
    Turn(CurrentTurn),
    /// The last turn of the last round was taken.
    Finished,
}

/// Result of an `answered_question` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The question was answered before. Carries the unchanged current turn,
    /// `None` once the room has finished.
    Duplicate(Option<CurrentTurn>),
    Advanced(TurnOutcome),
}

impl Room {
    /// Fixes the turn order and shows the first question.
    ///
    /// # Errors
    /// `InvalidPhase` outside `submitting`, `SubmissionsPending` while the
    /// barrier is open. `NoPendingQuestion` under the fatal policy is
    /// room-fatal.
    pub fn start_playing<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        policy: NoPendingPolicy,
    ) -> Result<TurnOutcome, RoomError> {
        self.ensure_phase(Phase::Submitting)?;
        if !self.is_barrier_complete() {
            return Err(RoomError::SubmissionsPending {
                submitted: self.total_submitted,
                total: self.players.len(),
            });
        }

        self.transition(Phase::Playing)?;
        self.players.shuffle(rng);
        self.current_round = 1;
        self.current_player_index = 0;
        self.show_current_turn(policy)
    }

    /// Selects the current player's earliest unanswered question and records
    /// it as the current turn.
    ///
    /// With [`NoPendingPolicy::Skip`] players with nothing to answer are
    /// passed over, which may finish the room.
    pub fn show_current_turn(&mut self, policy: NoPendingPolicy) -> Result<TurnOutcome, RoomError> {
        loop {
            let player = self
                .players
                .get(self.current_player_index)
                .ok_or_else(|| RoomError::TurnOutOfRange {
                    room: self.code.clone(),
                    index: self.current_player_index,
                })?;

            if let Some(question) = player.pending_question() {
                let turn = CurrentTurn {
                    player: player.summary(),
                    question: QuestionSummary {
                        id: question.id.clone(),
                        text: question.text.clone(),
                    },
                    round: self.current_round,
                    total_rounds: self.rounds,
                };
                tracing::debug!(
                    room = %self.code,
                    player = %turn.player.id,
                    question = %turn.question.id,
                    round = turn.round,
                    "current turn"
                );
                self.current_turn = Some(turn.clone());
                return Ok(TurnOutcome::Turn(turn));
            }

            match policy {
                NoPendingPolicy::Fatal => {
                    return Err(RoomError::NoPendingQuestion(player.id.clone()));
                }
                NoPendingPolicy::Skip => {
                    tracing::warn!(room = %self.code, player = %player.id, "no pending question, skipping");
                    if self.advance_cursor() {
                        self.finish()?;
                        return Ok(TurnOutcome::Finished);
                    }
                }
            }
        }
    }

    /// Moves to the next player, wrapping into the next round. Returns
    /// `true` when the last round is over.
    pub fn advance_cursor(&mut self) -> bool {
        self.current_player_index += 1;
        if self.current_player_index >= self.players.len() {
            self.current_player_index = 0;
            self.current_round += 1;
        }
        self.current_round > self.rounds
    }

    /// Enters `finished` and clears the current turn.
    pub fn finish(&mut self) -> Result<(), RoomError> {
        self.transition(Phase::Finished)?;
        self.current_turn = None;
        Ok(())
    }

    /// Handles an answer for `question_id`.
    ///
    /// Ids already answered are a no-op in any phase. Otherwise the id must
    /// belong to the current player (`QuestionNotFound`).
    pub fn answer_question(
        &mut self,
        question_id: &QuestionId,
        policy: NoPendingPolicy,
    ) -> Result<AnswerOutcome, RoomError> {
        if self.answered_question_ids.contains(question_id) {
            tracing::warn!(room = %self.code, question = %question_id, "duplicate answer ignored");
            return Ok(AnswerOutcome::Duplicate(self.current_turn.clone()));
        }
        self.ensure_phase(Phase::Playing)?;

        let question = self
            .players
            .get_mut(self.current_player_index)
            .and_then(|p| p.received_questions.iter_mut().find(|q| &q.id == question_id))
            .ok_or_else(|| RoomError::QuestionNotFound(question_id.clone()))?;
        question.is_answered = true;
        self.answered_question_ids.insert(question_id.clone());

        if self.advance_cursor() {
            self.finish()?;
            return Ok(AnswerOutcome::Advanced(TurnOutcome::Finished));
        }
        self.show_current_turn(policy).map(AnswerOutcome::Advanced)
    }

    /// Answers the question on screen on behalf of the current player.
    pub fn force_advance(&mut self, policy: NoPendingPolicy) -> Result<AnswerOutcome, RoomError> {
        self.ensure_phase(Phase::Playing)?;
        let question_id = self
            .current_turn
            .as_ref()
            .map(|turn| turn.question.id.clone())
            .ok_or_else(|| {
                let player = self
                    .players
                    .get(self.current_player_index)
                    .map(|p| p.id.clone())
                    .unwrap_or_else(|| self.host_id.clone());
                RoomError::NoPendingQuestion(player)
            })?;
        tracing::info!(room = %self.code, question = %question_id, "host forced advance");
        self.answer_question(&question_id, policy)
    }

    /// Keeps the cursor valid after the player at `position` was removed.
    ///
    /// Returns the new turn if the leaver held the current one.
    pub fn on_player_removed(
        &mut self,
        position: usize,
        policy: NoPendingPolicy,
    ) -> Result<Option<TurnOutcome>, RoomError> {
        if self.phase != Phase::Playing || self.players.is_empty() {
            return Ok(None);
        }

        let held_turn = position == self.current_player_index;
        if position < self.current_player_index {
            self.current_player_index -= 1;
        }
        if !held_turn {
            return Ok(None);
        }

        // The next player has slid into the vacated index.
        if self.current_player_index >= self.players.len() {
            self.current_player_index = 0;
            self.current_round += 1;
            if self.current_round > self.rounds {
                self.finish()?;
                return Ok(Some(TurnOutcome::Finished));
            }
        }
        self.show_current_turn(policy).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use hotseat_protocol::{ConnectionId, PlayerId, QuestionDraft, RoomCode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::{Player, RoomConfig};

    /// A room of `n` players where everyone has submitted for their targets.
    fn ready_room(n: usize, rounds: usize) -> (Room, StdRng) {
        let host = Player::new(PlayerId::new("p0"), "P0", true, Some(ConnectionId::new(0)));
        let mut room = Room::new(RoomCode::new("ROOM01"), host, rounds, false);
        for i in 1..n {
            room.players
                .push(Player::new(PlayerId::new(format!("p{i}")), format!("P{i}"), false, None));
        }
        let mut rng = StdRng::seed_from_u64(21);
        room.start_submission(&mut rng, &RoomConfig::default()).unwrap();

        let askers: Vec<PlayerId> = room.players.iter().map(|p| p.id.clone()).collect();
        for asker in askers {
            let drafts = room
                .player(&asker)
                .unwrap()
                .assigned_targets
                .iter()
                .map(|t| QuestionDraft {
                    target_player_id: t.id.clone(),
                    text: format!("for {}", t.name),
                })
                .collect();
            room.record_submission(&asker, drafts, &mut rng).unwrap();
        }
        (room, rng)
    }

    fn current_question(room: &Room) -> QuestionId {
        room.current_turn.as_ref().unwrap().question.id.clone()
    }

    #[test]
    fn test_start_playing_requires_complete_barrier() {
        let host = Player::new(PlayerId::new("p0"), "P0", true, None);
        let mut room = Room::new(RoomCode::new("ROOM01"), host, 1, false);
        for i in 1..3 {
            room.players
                .push(Player::new(PlayerId::new(format!("p{i}")), "P", false, None));
        }
        let mut rng = StdRng::seed_from_u64(0);
        room.start_submission(&mut rng, &RoomConfig::default()).unwrap();

        let err = room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap_err();
        assert_eq!(err, RoomError::SubmissionsPending { submitted: 0, total: 3 });
        assert_eq!(room.phase, Phase::Submitting);
    }

    #[test]
    fn test_start_playing_shows_first_player_question() {
        let (mut room, mut rng) = ready_room(3, 1);
        let outcome = room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();

        let TurnOutcome::Turn(turn) = outcome else {
            panic!("expected a turn");
        };
        assert_eq!(room.phase, Phase::Playing);
        assert_eq!(room.current_round, 1);
        assert_eq!(room.current_player_index, 0);
        assert_eq!(turn.player.id, room.players[0].id);
        assert_eq!(turn.total_rounds, 1);
    }

    #[test]
    fn test_three_players_one_round_finishes_on_third_answer() {
        let (mut room, mut rng) = ready_room(3, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();

        for expected_index in [1, 2] {
            let outcome = room.answer_question(&current_question(&room), NoPendingPolicy::Fatal).unwrap();
            assert!(matches!(outcome, AnswerOutcome::Advanced(TurnOutcome::Turn(_))));
            assert_eq!(room.current_player_index, expected_index);
            assert_eq!(room.current_round, 1);
        }

        let outcome = room.answer_question(&current_question(&room), NoPendingPolicy::Fatal).unwrap();
        assert_eq!(outcome, AnswerOutcome::Advanced(TurnOutcome::Finished));
        assert_eq!(room.current_round, 2);
        assert_eq!(room.phase, Phase::Finished);
        assert!(room.current_turn.is_none());
    }

    #[test]
    fn test_answer_count_matches_players_times_rounds() {
        let (mut room, mut rng) = ready_room(4, 2);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();

        for _ in 0..(4 * 2 - 1) {
            room.answer_question(&current_question(&room), NoPendingPolicy::Fatal).unwrap();
        }
        assert_eq!(room.phase, Phase::Playing);

        room.answer_question(&current_question(&room), NoPendingPolicy::Fatal).unwrap();
        assert_eq!(room.phase, Phase::Finished);
    }

    #[test]
    fn test_duplicate_answer_never_advances_twice() {
        let (mut room, mut rng) = ready_room(3, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();
        let first = current_question(&room);

        room.answer_question(&first, NoPendingPolicy::Fatal).unwrap();
        let turn_after = room.current_turn.clone();
        let outcome = room.answer_question(&first, NoPendingPolicy::Fatal).unwrap();

        assert_eq!(outcome, AnswerOutcome::Duplicate(turn_after));
        assert_eq!(room.current_player_index, 1);
    }

    #[test]
    fn test_answer_unknown_question_is_not_found() {
        let (mut room, mut rng) = ready_room(3, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();

        let err = room
            .answer_question(&QuestionId::new("q-missing"), NoPendingPolicy::Fatal)
            .unwrap_err();
        assert_eq!(err, RoomError::QuestionNotFound(QuestionId::new("q-missing")));
        assert_eq!(room.current_player_index, 0);
    }

    #[test]
    fn test_no_pending_question_is_fatal_by_default() {
        let (mut room, mut rng) = ready_room(3, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();
        room.players[1].received_questions.clear();

        let err = room
            .answer_question(&current_question(&room), NoPendingPolicy::Fatal)
            .unwrap_err();
        assert!(err.is_room_fatal());
        assert!(matches!(err, RoomError::NoPendingQuestion(_)));
    }

    #[test]
    fn test_no_pending_question_skipped_under_skip_policy() {
        let (mut room, mut rng) = ready_room(3, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Skip).unwrap();
        room.players[1].received_questions.clear();

        let outcome = room
            .answer_question(&current_question(&room), NoPendingPolicy::Skip)
            .unwrap();
        let AnswerOutcome::Advanced(TurnOutcome::Turn(turn)) = outcome else {
            panic!("expected next turn");
        };
        assert_eq!(turn.player.id, room.players[2].id);
    }

    #[test]
    fn test_force_advance_answers_current_question() {
        let (mut room, mut rng) = ready_room(3, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();
        let on_screen = current_question(&room);

        room.force_advance(NoPendingPolicy::Fatal).unwrap();
        assert!(room.answered_question_ids.contains(&on_screen));
        assert_eq!(room.current_player_index, 1);
    }

    #[test]
    fn test_show_current_turn_cursor_past_roster_is_room_fatal() {
        let (mut room, mut rng) = ready_room(3, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();
        room.current_player_index = 3;

        let err = room.show_current_turn(NoPendingPolicy::Skip).unwrap_err();
        assert_eq!(
            err,
            RoomError::TurnOutOfRange {
                room: RoomCode::new("ROOM01"),
                index: 3,
            }
        );
        assert!(err.is_room_fatal());
    }

    #[test]
    fn test_current_player_leaving_moves_turn_on() {
        let (mut room, mut rng) = ready_room(4, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();
        room.answer_question(&current_question(&room), NoPendingPolicy::Fatal).unwrap();
        let next = room.players[2].id.clone();

        room.players.remove(1);
        let outcome = room.on_player_removed(1, NoPendingPolicy::Fatal).unwrap();

        let Some(TurnOutcome::Turn(turn)) = outcome else {
            panic!("expected a new turn");
        };
        assert_eq!(turn.player.id, next);
        assert_eq!(room.current_player_index, 1);
    }

    #[test]
    fn test_earlier_player_leaving_keeps_current_turn() {
        let (mut room, mut rng) = ready_room(4, 1);
        room.start_playing(&mut rng, NoPendingPolicy::Fatal).unwrap();
        room.answer_question(&current_question(&room), NoPendingPolicy::Fatal).unwrap();
        let current = room.players[1].id.clone();

        room.players.remove(0);
        let outcome = room.on_player_removed(0, NoPendingPolicy::Fatal).unwrap();

        assert_eq!(outcome, None);
        assert_eq!(room.players[room.current_player_index].id, current);
    }
}
