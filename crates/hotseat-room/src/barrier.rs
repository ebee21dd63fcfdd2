//! Submission barrier.
//!
//! Collects each asker's questions and tracks how many players are done.
//! When the count reaches the roster size the host is told once; the
//! signal is edge-triggered and only re-sent by session recovery.

use hotseat_protocol::{Phase, PlayerId, Question, QuestionDraft};
use rand::Rng;

use crate::{Room, RoomError, ids};

/// What happened to a `submit_questions` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Recorded {
        accepted: usize,
        /// Questions whose target no longer resolves, or is the asker.
        dropped: usize,
        /// `true` exactly once per game: when this submission completed
        /// the barrier.
        barrier_reached: bool,
    },
    /// The asker had already submitted. Nothing changed.
    Duplicate,
}

impl Room {
    /// Records one asker's questions.
    ///
    /// # Errors
    /// `InvalidPhase` outside `submitting`, `AskerNotFound` if `asker` is
    /// not on the roster.
    pub fn record_submission<R: Rng + ?Sized>(
        &mut self,
        asker: &PlayerId,
        drafts: Vec<QuestionDraft>,
        rng: &mut R,
    ) -> Result<SubmissionOutcome, RoomError> {
        self.ensure_phase(Phase::Submitting)?;
        let already = self
            .player(asker)
            .map(|p| p.has_submitted)
            .ok_or_else(|| RoomError::AskerNotFound {
                room: self.code.clone(),
                player: asker.clone(),
            })?;
        if already {
            tracing::warn!(room = %self.code, player = %asker, "duplicate submission ignored");
            return Ok(SubmissionOutcome::Duplicate);
        }

        let mut accepted = 0;
        let mut dropped = 0;
        for draft in drafts {
            if &draft.target_player_id == asker {
                tracing::warn!(room = %self.code, player = %asker, "self-targeted question dropped");
                dropped += 1;
                continue;
            }
            let Some(position) = self.position(&draft.target_player_id) else {
                tracing::warn!(
                    room = %self.code,
                    player = %asker,
                    target = %draft.target_player_id,
                    "question target not in room, dropped"
                );
                dropped += 1;
                continue;
            };
            let id = ids::question_id(&mut *rng);
            self.players[position].received_questions.push(Question {
                id,
                text: draft.text,
                asked_by_id: asker.clone(),
                target_player_id: draft.target_player_id,
                is_answered: false,
            });
            accepted += 1;
        }

        if let Some(player) = self.player_mut(asker) {
            player.has_submitted = true;
        }
        self.recount_submissions();
        let barrier_reached = self.take_barrier_edge();

        tracing::debug!(
            room = %self.code,
            player = %asker,
            accepted,
            dropped,
            submitted = self.total_submitted,
            players = self.players.len(),
            "submission recorded"
        );
        Ok(SubmissionOutcome::Recorded {
            accepted,
            dropped,
            barrier_reached,
        })
    }

    /// Every player on the roster has submitted.
    pub fn is_barrier_complete(&self) -> bool {
        !self.players.is_empty() && self.total_submitted == self.players.len()
    }

    /// Returns `true` the first time the barrier is observed complete,
    /// `false` ever after.
    pub fn take_barrier_edge(&mut self) -> bool {
        if self.is_barrier_complete() && !self.ready_signaled {
            self.ready_signaled = true;
            tracing::info!(room = %self.code, players = self.players.len(), "all players have submitted");
            true
        } else {
            false
        }
    }

    /// Re-derives the barrier counter from the roster. Needed after a
    /// departure, since the leaver may or may not have submitted.
    pub fn recount_submissions(&mut self) {
        self.total_submitted = self.players.iter().filter(|p| p.has_submitted).count();
    }
}
