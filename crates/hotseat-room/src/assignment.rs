//! Target assignment: who writes a question for whom.
//!
//! Players are laid out on a freshly shuffled ring. In round `r` the player
//! at position `p` targets position `(p + 1 + r) % n`. Every round is a
//! permutation with no fixed point, so each player asks once and is asked
//! once per round, and nobody ever targets themselves as long as
//! `rounds < n`.

use std::collections::HashMap;

use hotseat_protocol::{AssignedTarget, Phase, PlayerId};
use rand::Rng;
use rand::seq::SliceRandom;

use crate::{Room, RoomConfig, RoomError};

/// The generated target lists, keyed by asker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    targets: Vec<(PlayerId, Vec<PlayerId>)>,
}

impl Assignment {
    pub fn new(targets: Vec<(PlayerId, Vec<PlayerId>)>) -> Self {
        Self { targets }
    }

    /// Targets of `asker` in round order.
    pub fn targets_of(&self, asker: &PlayerId) -> Option<&[PlayerId]> {
        self.targets
            .iter()
            .find(|(id, _)| id == asker)
            .map(|(_, t)| t.as_slice())
    }

    /// Checks the three guarantees against the roster `players`: every
    /// player asks exactly `rounds` times, is asked exactly `rounds` times
    /// and never targets themselves.
    pub fn verify(&self, players: &[PlayerId], rounds: usize) -> Result<(), RoomError> {
        let mut received: HashMap<&PlayerId, usize> =
            players.iter().map(|p| (p, 0)).collect();

        for player in players {
            let targets = self.targets_of(player).ok_or_else(|| {
                RoomError::AssignmentDefect(format!("{player} has no target list"))
            })?;
            if targets.len() != rounds {
                return Err(RoomError::AssignmentDefect(format!(
                    "{player} has {} targets, expected {rounds}",
                    targets.len()
                )));
            }
            for target in targets {
                if target == player {
                    return Err(RoomError::AssignmentDefect(format!(
                        "{player} targets themselves"
                    )));
                }
                let count = received.get_mut(target).ok_or_else(|| {
                    RoomError::AssignmentDefect(format!("unknown target {target}"))
                })?;
                *count += 1;
            }
        }

        if let Some((player, count)) = received.iter().find(|(_, c)| **c != rounds) {
            return Err(RoomError::AssignmentDefect(format!(
                "{player} is targeted {count} times, expected {rounds}"
            )));
        }
        Ok(())
    }
}

/// `rounds ≤ players − 1`, or no rotation can avoid self-targeting.
pub fn check_precondition(players: usize, rounds: usize) -> Result<(), RoomError> {
    if rounds == 0 || rounds >= players {
        return Err(RoomError::AssignmentPrecondition { rounds, players });
    }
    Ok(())
}

/// Generates one assignment over a new random permutation of `players`.
pub fn generate<R: Rng + ?Sized>(
    players: &[PlayerId],
    rounds: usize,
    rng: &mut R,
) -> Result<Assignment, RoomError> {
    let n = players.len();
    check_precondition(n, rounds)?;

    let mut ring = players.to_vec();
    ring.shuffle(rng);

    let targets = (0..n)
        .map(|p| {
            let asker = ring[p].clone();
            let targets = (0..rounds).map(|r| ring[(p + 1 + r) % n].clone()).collect();
            (asker, targets)
        })
        .collect();
    Ok(Assignment::new(targets))
}

/// Runs `generator` until it yields a verified assignment, at most
/// `max_attempts` times, then writes the result into the room.
///
/// A precondition failure returns immediately; only defects are retried.
/// Returns the number of attempts used.
pub fn assign_with<F>(room: &mut Room, max_attempts: u32, mut generator: F) -> Result<u32, RoomError>
where
    F: FnMut(&[PlayerId], usize) -> Result<Assignment, RoomError>,
{
    let ids: Vec<PlayerId> = room.players.iter().map(|p| p.id.clone()).collect();
    check_precondition(ids.len(), room.rounds)?;

    let mut last_err = None;
    for attempt in 1..=max_attempts.max(1) {
        let result = generator(&ids, room.rounds)
            .and_then(|assignment| assignment.verify(&ids, room.rounds).map(|()| assignment));
        match result {
            Ok(assignment) => {
                apply(room, &assignment);
                return Ok(attempt);
            }
            Err(err @ RoomError::AssignmentPrecondition { .. }) => return Err(err),
            Err(err) => {
                tracing::warn!(room = %room.code, attempt, error = %err, "assignment attempt failed");
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| RoomError::AssignmentDefect("no attempt was made".into())))
}

/// Assigns targets using the room's shared random source.
pub fn assign_targets<R: Rng + ?Sized>(
    room: &mut Room,
    rng: &mut R,
    max_attempts: u32,
) -> Result<u32, RoomError> {
    assign_with(room, max_attempts, |ids, rounds| generate(ids, rounds, &mut *rng))
}

/// Resets per-game state and fills every player's target list.
fn apply(room: &mut Room, assignment: &Assignment) {
    let names: HashMap<PlayerId, String> = room
        .players
        .iter()
        .map(|p| (p.id.clone(), p.name.clone()))
        .collect();

    for player in &mut room.players {
        player.has_submitted = false;
        player.received_questions.clear();
        player.assigned_targets = assignment
            .targets_of(&player.id)
            .unwrap_or_default()
            .iter()
            .map(|id| AssignedTarget {
                id: id.clone(),
                name: names.get(id).cloned().unwrap_or_default(),
            })
            .collect();
    }
    room.total_submitted = 0;
    room.ready_signaled = false;
}

impl Room {
    /// Leaves `waiting`: checks the roster, assigns targets and opens
    /// submissions.
    ///
    /// Request-level failures (`InvalidPhase`, `NotEnoughPlayers`,
    /// `AssignmentPrecondition`) leave the room in `waiting`. An
    /// `AssignmentDefect` after every attempt is room-fatal; the caller
    /// escalates it.
    pub fn start_submission<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        config: &RoomConfig,
    ) -> Result<(), RoomError> {
        self.ensure_phase(Phase::Waiting)?;
        if self.players.len() < config.min_players {
            return Err(RoomError::NotEnoughPlayers {
                required: config.min_players,
                actual: self.players.len(),
            });
        }

        let attempts = assign_targets(self, rng, config.max_assignment_attempts)?;
        self.transition(Phase::Submitting)?;
        tracing::info!(
            room = %self.code,
            players = self.players.len(),
            rounds = self.rounds,
            attempts,
            "targets assigned"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use hotseat_protocol::{ConnectionId, RoomCode};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::Player;

    fn room(players: usize, rounds: usize) -> Room {
        let host = Player::new(PlayerId::new("p0"), "P0", true, Some(ConnectionId::new(0)));
        let mut room = Room::new(RoomCode::new("ROOM01"), host, rounds, false);
        for i in 1..players {
            room.players.push(Player::new(
                PlayerId::new(format!("p{i}")),
                format!("P{i}"),
                false,
                Some(ConnectionId::new(i as u64)),
            ));
        }
        room
    }

    fn ids(n: usize) -> Vec<PlayerId> {
        (0..n).map(|i| PlayerId::new(format!("p{i}"))).collect()
    }

    // =====================================================================
    // generate()
    // =====================================================================

    #[test]
    fn test_generate_is_balanced_for_every_valid_shape() {
        let mut rng = StdRng::seed_from_u64(11);
        for n in 2..=12 {
            for rounds in 1..n {
                let players = ids(n);
                let assignment = generate(&players, rounds, &mut rng).unwrap();
                assignment
                    .verify(&players, rounds)
                    .unwrap_or_else(|e| panic!("n={n} rounds={rounds}: {e}"));
            }
        }
    }

    #[test]
    fn test_generate_rejects_rounds_at_or_above_player_count() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = generate(&ids(3), 3, &mut rng).unwrap_err();
        assert_eq!(err, RoomError::AssignmentPrecondition { rounds: 3, players: 3 });
    }

    #[test]
    fn test_generate_same_seed_same_assignment() {
        let players = ids(6);
        let a = generate(&players, 2, &mut StdRng::seed_from_u64(5)).unwrap();
        let b = generate(&players, 2, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);
    }

    // =====================================================================
    // verify()
    // =====================================================================

    #[test]
    fn test_verify_detects_self_target() {
        let players = ids(3);
        let bad = Assignment::new(vec![
            (players[0].clone(), vec![players[0].clone()]),
            (players[1].clone(), vec![players[2].clone()]),
            (players[2].clone(), vec![players[1].clone()]),
        ]);
        assert!(matches!(bad.verify(&players, 1), Err(RoomError::AssignmentDefect(_))));
    }

    #[test]
    fn test_verify_detects_unbalanced_targets() {
        let players = ids(3);
        let bad = Assignment::new(vec![
            (players[0].clone(), vec![players[1].clone()]),
            (players[1].clone(), vec![players[2].clone()]),
            (players[2].clone(), vec![players[1].clone()]),
        ]);
        assert!(matches!(bad.verify(&players, 1), Err(RoomError::AssignmentDefect(_))));
    }

    // =====================================================================
    // assign_targets() / assign_with()
    // =====================================================================

    #[test]
    fn test_assign_four_players_two_rounds() {
        let mut room = room(4, 2);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(assign_targets(&mut room, &mut rng, 3).unwrap(), 1);

        let total: usize = room.players.iter().map(|p| p.assigned_targets.len()).sum();
        assert_eq!(total, 8);

        for player in &room.players {
            assert_eq!(player.assigned_targets.len(), 2);
            assert!(player.assigned_targets.iter().all(|t| t.id != player.id));
            let targeted = room
                .players
                .iter()
                .flat_map(|p| &p.assigned_targets)
                .filter(|t| t.id == player.id)
                .count();
            assert_eq!(targeted, 2, "{} targeted {targeted} times", player.id);
        }
    }

    #[test]
    fn test_assign_fills_target_names() {
        let mut room = room(3, 1);
        assign_targets(&mut room, &mut StdRng::seed_from_u64(8), 3).unwrap();
        for player in &room.players {
            let target = &player.assigned_targets[0];
            let expected = room.player(&target.id).unwrap().name.clone();
            assert_eq!(target.name, expected);
        }
    }

    #[test]
    fn test_assign_precondition_is_never_retried() {
        let mut room = room(3, 3);
        let mut calls = 0;
        let err = assign_with(&mut room, 3, |ids, rounds| {
            calls += 1;
            generate(ids, rounds, &mut StdRng::seed_from_u64(0))
        })
        .unwrap_err();

        assert!(matches!(err, RoomError::AssignmentPrecondition { .. }));
        assert_eq!(calls, 0);
        assert!(room.players.iter().all(|p| p.assigned_targets.is_empty()));
    }

    #[test]
    fn test_assign_defect_is_retried_until_bound() {
        let mut room = room(3, 1);
        let mut calls = 0;
        let err = assign_with(&mut room, 3, |_, _| {
            calls += 1;
            Err(RoomError::AssignmentDefect("synthetic".into()))
        })
        .unwrap_err();

        assert_eq!(calls, 3);
        assert!(err.is_room_fatal());
    }

    #[test]
    fn test_assign_recovers_after_one_defect() {
        let mut room = room(4, 1);
        let mut rng = StdRng::seed_from_u64(2);
        let mut calls = 0;
        let attempts = assign_with(&mut room, 3, |ids, rounds| {
            calls += 1;
            if calls == 1 {
                // Nobody gets a target: fails verification.
                Ok(Assignment::new(Vec::new()))
            } else {
                generate(ids, rounds, &mut rng)
            }
        })
        .unwrap();

        assert_eq!(attempts, 2);
        assert!(room.players.iter().all(|p| p.assigned_targets.len() == 1));
    }

    // =====================================================================
    // start_submission()
    // =====================================================================

    #[test]
    fn test_start_submission_requires_minimum_roster() {
        let mut room = room(2, 1);
        let err = room
            .start_submission(&mut StdRng::seed_from_u64(0), &RoomConfig::default())
            .unwrap_err();
        assert_eq!(err, RoomError::NotEnoughPlayers { required: 3, actual: 2 });
        assert_eq!(room.phase, Phase::Waiting);
    }

    #[test]
    fn test_start_submission_moves_to_submitting() {
        let mut room = room(3, 2);
        room.start_submission(&mut StdRng::seed_from_u64(0), &RoomConfig::default())
            .unwrap();
        assert_eq!(room.phase, Phase::Submitting);
        assert!(room.players.iter().all(|p| p.assigned_targets.len() == 2));
    }

    #[test]
    fn test_start_submission_precondition_keeps_waiting() {
        let mut room = room(3, 3);
        let err = room
            .start_submission(&mut StdRng::seed_from_u64(0), &RoomConfig::default())
            .unwrap_err();
        assert!(!err.is_room_fatal());
        assert_eq!(room.phase, Phase::Waiting);
    }
}
