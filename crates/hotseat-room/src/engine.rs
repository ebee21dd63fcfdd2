//! The game engine: turns client events into room mutations and outbound
//! events.
//!
//! [`Engine`] is synchronous and single-owner. Every call runs to completion
//! before the next, which is what lets rooms go without locks. The actor in
//! [`crate::actor`] owns one and feeds it from a channel; tests drive it
//! directly with a recording [`Notifier`].

use hotseat_protocol::{
    Ack, ClientEvent, ConnectionId, Phase, PlayerId, QuestionDraft, QuestionId,
    RoomCode, ServerEvent,
};
use tokio::time::Instant;

use crate::{
    AnswerOutcome, Departure, Notifier, RoomConfig, RoomError, RoomManager,
    SubmissionOutcome, TurnOutcome,
};

pub struct Engine<N: Notifier> {
    rooms: RoomManager,
    notifier: N,
    config: RoomConfig,
}

impl<N: Notifier> Engine<N> {
    pub fn new(config: RoomConfig, notifier: N) -> Self {
        Self {
            rooms: RoomManager::new(config.clone()),
            notifier,
            config,
        }
    }

    pub fn rooms(&self) -> &RoomManager {
        &self.rooms
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    /// Handles one client event from `conn`.
    ///
    /// `request_id` is echoed in the ack of `create_room` / `join_room`.
    pub fn handle(&mut self, conn: ConnectionId, request_id: Option<u64>, event: ClientEvent) {
        tracing::debug!(%conn, event = event.name(), "client event");
        match event {
            // Answered by the connection handler.
            ClientEvent::Ping { .. } => {}
            ClientEvent::CreateRoom {
                player_name,
                rounds,
                enable_guessing,
            } => self.create_room(conn, request_id, &player_name, rounds, enable_guessing),
            ClientEvent::JoinRoom {
                room_code,
                player_name,
            } => self.join_room(conn, request_id, &room_code, &player_name),
            ClientEvent::RejoinRoom {
                player_id,
                room_code,
            } => self.rejoin_room(conn, &room_code, &player_id),
            ClientEvent::HostStartSubmissionState { room_code } => {
                self.start_submission(conn, &room_code)
            }
            ClientEvent::SubmitQuestions {
                player_id,
                room_code,
                questions,
            } => self.submit_questions(conn, &room_code, &player_id, questions),
            ClientEvent::HostStartPlayingState { room_code } => {
                self.start_playing(conn, &room_code)
            }
            ClientEvent::AnsweredQuestion {
                room_code,
                question_id,
            } => self.answered_question(conn, &room_code, &question_id),
            ClientEvent::HostForceAdvance { room_code } => self.force_advance(conn, &room_code),
            ClientEvent::GetCurrentPlayers { room_code } => {
                if self.rooms.get_room(&room_code).is_some() {
                    self.broadcast_roster(&room_code);
                } else {
                    self.report(conn, &room_code, RoomError::RoomNotFound(room_code.clone()));
                }
            }
            ClientEvent::LeaveRoom {
                room_code,
                player_id,
            } => self.leave_room(conn, &room_code, &player_id),
        }
    }

    /// A connection went away. The player it served stays in the roster
    /// with no connection until a rejoin.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        if let Some((room, player)) = self.rooms.detach_connection(conn) {
            tracing::info!(%room, %player, %conn, "player disconnected");
        }
    }

    /// The earliest pending room cleanup.
    pub fn next_cleanup(&self) -> Option<Instant> {
        self.rooms.next_cleanup()
    }

    /// Deletes rooms whose cleanup deadline has passed.
    pub fn run_due_cleanups(&mut self, now: Instant) -> Vec<RoomCode> {
        let deleted = self.rooms.run_due_cleanups(now);
        for code in &deleted {
            tracing::info!(room = %code, "room cleaned up");
        }
        deleted
    }

    // -----------------------------------------------------------------
    // Event handlers
    // -----------------------------------------------------------------

    fn create_room(
        &mut self,
        conn: ConnectionId,
        request_id: Option<u64>,
        player_name: &str,
        rounds: usize,
        enable_guessing: bool,
    ) {
        match self.rooms.create_room(player_name, rounds, enable_guessing, conn) {
            Ok(room) => {
                let host = room.host().map(|h| h.view());
                let ack = Ack::ok(request_id, room.view(), host);
                let code = room.code.clone();
                self.notifier.send_to(conn, ServerEvent::Ack(ack));
                self.broadcast_roster(&code);
            }
            Err(err) => {
                tracing::debug!(%conn, error = %err, "create_room rejected");
                self.notifier
                    .send_to(conn, ServerEvent::Ack(Ack::failed(request_id, err.to_string())));
            }
        }
    }

    fn join_room(
        &mut self,
        conn: ConnectionId,
        request_id: Option<u64>,
        code: &RoomCode,
        player_name: &str,
    ) {
        let joined = match self.rooms.add_player(code, player_name, conn) {
            Ok(player) => {
                let player = player.view();
                self.rooms.room(code).map(|room| (room.view(), player))
            }
            Err(err) => Err(err),
        };
        match joined {
            Ok((room, player)) => {
                self.notifier
                    .send_to(conn, ServerEvent::Ack(Ack::ok(request_id, room, Some(player))));
                self.broadcast_roster(code);
            }
            Err(err) => {
                tracing::debug!(%conn, room = %code, error = %err, "join_room rejected");
                self.notifier
                    .send_to(conn, ServerEvent::Ack(Ack::failed(request_id, err.to_string())));
            }
        }
    }

    fn rejoin_room(&mut self, conn: ConnectionId, code: &RoomCode, player_id: &PlayerId) {
        match self.rooms.recover_session(code, player_id, conn) {
            Ok(events) => {
                for event in events {
                    self.notifier.send_to(conn, event);
                }
            }
            Err(err) => self.notifier.send_to(
                conn,
                ServerEvent::RejoinFailed {
                    room_code: code.clone(),
                    player_id: player_id.clone(),
                    reason: err.to_string(),
                },
            ),
        }
    }

    fn start_submission(&mut self, conn: ConnectionId, code: &RoomCode) {
        let result = self.rooms.room_and_rng(code).and_then(|(room, rng)| {
            room.ensure_host(conn)?;
            room.start_submission(rng, &self.config)?;
            Ok(room.view())
        });
        match result {
            Ok(room) => self.broadcast(code, ServerEvent::SubmissionState { room }),
            Err(err) => self.report(conn, code, err),
        }
    }

    fn submit_questions(
        &mut self,
        conn: ConnectionId,
        code: &RoomCode,
        asker: &PlayerId,
        questions: Vec<QuestionDraft>,
    ) {
        let result = self.rooms.room_and_rng(code).and_then(|(room, rng)| {
            room.ensure_player_connection(conn, asker)?;
            let outcome = room.record_submission(asker, questions, rng)?;
            let count = ServerEvent::SubmissionCountUpdate {
                total_submitted: room.total_submitted,
                player_count: room.players.len(),
            };
            Ok((outcome, count, room.host().and_then(|h| h.connection)))
        });

        match result {
            Ok((SubmissionOutcome::Duplicate, count, _)) => self.notifier.send_to(conn, count),
            Ok((SubmissionOutcome::Recorded { barrier_reached, .. }, count, host)) => {
                self.broadcast(code, count);
                if barrier_reached {
                    self.signal_host(code, host);
                }
            }
            Err(err) => self.report(conn, code, err),
        }
    }

    fn start_playing(&mut self, conn: ConnectionId, code: &RoomCode) {
        let policy = self.config.no_pending_question;
        let result = self.rooms.room_and_rng(code).and_then(|(room, rng)| {
            room.ensure_host(conn)?;
            room.start_playing(rng, policy)
        });
        match result {
            Ok(outcome) => self.publish_turn(code, outcome),
            Err(err) => self.report(conn, code, err),
        }
    }

    fn answered_question(&mut self, conn: ConnectionId, code: &RoomCode, question_id: &QuestionId) {
        let policy = self.config.no_pending_question;
        let result = self
            .rooms
            .get_room_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))
            .and_then(|room| room.answer_question(question_id, policy));
        self.publish_answer(conn, code, result);
    }

    fn force_advance(&mut self, conn: ConnectionId, code: &RoomCode) {
        let policy = self.config.no_pending_question;
        let result = self
            .rooms
            .get_room_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))
            .and_then(|room| {
                room.ensure_host(conn)?;
                room.force_advance(policy)
            });
        self.publish_answer(conn, code, result);
    }

    fn leave_room(&mut self, conn: ConnectionId, code: &RoomCode, player_id: &PlayerId) {
        if let Some(Err(err)) = self
            .rooms
            .get_room(code)
            .map(|room| room.ensure_player_connection(conn, player_id))
        {
            return self.report(conn, code, err);
        }
        let departure = match self.rooms.remove_player(code, player_id) {
            Ok(departure) => departure,
            Err(err) => return self.report(conn, code, err),
        };
        let left = ServerEvent::PlayerLeft {
            player_id: player_id.clone(),
        };

        let position = match departure {
            Departure::RoomClosed { room, .. } => {
                self.notifier.broadcast(&room.connections(), &left);
                return;
            }
            Departure::Left { position, .. } => position,
        };

        self.broadcast(code, left);
        self.broadcast_roster(code);

        let policy = self.config.no_pending_question;
        let Some(room) = self.rooms.get_room_mut(code) else {
            return;
        };
        match room.phase {
            Phase::Submitting => {
                room.recount_submissions();
                let count = ServerEvent::SubmissionCountUpdate {
                    total_submitted: room.total_submitted,
                    player_count: room.players.len(),
                };
                let reached = room.take_barrier_edge();
                let host = room.host().and_then(|h| h.connection);
                self.broadcast(code, count);
                if reached {
                    self.signal_host(code, host);
                }
            }
            Phase::Playing => match room.on_player_removed(position, policy) {
                Ok(Some(outcome)) => self.publish_turn(code, outcome),
                Ok(None) => {}
                Err(err) => self.report(conn, code, err),
            },
            Phase::Waiting | Phase::Finished | Phase::Error => {}
        }
    }

    // -----------------------------------------------------------------
    // Outcomes
    // -----------------------------------------------------------------

    fn publish_answer(
        &mut self,
        conn: ConnectionId,
        code: &RoomCode,
        result: Result<AnswerOutcome, RoomError>,
    ) {
        match result {
            Ok(AnswerOutcome::Advanced(outcome)) => self.publish_turn(code, outcome),
            Ok(AnswerOutcome::Duplicate(Some(turn))) => self
                .notifier
                .send_to(conn, ServerEvent::CurrentPlayerAndQuestion(turn)),
            Ok(AnswerOutcome::Duplicate(None)) => {
                let event = match self.rooms.get_room(code).map(|room| room.phase) {
                    Some(Phase::Error) => ServerEvent::ServerError {
                        phase: Phase::Error,
                        message: format!("room {code} hit an unrecoverable error"),
                    },
                    _ => ServerEvent::FinishedState {
                        room_code: code.clone(),
                    },
                };
                self.notifier.send_to(conn, event);
            }
            Err(err) => self.report(conn, code, err),
        }
    }

    fn publish_turn(&mut self, code: &RoomCode, outcome: TurnOutcome) {
        match outcome {
            TurnOutcome::Turn(turn) => self.broadcast(code, ServerEvent::CurrentPlayerAndQuestion(turn)),
            TurnOutcome::Finished => self.finish_room(code),
        }
    }

    /// Tells the host, and only the host, that playing may start.
    fn signal_host(&mut self, code: &RoomCode, host: Option<ConnectionId>) {
        match host {
            Some(host) => self.notifier.send_to(
                host,
                ServerEvent::AllPlayersHaveSubmitted {
                    room_code: code.clone(),
                },
            ),
            None => tracing::warn!(room = %code, "host offline, ready signal deferred to rejoin"),
        }
    }

    fn finish_room(&mut self, code: &RoomCode) {
        tracing::info!(room = %code, "game finished");
        self.broadcast(
            code,
            ServerEvent::FinishedState {
                room_code: code.clone(),
            },
        );
        let at = Instant::now() + self.config.finished_cleanup_delay;
        self.rooms.schedule_cleanup(code, at);
    }

    /// Escalates a room-fatal error: the room enters `error`, everyone is
    /// told, and the room is scheduled for deletion.
    fn fail_room(&mut self, code: &RoomCode, err: &RoomError) {
        let Some(room) = self.rooms.get_room_mut(code) else {
            return;
        };
        tracing::error!(room = %code, phase = %room.phase, error = %err, "room failed");
        if let Err(transition) = room.transition(Phase::Error) {
            tracing::warn!(room = %code, error = %transition, "room already failed");
            return;
        }
        room.current_turn = None;

        self.broadcast(
            code,
            ServerEvent::ServerError {
                phase: Phase::Error,
                message: err.to_string(),
            },
        );
        let at = Instant::now() + self.config.error_cleanup_delay;
        self.rooms.schedule_cleanup(code, at);
    }

    /// Routes an error: room-fatal ones fail the room, the rest go back to
    /// the requester only.
    fn report(&mut self, conn: ConnectionId, code: &RoomCode, err: RoomError) {
        if err.is_room_fatal() {
            self.fail_room(code, &err);
            return;
        }
        tracing::warn!(%conn, room = %code, error = %err, "request rejected");
        self.notifier.send_to(
            conn,
            ServerEvent::Error {
                code: err.code(),
                message: err.to_string(),
            },
        );
    }

    fn broadcast(&mut self, code: &RoomCode, event: ServerEvent) {
        if let Some(room) = self.rooms.get_room(code) {
            self.notifier.broadcast(&room.connections(), &event);
        }
    }

    fn broadcast_roster(&mut self, code: &RoomCode) {
        if let Some(room) = self.rooms.get_room(code) {
            let roster = ServerEvent::EmitAllPlayers {
                players: room.roster(),
            };
            self.notifier.broadcast(&room.connections(), &roster);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<(ConnectionId, ServerEvent)>,
    }

    impl Notifier for Recorder {
        fn send_to(&mut self, conn: ConnectionId, event: ServerEvent) {
            self.sent.push((conn, event));
        }
    }

    fn engine() -> Engine<Recorder> {
        Engine::new(
            RoomConfig {
                rng_seed: Some(99),
                ..RoomConfig::default()
            },
            Recorder::default(),
        )
    }

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn create(engine: &mut Engine<Recorder>) -> RoomCode {
        engine.handle(
            conn(1),
            Some(1),
            ClientEvent::CreateRoom {
                player_name: "Host".into(),
                rounds: 1,
                enable_guessing: false,
            },
        );
        engine.rooms().room_codes().remove(0)
    }

    #[test]
    fn test_create_room_acks_with_request_id_and_host() {
        let mut engine = engine();
        create(&mut engine);

        let (to, event) = &engine.notifier().sent[0];
        assert_eq!(*to, conn(1));
        let ServerEvent::Ack(ack) = event else {
            panic!("expected ack, got {event:?}");
        };
        assert!(ack.success);
        assert_eq!(ack.request_id, Some(1));
        assert!(ack.player.as_ref().unwrap().is_host);
    }

    #[test]
    fn test_join_unknown_room_fails_ack_without_broadcast() {
        let mut engine = engine();
        engine.handle(
            conn(2),
            Some(5),
            ClientEvent::JoinRoom {
                room_code: RoomCode::new("NOPE00"),
                player_name: "B".into(),
            },
        );

        let sent = &engine.notifier().sent;
        assert_eq!(sent.len(), 1);
        let ServerEvent::Ack(ack) = &sent[0].1 else {
            panic!("expected ack");
        };
        assert!(!ack.success);
        assert_eq!(ack.request_id, Some(5));
    }

    #[test]
    fn test_non_host_cannot_start_submission() {
        let mut engine = engine();
        let code = create(&mut engine);
        for (id, name) in [(2, "B"), (3, "C")] {
            engine.handle(
                conn(id),
                None,
                ClientEvent::JoinRoom {
                    room_code: code.clone(),
                    player_name: name.into(),
                },
            );
        }
        engine.notifier_mut().sent.clear();

        engine.handle(conn(2), None, ClientEvent::HostStartSubmissionState { room_code: code.clone() });

        assert_eq!(
            engine.notifier().sent,
            vec![(
                conn(2),
                ServerEvent::Error {
                    code: 403,
                    message: RoomError::NotHost(code.clone()).to_string(),
                }
            )]
        );
        assert_eq!(engine.rooms().get_room(&code).unwrap().phase, Phase::Waiting);
    }

    #[test]
    fn test_ping_reaching_engine_sends_nothing() {
        let mut engine = engine();
        engine.handle(conn(4), None, ClientEvent::Ping { client_time: 77 });
        assert!(engine.notifier().sent.is_empty());
    }

    #[test]
    fn test_get_current_players_unknown_room_reports_404() {
        let mut engine = engine();
        engine.handle(
            conn(4),
            None,
            ClientEvent::GetCurrentPlayers {
                room_code: RoomCode::new("NOPE00"),
            },
        );
        assert!(matches!(
            engine.notifier().sent.as_slice(),
            [(_, ServerEvent::Error { code: 404, .. })]
        ));
    }

    #[test]
    fn test_disconnect_clears_connection_only() {
        let mut engine = engine();
        let code = create(&mut engine);
        engine.disconnect(conn(1));

        let room = engine.rooms().get_room(&code).unwrap();
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.players[0].connection, None);
    }
}
