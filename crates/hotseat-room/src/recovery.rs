//! Session recovery: re-attaching a returning player and replaying the
//! state they missed.

use hotseat_protocol::{ConnectionId, Phase, PlayerId, RoomCode, ServerEvent};

use crate::{RoomError, RoomManager};

impl RoomManager {
    /// Re-attaches `conn` to an existing player and returns the events that
    /// bring that connection up to date. The events are for `conn` alone.
    ///
    /// # Errors
    /// `RoomNotFound` or `PlayerNotFound`. Neither mutates the roster.
    pub fn recover_session(
        &mut self,
        code: &RoomCode,
        player_id: &PlayerId,
        conn: ConnectionId,
    ) -> Result<Vec<ServerEvent>, RoomError> {
        if let Err(err) = self.reattach(code, player_id, conn) {
            tracing::warn!(room = %code, player = %player_id, %conn, error = %err, "cannot rejoin");
            return Err(err);
        }
        let room = self.room(code)?;

        let mut events = vec![ServerEvent::EmitAllPlayers {
            players: room.roster(),
        }];
        match room.phase {
            Phase::Waiting => {}
            Phase::Submitting => {
                events.push(ServerEvent::SubmissionState { room: room.view() });
                events.push(ServerEvent::SubmissionCountUpdate {
                    total_submitted: room.total_submitted,
                    player_count: room.players.len(),
                });
                if &room.host_id == player_id && room.is_barrier_complete() {
                    events.push(ServerEvent::AllPlayersHaveSubmitted {
                        room_code: code.clone(),
                    });
                }
            }
            Phase::Playing => {
                if let Some(turn) = &room.current_turn {
                    events.push(ServerEvent::CurrentPlayerAndQuestion(turn.clone()));
                }
            }
            Phase::Finished => events.push(ServerEvent::FinishedState {
                room_code: code.clone(),
            }),
            Phase::Error => events.push(ServerEvent::ServerError {
                phase: Phase::Error,
                message: format!("room {code} hit an unrecoverable error"),
            }),
        }

        tracing::info!(room = %code, player = %player_id, phase = %room.phase, "session recovered");
        Ok(events)
    }
}
