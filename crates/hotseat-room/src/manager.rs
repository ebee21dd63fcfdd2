//! Room store and roster manager.
//!
//! [`RoomManager`] owns every [`Room`], the engine's random source, the
//! connection index and the per-room cleanup deadlines. Nothing here is
//! shared: the manager lives inside the engine actor and is only touched by
//! one task.

use std::collections::HashMap;

use hotseat_protocol::{ConnectionId, PlayerId, RoomCode};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::time::Instant;

use crate::{Player, Room, RoomConfig, RoomError, RoomInfo, ids};

/// Result of removing a player from a room.
#[derive(Debug)]
pub enum Departure {
    /// The player left; the room goes on. `position` is where the player sat
    /// in the roster before removal.
    Left { player: Player, position: usize },
    /// The host left or the roster emptied; the room is gone. `room` holds
    /// the remaining players so they can still be told.
    RoomClosed { player: Player, room: Room },
}

/// Manages all active rooms and maps live connections to their player.
pub struct RoomManager {
    rooms: HashMap<RoomCode, Room>,

    /// Which player each live connection currently serves. A connection
    /// serves at most one player at a time.
    connections: HashMap<ConnectionId, (RoomCode, PlayerId)>,

    /// At most one pending deletion per room.
    cleanups: HashMap<RoomCode, Instant>,

    rng: StdRng,
    config: RoomConfig,
}

impl RoomManager {
    /// Creates an empty store. The random source is seeded from
    /// `config.rng_seed` when set, from the OS otherwise.
    pub fn new(config: RoomConfig) -> Self {
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rooms: HashMap::new(),
            connections: HashMap::new(),
            cleanups: HashMap::new(),
            rng,
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Creates a waiting room with a fresh host player.
    ///
    /// # Errors
    /// [`RoomError::InvalidName`] for a blank name,
    /// [`RoomError::InvalidRounds`] when `rounds` is 0 or could never be
    /// satisfied by a full room.
    pub fn create_room(
        &mut self,
        host_name: &str,
        rounds: usize,
        enable_guessing: bool,
        conn: ConnectionId,
    ) -> Result<&Room, RoomError> {
        let name = validate_name(host_name)?;
        let max = self.config.max_rounds();
        if rounds == 0 || rounds > max {
            return Err(RoomError::InvalidRounds { rounds, max });
        }

        let rooms = &self.rooms;
        let code = ids::room_code(&mut self.rng, self.config.room_code_length, |c| {
            rooms.contains_key(c)
        });
        let host_id = ids::player_id(&mut self.rng);
        let host = Player::new(host_id.clone(), name, true, Some(conn));

        tracing::info!(room = %code, host = %host_id, rounds, "room created");
        self.index_connection(conn, &code, &host_id);
        let room = self
            .rooms
            .entry(code)
            .or_insert_with_key(|code| Room::new(code.clone(), host, rounds, enable_guessing));
        Ok(room)
    }

    pub fn get_room(&self, code: &RoomCode) -> Option<&Room> {
        self.rooms.get(code)
    }

    pub fn get_room_mut(&mut self, code: &RoomCode) -> Option<&mut Room> {
        self.rooms.get_mut(code)
    }

    /// Like [`get_room`](Self::get_room) but with a typed miss.
    pub fn room(&self, code: &RoomCode) -> Result<&Room, RoomError> {
        self.rooms
            .get(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))
    }

    /// Borrows a room together with the random source.
    pub fn room_and_rng(
        &mut self,
        code: &RoomCode,
    ) -> Result<(&mut Room, &mut StdRng), RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        Ok((room, &mut self.rng))
    }

    /// Appends a new player to a waiting room.
    ///
    /// # Errors
    /// `RoomNotFound`, `RoomFull` at the configured cap, `RoomNotJoinable`
    /// outside `waiting`, `InvalidName` for a blank name.
    pub fn add_player(
        &mut self,
        code: &RoomCode,
        name: &str,
        conn: ConnectionId,
    ) -> Result<&Player, RoomError> {
        let name = validate_name(name)?;
        let max_players = self.config.max_players;
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        if room.players.len() >= max_players {
            return Err(RoomError::RoomFull(code.clone()));
        }
        if !room.phase.is_joinable() {
            return Err(RoomError::RoomNotJoinable {
                room: code.clone(),
                phase: room.phase,
            });
        }

        let id = ids::player_id(&mut self.rng);
        room.players
            .push(Player::new(id.clone(), name, false, Some(conn)));
        tracing::info!(
            room = %code,
            player = %id,
            players = room.players.len(),
            "player joined"
        );

        self.index_connection(conn, code, &id);
        self.rooms
            .get(code)
            .and_then(|room| room.players.last())
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))
    }

    /// Removes a player. Deletes the room when the host leaves or the roster
    /// becomes empty.
    pub fn remove_player(
        &mut self,
        code: &RoomCode,
        player_id: &PlayerId,
    ) -> Result<Departure, RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        let position = room.position(player_id).ok_or_else(|| {
            RoomError::PlayerNotFound {
                room: code.clone(),
                player: player_id.clone(),
            }
        })?;

        let player = room.players.remove(position);
        if let Some(conn) = player.connection {
            self.connections.remove(&conn);
        }
        tracing::info!(room = %code, player = %player_id, "player left");

        let closes = player.id == room.host_id || room.players.is_empty();
        if closes {
            let room = self.delete_room(code).ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
            return Ok(Departure::RoomClosed { player, room });
        }
        Ok(Departure::Left { player, position })
    }

    /// Points an existing player at a new connection.
    ///
    /// # Errors
    /// `RoomNotFound` or `PlayerNotFound`; nothing is mutated on failure.
    pub fn reattach(
        &mut self,
        code: &RoomCode,
        player_id: &PlayerId,
        conn: ConnectionId,
    ) -> Result<(), RoomError> {
        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::RoomNotFound(code.clone()))?;
        let player = room.player_mut(player_id).ok_or_else(|| {
            RoomError::PlayerNotFound {
                room: code.clone(),
                player: player_id.clone(),
            }
        })?;

        if let Some(old) = player.connection.replace(conn) {
            if old != conn {
                self.connections.remove(&old);
            }
        }
        tracing::info!(room = %code, player = %player_id, %conn, "player re-attached");
        self.index_connection(conn, code, player_id);
        Ok(())
    }

    /// Clears the connection reference of whichever player `conn` served.
    /// The player stays in the roster.
    pub fn detach_connection(
        &mut self,
        conn: ConnectionId,
    ) -> Option<(RoomCode, PlayerId)> {
        let (code, player_id) = self.connections.remove(&conn)?;
        if let Some(player) = self
            .rooms
            .get_mut(&code)
            .and_then(|room| room.player_mut(&player_id))
        {
            if player.connection == Some(conn) {
                player.connection = None;
            }
        }
        tracing::debug!(room = %code, player = %player_id, %conn, "connection detached");
        Some((code, player_id))
    }

    /// The player a connection currently serves.
    pub fn player_for(&self, conn: ConnectionId) -> Option<&(RoomCode, PlayerId)> {
        self.connections.get(&conn)
    }

    /// Removes a room outright, cancelling its cleanup deadline.
    pub fn delete_room(&mut self, code: &RoomCode) -> Option<Room> {
        let room = self.rooms.remove(code)?;
        self.cleanups.remove(code);
        self.connections.retain(|_, (rc, _)| rc != code);
        tracing::info!(room = %code, "room deleted");
        Some(room)
    }

    /// Schedules deletion of `code` at `at`, replacing any earlier deadline.
    pub fn schedule_cleanup(&mut self, code: &RoomCode, at: Instant) {
        if self.cleanups.insert(code.clone(), at).is_some() {
            tracing::debug!(room = %code, "cleanup rescheduled");
        }
    }

    pub fn cleanup_deadline(&self, code: &RoomCode) -> Option<Instant> {
        self.cleanups.get(code).copied()
    }

    /// The earliest pending cleanup deadline.
    pub fn next_cleanup(&self) -> Option<Instant> {
        self.cleanups.values().min().copied()
    }

    /// Deletes every room whose deadline is at or before `now`.
    pub fn run_due_cleanups(&mut self, now: Instant) -> Vec<RoomCode> {
        let due: Vec<RoomCode> = self
            .cleanups
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(code, _)| code.clone())
            .collect();
        for code in &due {
            self.delete_room(code);
        }
        due
    }

    pub fn room_info(&self, code: &RoomCode) -> Option<RoomInfo> {
        self.rooms
            .get(code)
            .map(|room| room.info(self.config.max_players))
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn room_codes(&self) -> Vec<RoomCode> {
        self.rooms.keys().cloned().collect()
    }

    /// Records that `conn` now serves `player_id`. If the connection served
    /// someone else before, that player loses the reference.
    fn index_connection(&mut self, conn: ConnectionId, code: &RoomCode, player_id: &PlayerId) {
        let previous = self
            .connections
            .insert(conn, (code.clone(), player_id.clone()));
        if let Some((old_code, old_player)) = previous {
            if &old_code == code && &old_player == player_id {
                return;
            }
            if let Some(player) = self
                .rooms
                .get_mut(&old_code)
                .and_then(|room| room.player_mut(&old_player))
            {
                if player.connection == Some(conn) {
                    player.connection = None;
                }
            }
        }
    }
}

fn validate_name(name: &str) -> Result<&str, RoomError> {
    let name = name.trim();
    if name.is_empty() {
        Err(RoomError::InvalidName)
    } else {
        Ok(name)
    }
}
