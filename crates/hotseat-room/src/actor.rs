//! Engine actor: one Tokio task that owns every room.
//!
//! Connection handlers never touch room state. They send commands through
//! an mpsc channel and the actor applies them one at a time, so a room is
//! never mutated from two places at once. The same task also fires the
//! deferred room cleanups.

use hotseat_protocol::{ClientEvent, ConnectionId, RoomCode};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{ChannelNotifier, Engine, OutboundSender, RoomConfig, RoomError, RoomInfo};

/// Commands sent to the engine actor through its channel.
///
/// The `oneshot::Sender` in some variants is the reply channel.
pub(crate) enum EngineCommand {
    /// Register a connection's outbound channel.
    Connect {
        conn: ConnectionId,
        sender: OutboundSender,
    },

    /// Forget a connection and detach it from its player.
    Disconnect { conn: ConnectionId },

    /// A decoded client event.
    Event {
        conn: ConnectionId,
        request_id: Option<u64>,
        event: ClientEvent,
    },

    RoomInfo {
        code: RoomCode,
        reply: oneshot::Sender<Option<RoomInfo>>,
    },

    RoomCount { reply: oneshot::Sender<usize> },

    Shutdown,
}

/// Handle to the running engine actor. Cheap to clone.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    /// Registers `conn` so the engine can push events to it.
    pub async fn connect(&self, conn: ConnectionId, sender: OutboundSender) -> Result<(), RoomError> {
        self.send(EngineCommand::Connect { conn, sender }).await
    }

    pub async fn disconnect(&self, conn: ConnectionId) -> Result<(), RoomError> {
        self.send(EngineCommand::Disconnect { conn }).await
    }

    /// Forwards a client event (fire-and-forget). Replies arrive on the
    /// connection's outbound channel.
    pub async fn dispatch(
        &self,
        conn: ConnectionId,
        request_id: Option<u64>,
        event: ClientEvent,
    ) -> Result<(), RoomError> {
        self.send(EngineCommand::Event {
            conn,
            request_id,
            event,
        })
        .await
    }

    pub async fn room_info(&self, code: RoomCode) -> Result<Option<RoomInfo>, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::RoomInfo {
            code,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)
    }

    pub async fn room_count(&self) -> Result<usize, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(EngineCommand::RoomCount { reply: reply_tx }).await?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)
    }

    /// Stops the actor. Rooms are dropped with it.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.send(EngineCommand::Shutdown).await
    }

    async fn send(&self, cmd: EngineCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Unavailable)
    }
}

struct EngineActor {
    engine: Engine<ChannelNotifier>,
    receiver: mpsc::Receiver<EngineCommand>,
}

impl EngineActor {
    async fn run(mut self) {
        tracing::info!("engine actor started");

        loop {
            let deadline = self.engine.next_cleanup();
            let cmd = tokio::select! {
                cmd = self.receiver.recv() => cmd,
                () = sleep_until_opt(deadline) => {
                    self.engine.run_due_cleanups(Instant::now());
                    continue;
                }
            };

            match cmd {
                Some(EngineCommand::Connect { conn, sender }) => {
                    self.engine.notifier_mut().register(conn, sender);
                    tracing::debug!(%conn, "connection registered");
                }
                Some(EngineCommand::Disconnect { conn }) => {
                    self.engine.notifier_mut().unregister(conn);
                    self.engine.disconnect(conn);
                }
                Some(EngineCommand::Event {
                    conn,
                    request_id,
                    event,
                }) => self.engine.handle(conn, request_id, event),
                Some(EngineCommand::RoomInfo { code, reply }) => {
                    let _ = reply.send(self.engine.rooms().room_info(&code));
                }
                Some(EngineCommand::RoomCount { reply }) => {
                    let _ = reply.send(self.engine.rooms().room_count());
                }
                Some(EngineCommand::Shutdown) => {
                    tracing::info!("engine shutting down");
                    break;
                }
                None => break,
            }
        }

        tracing::info!(rooms = self.engine.rooms().room_count(), "engine actor stopped");
    }
}

/// Sleeps until `deadline`, or forever when there is none.
async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Spawns the engine actor and returns a handle to it.
///
/// `channel_size` bounds the command queue; senders wait when it is full.
pub fn spawn_engine(config: RoomConfig, channel_size: usize) -> EngineHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let actor = EngineActor {
        engine: Engine::new(config, ChannelNotifier::new()),
        receiver: rx,
    };
    tokio::spawn(actor.run());
    EngineHandle { sender: tx }
}
