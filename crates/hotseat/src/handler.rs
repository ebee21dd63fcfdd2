//! Per-connection handler.
//!
//! Each accepted connection gets two tasks:
//!   1. the reader (this handler): decode frames, answer pings, forward
//!      everything else to the engine
//!   2. the writer: drain the connection's outbound channel, which both
//!      the engine and the reader feed, and encode each event into a frame

use std::sync::Arc;
use std::time::Instant;

use hotseat_protocol::{ClientEvent, Codec, ConnectionId, Envelope, ServerEvent};
use hotseat_room::EngineHandle;
use hotseat_transport::{
    Connection, FrameReader, FrameWriter, WebSocketConnection, WebSocketReader, WebSocketWriter,
};
use tokio::sync::mpsc;

use crate::HotseatError;
use crate::server::ServerState;

/// Drop guard that detaches the connection from the engine when the
/// handler exits, panics included. `Drop` is synchronous, so the
/// notification is spawned.
struct ConnectionGuard {
    conn: ConnectionId,
    engine: EngineHandle,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let conn = self.conn;
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let _ = engine.disconnect(conn).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), HotseatError> {
    let conn_id = conn.id();
    let start = Instant::now();
    tracing::debug!(%conn_id, "handling new connection");

    let (mut reader, writer) = conn.into_split();
    let (tx, rx) = mpsc::unbounded_channel();
    state.engine.connect(conn_id, tx.clone()).await?;
    let guard = ConnectionGuard {
        conn: conn_id,
        engine: state.engine.clone(),
    };
    let writer_task = tokio::spawn(write_loop(writer, rx, Arc::clone(&state), start));

    let result = read_loop(&mut reader, conn_id, &tx, &state, start).await;

    // The writer stops once the engine has dropped its sender too.
    drop(guard);
    drop(tx);
    let _ = writer_task.await;
    result
}

async fn read_loop<C: Codec>(
    reader: &mut WebSocketReader,
    conn_id: ConnectionId,
    tx: &mpsc::UnboundedSender<ServerEvent>,
    state: &ServerState<C>,
    start: Instant,
) -> Result<(), HotseatError> {
    loop {
        let data = match tokio::time::timeout(state.idle_timeout, reader.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                return Ok(());
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Ok(());
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, closing");
                return Ok(());
            }
        };

        let envelope: Envelope<ClientEvent> = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                let _ = tx.send(ServerEvent::Error {
                    code: 400,
                    message: format!("invalid frame: {e}"),
                });
                continue;
            }
        };

        match envelope.event {
            ClientEvent::Ping { client_time } => {
                let _ = tx.send(ServerEvent::Pong {
                    client_time,
                    server_time: start.elapsed().as_millis() as u64,
                });
            }
            event => {
                state
                    .engine
                    .dispatch(conn_id, envelope.request_id, event)
                    .await?;
            }
        }
    }
}

/// Encodes outbound events until every sender is gone or the peer stops
/// accepting frames.
async fn write_loop<C: Codec>(
    mut writer: WebSocketWriter,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState<C>>,
    start: Instant,
) {
    let mut seq: u64 = 1;
    while let Some(event) = rx.recv().await {
        let mut envelope = Envelope::new(
            next_seq(&mut seq),
            start.elapsed().as_millis() as u64,
            event,
        );
        if let ServerEvent::Ack(ack) = &envelope.event {
            envelope.request_id = ack.request_id;
        }

        let bytes = match state.codec.encode(&envelope) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(event = envelope.event.name(), error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = writer.send(&bytes).await {
            tracing::debug!(error = %e, "send failed, stopping writer");
            break;
        }
    }
    let _ = writer.close().await;
}

/// Increments and returns the next sequence number.
fn next_seq(seq: &mut u64) -> u64 {
    let current = *seq;
    *seq += 1;
    current
}
