//! `HotseatServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → engine actor.

use std::sync::Arc;
use std::time::Duration;

use hotseat_protocol::{Codec, JsonCodec};
use hotseat_room::{EngineHandle, RoomConfig, spawn_engine};
use hotseat_transport::{Transport, WebSocketTransport};

use crate::HotseatError;
use crate::handler::handle_connection;

/// State shared by every connection task.
pub(crate) struct ServerState<C: Codec> {
    pub(crate) engine: EngineHandle,
    pub(crate) codec: C,
    pub(crate) idle_timeout: Duration,
}

/// Builder for configuring and starting a Hotseat server.
///
/// # Example
///
/// ```rust,no_run
/// use hotseat::prelude::*;
///
/// # async fn run() -> Result<(), HotseatError> {
/// let server = HotseatServer::builder()
///     .bind("0.0.0.0:3000")
///     .room_config(RoomConfig { max_players: 15, ..RoomConfig::default() })
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct HotseatServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
    idle_timeout: Duration,
    command_buffer: usize,
}

impl HotseatServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            room_config: RoomConfig::default(),
            idle_timeout: Duration::from_secs(30),
            command_buffer: 256,
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Drops connections that send nothing for this long. Clients keep
    /// alive with `ping`.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Capacity of the engine's command queue.
    pub fn command_buffer(mut self, size: usize) -> Self {
        self.command_buffer = size.max(1);
        self
    }

    /// Binds the transport and spawns the engine actor.
    ///
    /// Must be called inside a Tokio runtime.
    pub async fn build(self) -> Result<HotseatServer<JsonCodec>, HotseatError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let engine = spawn_engine(self.room_config, self.command_buffer);

        let state = Arc::new(ServerState {
            engine,
            codec: JsonCodec,
            idle_timeout: self.idle_timeout,
        });
        Ok(HotseatServer { transport, state })
    }
}

impl Default for HotseatServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Hotseat server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct HotseatServer<C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<C>>,
}

impl HotseatServer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> HotseatServerBuilder {
        HotseatServerBuilder::new()
    }
}

impl<C: Codec> HotseatServer<C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// A handle to the engine, for room queries.
    pub fn engine(&self) -> EngineHandle {
        self.state.engine.clone()
    }

    /// Runs the accept loop, spawning a handler task per connection.
    /// Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), HotseatError> {
        tracing::info!(addr = ?self.local_addr().ok(), "Hotseat server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
