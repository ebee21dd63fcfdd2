//! # Hotseat
//!
//! Server for a party game in which players write questions about each
//! other, then take turns answering the ones written about them.
//!
//! The server owns every room. Clients speak JSON over WebSocket; each
//! frame is an [`Envelope`](hotseat_protocol::Envelope) around a client or
//! server event.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hotseat::prelude::*;
//!
//! # async fn run() -> Result<(), HotseatError> {
//! let server = HotseatServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::HotseatError;
pub use server::{HotseatServer, HotseatServerBuilder};

/// Everything needed to run a server and talk to it.
pub mod prelude {
    pub use crate::{HotseatError, HotseatServer, HotseatServerBuilder};
    pub use hotseat_protocol::{
        Ack, ClientEvent, Codec, ConnectionId, CurrentTurn, Envelope, JsonCodec, Phase,
        PlayerId, PlayerView, QuestionDraft, QuestionId, RoomCode, RoomView, ServerEvent,
    };
    pub use hotseat_room::{EngineHandle, NoPendingPolicy, RoomConfig, RoomError, RoomInfo};
}
