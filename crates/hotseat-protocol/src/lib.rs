//! Wire protocol for Hotseat.
//!
//! - **Types** ([`RoomCode`], [`PlayerId`], [`Phase`], [`RoomView`], ...):
//!   identifiers and the views of game state that clients render.
//! - **Events** ([`ClientEvent`], [`ServerEvent`], [`Envelope`]): the named
//!   events of the game, request/acknowledgement pairs included.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): bytes in, events out.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope<ClientEvent>) → Room engine
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use events::{Ack, ClientEvent, Envelope, ServerEvent};
pub use hotseat_transport::ConnectionId;
pub use types::{
    AssignedTarget, CurrentTurn, Phase, PlayerId, PlayerSummary, PlayerView,
    Question, QuestionDraft, QuestionId, QuestionSummary, RoomCode, RoomView,
};
