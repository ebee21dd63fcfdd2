//! Unified error type for the Hotseat server.

use hotseat_protocol::ProtocolError;
use hotseat_room::RoomError;
use hotseat_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum HotseatError {
    /// Connection, send or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The engine rejected a request or is gone.
    #[error(transparent)]
    Room(#[from] RoomError),
}
