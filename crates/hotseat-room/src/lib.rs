//! Room core for Hotseat.
//!
//! Everything that happens to a room lives here: the store and roster,
//! balanced target assignment, the submission barrier, the turn sequencer
//! and session recovery. All of it is owned by a single engine actor, so
//! no room is ever locked.
//!
//! # Key types
//!
//! - [`RoomManager`]: owns rooms, the random source and cleanup deadlines
//! - [`Room`] / [`Player`]: the entities, with phase logic as methods
//! - [`Engine`]: dispatches client events and emits server events
//! - [`EngineHandle`]: talk to the running engine actor
//! - [`RoomConfig`]: roster limits, retry bound, cleanup delays

mod actor;
mod assignment;
mod barrier;
mod config;
mod engine;
mod error;
mod ids;
mod manager;
mod model;
mod notifier;
mod recovery;
mod sequencer;

pub use actor::{EngineHandle, spawn_engine};
pub use assignment::{Assignment, assign_targets, assign_with, check_precondition, generate};
pub use barrier::SubmissionOutcome;
pub use config::{NoPendingPolicy, RoomConfig};
pub use engine::Engine;
pub use error::RoomError;
pub use manager::{Departure, RoomManager};
pub use model::{Player, Room, RoomInfo};
pub use notifier::{ChannelNotifier, Notifier, OutboundSender};
pub use sequencer::{AnswerOutcome, TurnOutcome};
