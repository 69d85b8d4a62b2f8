//! Toolchanger state machine module root.
//!
//! `events` holds the per-cycle observation mask, `toolchanger` the
//! handshake transition table and fault record.

pub mod events;
pub mod toolchanger;

pub use events::InputEvents;
pub use toolchanger::{transition, ToolchangerEvent, ToolchangerFault, Transition};
