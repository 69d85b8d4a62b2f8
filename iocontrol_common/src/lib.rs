//! iocontrol Common Library
//!
//! Shared vocabulary for the I/O controller and its clients: constants,
//! configuration loading, signal names, tool records, and the typed
//! command/status messages exchanged with the motion/task supervisor.
//!
//! # Module Structure
//!
//! - [`consts`] - Pocket capacity, default paths, abort reasons
//! - [`config`] - TOML configuration record and loader
//! - [`signal`] - Named signal points (direction, kind, protocol version)
//! - [`tool`] - Tool table record types
//! - [`command`] - Typed commands with serial numbers
//! - [`status`] - Published status snapshot and toolchanger state
//! - [`prelude`] - Common re-exports for convenience

pub mod command;
pub mod config;
pub mod consts;
pub mod prelude;
pub mod signal;
pub mod status;
pub mod tool;
