//! Prelude module for common re-exports.
//!
//! ```rust
//! use iocontrol_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{
    ConfigError, ConfigLoader, DebugFlags, IoControlConfig, IoSettings, LogLevel,
    ProtocolVersion, SharedConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{ABORT_BY_TOOLCHANGER_FAULT, EMPTY_TOOL, MAX_POCKETS, NO_POCKET};

// ─── Signals ────────────────────────────────────────────────────────
pub use crate::signal::{Signal, SignalDirection, SignalKind};

// ─── Messages ───────────────────────────────────────────────────────
pub use crate::command::{CommandMessage, CommandType, IoCommand};
pub use crate::status::{IoStatus, RcsStatus, ToolchangerState};
pub use crate::tool::{ToolOffset, ToolRecord};
