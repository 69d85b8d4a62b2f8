//! Typed commands delivered to the I/O controller.
//!
//! On the wire a command is a flat JSON object carrying its serial number
//! and a `"type"` tag:
//!
//! ```json
//! {"serial_number": 12, "type": "TOOL_PREPARE", "pocket": 3, "tool": 7}
//! ```
//!
//! Unrecognised tags decode to [`IoCommand::Unknown`] and are treated as
//! completed no-ops by the controller.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::ABORT_BY_USER;
use crate::tool::ToolOffset;

fn default_abort_reason() -> i32 {
    ABORT_BY_USER
}

// ─── IoCommand ──────────────────────────────────────────────────────

/// Command payload, one variant per command type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IoCommand {
    /// Empty message slot. Never dispatched.
    #[serde(rename = "NONE")]
    Empty,

    Init,
    ToolInit,
    ToolHalt,
    ToolAbort {
        #[serde(default = "default_abort_reason")]
        reason: i32,
    },
    ToolPrepare {
        pocket: i32,
        #[serde(default)]
        tool: i32,
    },
    ToolLoad,
    ToolStartChange,
    ToolUnload,
    ToolLoadToolTable {
        /// Table to load; `None` reloads the configured file.
        #[serde(default)]
        file: Option<PathBuf>,
    },
    ToolSetOffset {
        pocket: i32,
        tool_number: i32,
        #[serde(default)]
        offset: ToolOffset,
        #[serde(default)]
        diameter: f64,
        #[serde(default)]
        front_angle: f64,
        #[serde(default)]
        back_angle: f64,
        #[serde(default)]
        orientation: i32,
    },
    ToolSetNumber {
        pocket: i32,
    },

    CoolantMistOn,
    CoolantMistOff,
    CoolantFloodOn,
    CoolantFloodOff,

    AuxEstopOn,
    AuxEstopOff,
    AuxEstopReset,

    LubeOn,
    LubeOff,

    SetDebug {
        debug: u32,
    },

    #[serde(other)]
    Unknown,
}

impl IoCommand {
    /// Payload-free discriminant.
    pub const fn command_type(&self) -> CommandType {
        match self {
            Self::Empty => CommandType::None,
            Self::Init => CommandType::Init,
            Self::ToolInit => CommandType::ToolInit,
            Self::ToolHalt => CommandType::ToolHalt,
            Self::ToolAbort { .. } => CommandType::ToolAbort,
            Self::ToolPrepare { .. } => CommandType::ToolPrepare,
            Self::ToolLoad => CommandType::ToolLoad,
            Self::ToolStartChange => CommandType::ToolStartChange,
            Self::ToolUnload => CommandType::ToolUnload,
            Self::ToolLoadToolTable { .. } => CommandType::ToolLoadToolTable,
            Self::ToolSetOffset { .. } => CommandType::ToolSetOffset,
            Self::ToolSetNumber { .. } => CommandType::ToolSetNumber,
            Self::CoolantMistOn => CommandType::CoolantMistOn,
            Self::CoolantMistOff => CommandType::CoolantMistOff,
            Self::CoolantFloodOn => CommandType::CoolantFloodOn,
            Self::CoolantFloodOff => CommandType::CoolantFloodOff,
            Self::AuxEstopOn => CommandType::AuxEstopOn,
            Self::AuxEstopOff => CommandType::AuxEstopOff,
            Self::AuxEstopReset => CommandType::AuxEstopReset,
            Self::LubeOn => CommandType::LubeOn,
            Self::LubeOff => CommandType::LubeOff,
            Self::SetDebug { .. } => CommandType::SetDebug,
            Self::Unknown => CommandType::Unknown,
        }
    }
}

// ─── CommandType ────────────────────────────────────────────────────

/// Discriminant echoed in every status snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandType {
    #[default]
    None,
    Init,
    ToolInit,
    ToolHalt,
    ToolAbort,
    ToolPrepare,
    ToolLoad,
    ToolStartChange,
    ToolUnload,
    ToolLoadToolTable,
    ToolSetOffset,
    ToolSetNumber,
    CoolantMistOn,
    CoolantMistOff,
    CoolantFloodOn,
    CoolantFloodOff,
    AuxEstopOn,
    AuxEstopOff,
    AuxEstopReset,
    LubeOn,
    LubeOff,
    SetDebug,
    Unknown,
    /// Status pushed on an input change, not in answer to a command.
    IoStat,
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ─── CommandMessage ─────────────────────────────────────────────────

/// A command together with the serial number the supervisor assigned to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMessage {
    pub serial_number: i32,
    #[serde(flatten)]
    pub command: IoCommand,
}

impl CommandMessage {
    pub fn new(serial_number: i32, command: IoCommand) -> Self {
        Self {
            serial_number,
            command,
        }
    }

    /// True for an empty slot, which carries nothing to process.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self.command, IoCommand::Empty)
    }
}
