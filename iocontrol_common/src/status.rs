//! Status snapshot published by the I/O controller every cycle.

use core::fmt;
use serde::{Deserialize, Serialize};

use crate::command::CommandType;
use crate::consts::NO_POCKET;

// ─── RcsStatus ──────────────────────────────────────────────────────

/// Completion state of the last dispatched command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RcsStatus {
    /// Finished.
    #[default]
    Done,
    /// Still running, completion is reported on a later cycle.
    Exec,
    /// Failed.
    Error,
}

impl fmt::Display for RcsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => write!(f, "DONE"),
            Self::Exec => write!(f, "EXEC"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

// ─── ToolchangerState ───────────────────────────────────────────────

/// Toolchanger handshake state, as driven on the `state` pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum ToolchangerState {
    #[default]
    Idle = 0,
    Preparing = 1,
    StartChange = 2,
    Changing = 3,
    WaitForAbortAck = 4,
}

impl ToolchangerState {
    /// Value written to the `state` pin.
    #[inline]
    pub const fn as_pin(&self) -> i32 {
        *self as i32
    }

    /// True while a prepare/start-change/change handshake is open.
    #[inline]
    pub const fn is_busy(&self) -> bool {
        matches!(self, Self::Preparing | Self::StartChange | Self::Changing)
    }
}

impl fmt::Display for ToolchangerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Preparing => write!(f, "PREPARING"),
            Self::StartChange => write!(f, "START_CHANGE"),
            Self::Changing => write!(f, "CHANGING"),
            Self::WaitForAbortAck => write!(f, "WAIT_FOR_ABORT_ACK"),
        }
    }
}

// ─── Sub-records ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    /// Tool number in the spindle, 0 for none.
    pub tool_in_spindle: i32,
    /// Table index of the prepared tool, `NO_POCKET` for none.
    pub pocket_prepared: i32,
}

impl Default for ToolStatus {
    fn default() -> Self {
        Self {
            tool_in_spindle: 0,
            pocket_prepared: NO_POCKET,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoolantStatus {
    pub mist: bool,
    pub flood: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LubeStatus {
    pub on: bool,
    /// Lube level ok.
    pub level: bool,
}

impl Default for LubeStatus {
    fn default() -> Self {
        Self {
            on: false,
            level: true,
        }
    }
}

// ─── IoStatus ───────────────────────────────────────────────────────

/// Externally visible snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoStatus {
    pub command_type: CommandType,
    pub echo_serial_number: i32,
    pub heartbeat: u64,
    pub outcome: RcsStatus,
    pub tool: ToolStatus,
    pub coolant: CoolantStatus,
    pub lube: LubeStatus,
    pub estop: bool,
    /// Toolchanger fault latched.
    pub fault: bool,
    /// Toolchanger reason code: > 0 informational, < 0 hard error.
    pub reason: i32,
    pub state: ToolchangerState,
    pub debug: u32,
}

impl Default for IoStatus {
    /// Startup snapshot: estop asserted, lube level ok, nothing prepared.
    fn default() -> Self {
        Self {
            command_type: CommandType::None,
            echo_serial_number: 0,
            heartbeat: 0,
            outcome: RcsStatus::Done,
            tool: ToolStatus::default(),
            coolant: CoolantStatus::default(),
            lube: LubeStatus::default(),
            estop: true,
            fault: false,
            reason: 0,
            state: ToolchangerState::Idle,
            debug: 0,
        }
    }
}
