//! Named signal points.
//!
//! `Signal` maps a wire name like `"tool-prepare"` to a typed variant
//! carrying its direction (as seen from the controller), its value kind,
//! and whether it only exists under protocol V2.

use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

// ─── SignalDirection ────────────────────────────────────────────────

/// Direction of a point as seen from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SignalDirection {
    /// Driven by the external driver, read by the controller.
    In = 0,
    /// Driven by the controller, read by the external driver.
    Out = 1,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::In => write!(f, "in"),
            Self::Out => write!(f, "out"),
        }
    }
}

// ─── SignalKind ─────────────────────────────────────────────────────

/// Value kind of a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SignalKind {
    Bit = 0,
    S32 = 1,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit => write!(f, "bit"),
            Self::S32 => write!(f, "s32"),
        }
    }
}

// ─── Signal ─────────────────────────────────────────────────────────

/// Every named point the controller knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Signal {
    // ── Estop / enable ──────────────
    #[serde(rename = "user-enable-out")]
    UserEnableOut,
    #[serde(rename = "emc-enable-in")]
    EmcEnableIn,
    #[serde(rename = "user-request-enable")]
    UserRequestEnable,

    // ── Coolant / lube ──────────────
    #[serde(rename = "coolant-mist")]
    CoolantMist,
    #[serde(rename = "coolant-flood")]
    CoolantFlood,
    #[serde(rename = "lube")]
    Lube,
    #[serde(rename = "lube_level")]
    LubeLevel,

    // ── Prepare / change ────────────
    #[serde(rename = "tool-prepare")]
    ToolPrepare,
    #[serde(rename = "tool-prep-index")]
    ToolPrepIndex,
    #[serde(rename = "tool-prep-pocket")]
    ToolPrepPocket,
    #[serde(rename = "tool-prep-number")]
    ToolPrepNumber,
    #[serde(rename = "tool-number")]
    ToolNumber,
    #[serde(rename = "tool-prepared")]
    ToolPrepared,
    #[serde(rename = "tool-change")]
    ToolChange,
    #[serde(rename = "tool-changed")]
    ToolChanged,
    #[serde(rename = "state")]
    State,

    // ── V2 abort handshake ──────────
    #[serde(rename = "emc-abort")]
    EmcAbort,
    #[serde(rename = "emc-abort-ack")]
    EmcAbortAck,
    #[serde(rename = "emc-reason")]
    EmcReason,

    // ── V2 toolchanger fault ────────
    #[serde(rename = "toolchanger-fault")]
    ToolchangerFault,
    #[serde(rename = "toolchanger-fault-ack")]
    ToolchangerFaultAck,
    #[serde(rename = "toolchanger-reason")]
    ToolchangerReason,
    #[serde(rename = "toolchanger-faulted")]
    ToolchangerFaulted,
    #[serde(rename = "toolchanger-clear-fault")]
    ToolchangerClearFault,

    // ── V2 start-change handshake ───
    #[serde(rename = "start-change")]
    StartChange,
    #[serde(rename = "start-change-ack")]
    StartChangeAck,
}

impl Signal {
    /// All points, in registration order.
    pub const ALL: [Signal; 26] = [
        Self::UserEnableOut,
        Self::EmcEnableIn,
        Self::UserRequestEnable,
        Self::CoolantMist,
        Self::CoolantFlood,
        Self::Lube,
        Self::LubeLevel,
        Self::ToolPrepare,
        Self::ToolPrepIndex,
        Self::ToolPrepPocket,
        Self::ToolPrepNumber,
        Self::ToolNumber,
        Self::ToolPrepared,
        Self::ToolChange,
        Self::ToolChanged,
        Self::State,
        Self::EmcAbort,
        Self::EmcAbortAck,
        Self::EmcReason,
        Self::ToolchangerFault,
        Self::ToolchangerFaultAck,
        Self::ToolchangerReason,
        Self::ToolchangerFaulted,
        Self::ToolchangerClearFault,
        Self::StartChange,
        Self::StartChangeAck,
    ];

    /// Wire name of the point.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::UserEnableOut => "user-enable-out",
            Self::EmcEnableIn => "emc-enable-in",
            Self::UserRequestEnable => "user-request-enable",
            Self::CoolantMist => "coolant-mist",
            Self::CoolantFlood => "coolant-flood",
            Self::Lube => "lube",
            Self::LubeLevel => "lube_level",
            Self::ToolPrepare => "tool-prepare",
            Self::ToolPrepIndex => "tool-prep-index",
            Self::ToolPrepPocket => "tool-prep-pocket",
            Self::ToolPrepNumber => "tool-prep-number",
            Self::ToolNumber => "tool-number",
            Self::ToolPrepared => "tool-prepared",
            Self::ToolChange => "tool-change",
            Self::ToolChanged => "tool-changed",
            Self::State => "state",
            Self::EmcAbort => "emc-abort",
            Self::EmcAbortAck => "emc-abort-ack",
            Self::EmcReason => "emc-reason",
            Self::ToolchangerFault => "toolchanger-fault",
            Self::ToolchangerFaultAck => "toolchanger-fault-ack",
            Self::ToolchangerReason => "toolchanger-reason",
            Self::ToolchangerFaulted => "toolchanger-faulted",
            Self::ToolchangerClearFault => "toolchanger-clear-fault",
            Self::StartChange => "start-change",
            Self::StartChangeAck => "start-change-ack",
        }
    }

    /// Direction as seen from the controller.
    pub const fn direction(&self) -> SignalDirection {
        match self {
            Self::EmcEnableIn
            | Self::LubeLevel
            | Self::ToolPrepared
            | Self::ToolChanged
            | Self::EmcAbortAck
            | Self::ToolchangerFault
            | Self::ToolchangerReason
            | Self::ToolchangerClearFault
            | Self::StartChangeAck => SignalDirection::In,
            _ => SignalDirection::Out,
        }
    }

    /// Value kind.
    pub const fn kind(&self) -> SignalKind {
        match self {
            Self::ToolPrepIndex
            | Self::ToolPrepPocket
            | Self::ToolPrepNumber
            | Self::ToolNumber
            | Self::State
            | Self::EmcReason
            | Self::ToolchangerReason => SignalKind::S32,
            _ => SignalKind::Bit,
        }
    }

    /// True for points only registered under protocol V2.
    pub const fn is_v2_only(&self) -> bool {
        matches!(
            self,
            Self::EmcAbort
                | Self::EmcAbortAck
                | Self::EmcReason
                | Self::ToolchangerFault
                | Self::ToolchangerFaultAck
                | Self::ToolchangerReason
                | Self::ToolchangerFaulted
                | Self::ToolchangerClearFault
                | Self::StartChange
                | Self::StartChangeAck
        )
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Signal {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|signal| signal.name() == s)
            .ok_or_else(|| format!("unknown signal: {s:?}"))
    }
}
