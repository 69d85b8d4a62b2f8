//! System-wide constants for the iocontrol workspace.
//!
//! Single source of truth for table capacity, default timing and
//! the reason codes shared with the toolchanger.

use static_assertions::const_assert;

/// Number of tool table slots, pocket 0 (spindle) included.
pub const MAX_POCKETS: usize = 1001;

/// Maximum length of a tool comment in bytes.
pub const TOOL_COMMENT_LEN: usize = 256;

/// Default cycle period in seconds.
pub const DEFAULT_CYCLE_TIME_S: f64 = 0.1;

/// Longest accepted cycle period in seconds.
pub const MAX_CYCLE_TIME_S: f64 = 60.0;

/// Default tool table file name.
pub const DEFAULT_TOOL_TABLE: &str = "tool.tbl";

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/iocontrol.toml";

/// Abort reason sent by an operator/user abort.
pub const ABORT_BY_USER: i32 = 100;

/// Abort reason raised on `emc-reason` when a latched toolchanger fault
/// cancels a tool change.
pub const ABORT_BY_TOOLCHANGER_FAULT: i32 = ABORT_BY_USER + 1;

/// Pocket index meaning "nothing prepared".
pub const NO_POCKET: i32 = -1;

/// Tool number stored in an empty pocket.
pub const EMPTY_TOOL: i32 = -1;

const_assert!(MAX_POCKETS > 1);
const_assert!(MAX_POCKETS <= i32::MAX as usize);
