//! Tool table record types.

use serde::{Deserialize, Serialize};

use crate::consts::{EMPTY_TOOL, TOOL_COMMENT_LEN};

/// Bounded tool comment, display only.
pub type ToolComment = heapless::String<TOOL_COMMENT_LEN>;

/// Tool length/position offset over all nine axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ToolOffset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub u: f64,
    pub v: f64,
    pub w: f64,
}

impl ToolOffset {
    /// Offset with only the Z component set (legacy tool length).
    pub fn z_only(z: f64) -> Self {
        Self {
            z,
            ..Self::default()
        }
    }
}

/// One tool table slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRecord {
    /// Tool number, `EMPTY_TOOL` when the slot holds nothing.
    pub tool_number: i32,
    /// Physical pocket the tool lives in (sequential changers).
    pub pocket_number: i32,
    pub offset: ToolOffset,
    pub diameter: f64,
    pub front_angle: f64,
    pub back_angle: f64,
    /// Lathe tool orientation code.
    pub orientation: i32,
    pub comment: ToolComment,
}

impl Default for ToolRecord {
    fn default() -> Self {
        Self::empty()
    }
}

impl ToolRecord {
    /// Empty slot: tool -1, every other field zero.
    pub fn empty() -> Self {
        Self {
            tool_number: EMPTY_TOOL,
            pocket_number: 0,
            offset: ToolOffset::default(),
            diameter: 0.0,
            front_angle: 0.0,
            back_angle: 0.0,
            orientation: 0,
            comment: ToolComment::new(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tool_number == EMPTY_TOOL
    }

    /// Tool number as reported for the spindle: an empty slot reads as 0.
    #[inline]
    pub fn spindle_tool(&self) -> i32 {
        if self.is_empty() { 0 } else { self.tool_number }
    }

    /// Replace the comment, truncating at a character boundary when it
    /// does not fit.
    pub fn set_comment(&mut self, text: &str) {
        self.comment.clear();
        for ch in text.chars() {
            if self.comment.push(ch).is_err() {
                break;
            }
        }
    }
}
