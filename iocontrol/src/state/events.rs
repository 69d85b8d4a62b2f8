//! Per-cycle observation mask produced by input sampling.

use bitflags::bitflags;

bitflags! {
    /// Transitions observed while sampling inputs in one cycle.
    ///
    /// Bit values match the toolchanger protocol's event mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct InputEvents: u32 {
        /// Prepare requested, not yet acknowledged.
        const PREPARING          = 0x0001;
        /// `tool-prepared` seen; prepare finished.
        const PREPARE_COMPLETE   = 0x0002;
        /// Change requested, not yet acknowledged.
        const CHANGING           = 0x0004;
        /// `tool-changed` seen; change committed.
        const CHANGE_COMPLETE    = 0x0008;
        /// Toolchanger fault line asserted.
        const TC_FAULT           = 0x0010;
        /// Change cancelled by a latched toolchanger fault.
        const TC_ABORT           = 0x0020;
        /// Abort raised, waiting for the toolchanger.
        const EMC_ABORT_SIGNALED = 0x0040;
        /// Toolchanger acknowledged the abort.
        const EMC_ABORT_ACKED    = 0x0080;
        const ESTOP_CHANGED      = 0x0100;
        const LUBELEVEL_CHANGED  = 0x0200;
        /// Start-change raised, not yet acknowledged.
        const START_CHANGE       = 0x0400;
        const START_CHANGE_ACKED = 0x0800;
    }
}

impl Default for InputEvents {
    fn default() -> Self {
        Self::empty()
    }
}

impl InputEvents {
    /// Events that push an unsolicited DONE status.
    pub const PROACTIVE: Self = Self::ESTOP_CHANGED.union(Self::LUBELEVEL_CHANGED);

    /// Events that complete an open command.
    pub const COMPLETIONS: Self = Self::PREPARE_COMPLETE
        .union(Self::CHANGE_COMPLETE)
        .union(Self::START_CHANGE_ACKED);

    /// Events that report a command still running, or failed on a fault.
    pub const IN_PROGRESS: Self = Self::START_CHANGE
        .union(Self::CHANGING)
        .union(Self::TC_ABORT);
}
