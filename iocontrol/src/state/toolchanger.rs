//! Toolchanger handshake transitions.
//!
//! IDLE → PREPARING → IDLE, IDLE → CHANGING → IDLE and, under V2,
//! IDLE ⇄ START_CHANGE plus any state → WAIT_FOR_ABORT_ACK → IDLE.
//!
//! [`transition`] is the whole table: the controller samples its inputs,
//! classifies each handshake into a [`ToolchangerEvent`] and applies it.
//! Under V1 the V2-only events are inert.

use iocontrol_common::config::ProtocolVersion;
use iocontrol_common::status::ToolchangerState;

use super::events::InputEvents;

/// Input to the handshake table, from sampled lines or dispatched commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchangerEvent {
    // ── Sampled handshakes ──────────
    /// `tool-prepare` high, `tool-prepared` low.
    PreparePending,
    /// `tool-prepare` high, `tool-prepared` high.
    PrepareAcked,
    /// `tool-change` high, `tool-changed` low.
    ChangePending,
    /// `tool-change` high, `tool-changed` high.
    ChangeAcked,
    /// `tool-change` high while a fault is latched (V2).
    LateFault,
    /// `emc-abort` high, `emc-abort-ack` low (V2).
    AbortPending,
    /// `emc-abort` high, `emc-abort-ack` high (V2).
    AbortAcked,
    /// `start-change` high, `start-change-ack` low (V2).
    StartChangePending,
    /// `start-change` high, `start-change-ack` high (V2).
    StartChangeAcked,

    // ── Commands ────────────────────
    /// TOOL_PREPARE raised `tool-prepare`.
    PrepareRequested,
    /// TOOL_LOAD raised `tool-change`.
    ChangeRequested,
    /// TOOL_START_CHANGE raised `start-change` (V2).
    StartChangeRequested,
    /// TOOL_ABORT dropped every request.
    AbortRequested,
    /// Outputs reset to safe defaults (INIT, estop on).
    Reset,
}

impl ToolchangerEvent {
    /// True for events that only exist under protocol V2.
    pub const fn is_v2_only(&self) -> bool {
        matches!(
            self,
            Self::LateFault
                | Self::AbortPending
                | Self::AbortAcked
                | Self::StartChangePending
                | Self::StartChangeAcked
                | Self::StartChangeRequested
        )
    }
}

/// Outcome of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: ToolchangerState,
    pub emitted: InputEvents,
}

impl Transition {
    const fn to(next: ToolchangerState, emitted: InputEvents) -> Self {
        Self { next, emitted }
    }
}

/// Apply `event` to `state`.
pub fn transition(
    state: ToolchangerState,
    event: ToolchangerEvent,
    protocol: ProtocolVersion,
) -> Transition {
    use ToolchangerEvent::*;
    use ToolchangerState::*;

    if event.is_v2_only() && !protocol.is_v2() {
        return Transition::to(state, InputEvents::empty());
    }

    match event {
        PreparePending => Transition::to(Preparing, InputEvents::PREPARING),
        PrepareAcked => Transition::to(Idle, InputEvents::PREPARE_COMPLETE),
        ChangePending => Transition::to(Changing, InputEvents::CHANGING),
        ChangeAcked => Transition::to(Idle, InputEvents::CHANGE_COMPLETE),
        LateFault => Transition::to(WaitForAbortAck, InputEvents::TC_ABORT),
        // Abort still outstanding: whoever is waiting keeps waiting.
        AbortPending => Transition::to(state, InputEvents::EMC_ABORT_SIGNALED),
        AbortAcked => Transition::to(Idle, InputEvents::EMC_ABORT_ACKED),
        StartChangePending => Transition::to(state, InputEvents::START_CHANGE),
        StartChangeAcked => Transition::to(Idle, InputEvents::START_CHANGE_ACKED),

        PrepareRequested => Transition::to(Preparing, InputEvents::empty()),
        ChangeRequested => Transition::to(Changing, InputEvents::empty()),
        StartChangeRequested => Transition::to(StartChange, InputEvents::empty()),
        AbortRequested if protocol.is_v2() => Transition::to(WaitForAbortAck, InputEvents::empty()),
        AbortRequested => Transition::to(Idle, InputEvents::empty()),
        Reset => Transition::to(Idle, InputEvents::empty()),
    }
}

// ─── Fault record ───────────────────────────────────────────────────

/// Latched toolchanger fault.
///
/// `reason > 0` is informational, `reason < 0` a hard error, `0` carries
/// no message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ToolchangerFault {
    pub faulted: bool,
    pub reason: i32,
}

impl ToolchangerFault {
    /// Latch a fault with `reason`.
    #[inline]
    pub fn latch(&mut self, reason: i32) {
        self.faulted = true;
        self.reason = reason;
    }

    #[inline]
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Hard error: the pending change must be aborted.
    #[inline]
    pub const fn is_hard(&self) -> bool {
        self.faulted && self.reason <= 0
    }

    /// Informational fault.
    #[inline]
    pub const fn is_soft(&self) -> bool {
        self.faulted && self.reason > 0
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
