//! I/O controller: one fixed-period cycle of input sampling, status
//! propagation and command dispatch.
//!
//! ## Cycle
//! 1. **Sample** (`read_inputs`): estop, lube level, then under V2 the
//!    toolchanger fault line and the abort/start-change handshakes, then
//!    the prepare and change handshakes. Produces an [`InputEvents`] mask.
//! 2. **Propagate**: push statuses for the observed events.
//! 3. **Dispatch**: at most one new command. Synchronous commands finish
//!    `DONE` on the spot; prepare/load/start-change stay `EXEC` until a
//!    later sample sees the acknowledgement.
//! 4. **Publish**: echo the serial, bump the heartbeat.
//!
//! After the cycle sleep, [`IoController::finish_cycle`] drops
//! `user-request-enable` so the next estop-off produces a fresh edge.

use std::path::Path;

use iocontrol_common::command::{CommandMessage, CommandType, IoCommand};
use iocontrol_common::config::{DebugFlags, IoSettings, ProtocolVersion};
use iocontrol_common::consts::{ABORT_BY_TOOLCHANGER_FAULT, NO_POCKET};
use iocontrol_common::signal::Signal;
use iocontrol_common::status::{CoolantStatus, IoStatus, RcsStatus, ToolchangerState};
use iocontrol_common::tool::ToolOffset;
use tracing::{debug, error, info, trace, warn};

use crate::channel::{ChannelError, CommandChannel};
use crate::signals::SignalBus;
use crate::state::{transition, InputEvents, ToolchangerEvent, ToolchangerFault};
use crate::tool_table::{ToolTable, ToolTableError};

/// Called with the new flags whenever `SET_DEBUG` changes them.
pub type DebugHook = Box<dyn FnMut(DebugFlags) + Send>;

/// What happened in one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Observations from input sampling.
    pub events: InputEvents,
    /// Command dispatched this cycle, if any.
    pub command: Option<CommandType>,
    /// Outcome published at the end of the cycle.
    pub outcome: RcsStatus,
}

pub struct IoController<S: SignalBus> {
    settings: IoSettings,
    signals: S,
    tools: ToolTable,
    status: IoStatus,
    state: ToolchangerState,
    fault: ToolchangerFault,
    /// Serial of the last dispatched command.
    last_serial: Option<i32>,
    debug: DebugFlags,
    debug_hook: Option<DebugHook>,
    /// A command was dispatched in the current cycle.
    dispatched: bool,
    /// The last change commit could not persist the table.
    persist_failed: bool,
    last_published_outcome: RcsStatus,
}

impl<S: SignalBus> IoController<S> {
    /// Load the configured tool table and bring every output to its safe
    /// default. A missing or unreadable table is fatal.
    pub fn new(settings: IoSettings, signals: S) -> Result<Self, ToolTableError> {
        let mut tools = ToolTable::new(&settings.tool_table, settings.random_toolchanger);
        let count = tools.load(&settings.tool_table)?;
        info!(
            "tool table {}: {count} tools ({} changer)",
            settings.tool_table.display(),
            if settings.random_toolchanger { "random" } else { "sequential" }
        );
        Ok(Self::with_table(settings, signals, tools))
    }

    /// Build around an already loaded table.
    pub fn with_table(settings: IoSettings, signals: S, tools: ToolTable) -> Self {
        let debug = settings.debug_flags();
        let mut controller = Self {
            signals,
            tools,
            status: IoStatus {
                debug: debug.bits(),
                ..IoStatus::default()
            },
            state: ToolchangerState::Idle,
            fault: ToolchangerFault::default(),
            last_serial: None,
            debug,
            debug_hook: None,
            dispatched: false,
            persist_failed: false,
            last_published_outcome: RcsStatus::Done,
            settings,
        };

        controller.reset_outputs();
        let spindle = if controller.tools.is_random() {
            controller.tools.spindle().spindle_tool()
        } else {
            0
        };
        controller.status.tool.tool_in_spindle = spindle;
        controller.signals.write_s32(Signal::ToolNumber, spindle);
        controller
    }

    pub fn set_debug_hook(&mut self, hook: impl FnMut(DebugFlags) + Send + 'static) {
        self.debug_hook = Some(Box::new(hook));
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub fn status(&self) -> &IoStatus {
        &self.status
    }

    #[inline]
    pub fn state(&self) -> ToolchangerState {
        self.state
    }

    #[inline]
    pub fn fault(&self) -> ToolchangerFault {
        self.fault
    }

    #[inline]
    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    #[inline]
    pub fn signals(&self) -> &S {
        &self.signals
    }

    /// Driver-side access, for the simulator and tests.
    #[inline]
    pub fn signals_mut(&mut self) -> &mut S {
        &mut self.signals
    }

    #[inline]
    pub fn settings(&self) -> &IoSettings {
        &self.settings
    }

    #[inline]
    pub fn debug_flags(&self) -> DebugFlags {
        self.debug
    }

    #[inline]
    fn protocol(&self) -> ProtocolVersion {
        self.settings.protocol_version
    }

    #[inline]
    fn is_v2(&self) -> bool {
        self.protocol().is_v2()
    }

    // ─── Cycle ──────────────────────────────────────────────────────

    /// Sample, propagate, dispatch and publish once.
    pub fn run_cycle<C: CommandChannel>(
        &mut self,
        channel: &mut C,
    ) -> Result<CycleReport, ChannelError> {
        self.dispatched = false;

        let events = self.read_inputs();
        if !events.is_empty() {
            trace!("input events {events:?}");
        }
        self.propagate_status(events, channel)?;

        let mut command = None;
        if let Some(msg) = channel.try_receive()? {
            if Some(msg.serial_number) == self.last_serial {
                trace!("serial {} already processed", msg.serial_number);
            } else {
                command = Some(msg.command.command_type());
                self.dispatch(msg, events);
            }
        }

        self.publish(channel)?;
        Ok(CycleReport {
            events,
            command,
            outcome: self.status.outcome,
        })
    }

    /// End-of-cycle housekeeping, run after the cycle sleep.
    pub fn finish_cycle(&mut self) {
        if self.dispatched {
            self.signals.write_bit(Signal::UserRequestEnable, false);
        }
    }

    // ─── Step A: input sampling ─────────────────────────────────────

    /// Sample every input and advance the handshakes.
    pub fn read_inputs(&mut self) -> InputEvents {
        use ToolchangerEvent::*;

        let mut events = InputEvents::empty();

        let estop = !self.signals.read_bit(Signal::EmcEnableIn);
        if estop != self.status.estop {
            info!("estop {}", if estop { "asserted" } else { "released" });
            self.status.estop = estop;
            events |= InputEvents::ESTOP_CHANGED;
        }

        let lube_level = self.signals.read_bit(Signal::LubeLevel);
        if lube_level != self.status.lube.level {
            if lube_level {
                info!("lube level ok");
            } else {
                warn!("lube level low");
            }
            self.status.lube.level = lube_level;
            events |= InputEvents::LUBELEVEL_CHANGED;
        }

        if self.is_v2() {
            events |= self.sample_fault();

            if self.signals.read_bit(Signal::EmcAbort) {
                if self.signals.read_bit(Signal::EmcAbortAck) {
                    self.signals.write_bit(Signal::EmcAbort, false);
                    debug!("toolchanger acknowledged abort");
                    events |= self.apply(AbortAcked);
                } else {
                    events |= self.apply(AbortPending);
                }
            }

            if self.signals.read_bit(Signal::StartChange) {
                if self.signals.read_bit(Signal::StartChangeAck) {
                    self.signals.write_bit(Signal::StartChange, false);
                    events |= self.apply(StartChangeAcked);
                } else {
                    events |= self.apply(StartChangePending);
                }
            }
        }

        if self.signals.read_bit(Signal::ToolPrepare) {
            if self.signals.read_bit(Signal::ToolPrepared) {
                let pocket = self.signals.read_s32(Signal::ToolPrepIndex);
                self.status.tool.pocket_prepared = pocket;
                self.signals.write_bit(Signal::ToolPrepare, false);
                debug!("prepare complete, pocket {pocket}");
                events |= self.apply(PrepareAcked);
            } else {
                events |= self.apply(PreparePending);
            }
        }

        if self.signals.read_bit(Signal::ToolChange) {
            // A latched fault wins over a simultaneous tool-changed.
            if self.is_v2() && self.fault.faulted {
                self.fault.reason = self.signals.read_s32(Signal::ToolchangerReason);
                warn!(
                    "tool change aborted by toolchanger fault, reason {}",
                    self.fault.reason
                );
                self.signals
                    .write_s32(Signal::EmcReason, ABORT_BY_TOOLCHANGER_FAULT);
                self.signals.write_bit(Signal::EmcAbort, true);
                self.signals.write_bit(Signal::ToolChange, false);
                events |= self.apply(LateFault);
            } else if self.signals.read_bit(Signal::ToolChanged) {
                self.commit_change();
                events |= self.apply(ChangeAcked);
            } else {
                events |= self.apply(ChangePending);
            }
        }

        events
    }

    /// V2 fault line and clear-fault line.
    fn sample_fault(&mut self) -> InputEvents {
        let mut events = InputEvents::empty();
        let fault_line = self.signals.read_bit(Signal::ToolchangerFault);

        if fault_line {
            let reason = self.signals.read_s32(Signal::ToolchangerReason);
            if !self.fault.faulted || self.fault.reason != reason {
                warn!("toolchanger fault signaled, reason {reason}");
            }
            self.fault.latch(reason);
            self.signals.write_bit(Signal::ToolchangerFaultAck, true);
            self.signals.write_bit(Signal::ToolchangerFaulted, true);
            events |= InputEvents::TC_FAULT;
        } else {
            self.signals.write_bit(Signal::ToolchangerFaultAck, false);
        }

        // Clearing only takes effect once the fault line itself is low.
        if self.signals.read_bit(Signal::ToolchangerClearFault) && !fault_line {
            if self.fault.faulted {
                info!("toolchanger fault cleared");
            }
            self.fault.clear();
            self.signals.write_bit(Signal::ToolchangerFaulted, false);
            events.remove(InputEvents::TC_FAULT);
        }
        events
    }

    /// `tool-changed` seen: the prepared tool is now in the spindle.
    fn commit_change(&mut self) {
        let prepared = self.status.tool.pocket_prepared;
        self.signals.write_bit(Signal::ToolChange, false);

        if prepared < 0 {
            warn!("tool-changed with nothing prepared, ignored");
            return;
        }

        let tool = if !self.tools.is_random() && prepared == 0 {
            0
        } else {
            self.tools
                .get(prepared)
                .map_or(0, |rec| rec.spindle_tool())
        };
        self.status.tool.tool_in_spindle = tool;
        self.signals.write_s32(Signal::ToolNumber, tool);

        if let Err(e) = self.tools.load_tool(prepared) {
            error!("tool change to pocket {prepared}: {e}");
            self.persist_failed = true;
        }

        self.status.tool.pocket_prepared = NO_POCKET;
        self.signals.write_s32(Signal::ToolPrepNumber, 0);
        self.signals.write_s32(Signal::ToolPrepPocket, 0);
        self.signals.write_s32(Signal::ToolPrepIndex, 0);
        info!("tool {tool} loaded from pocket {prepared}");
    }

    fn apply(&mut self, event: ToolchangerEvent) -> InputEvents {
        let t = transition(self.state, event, self.protocol());
        self.set_state(t.next);
        t.emitted
    }

    fn set_state(&mut self, next: ToolchangerState) {
        if next != self.state {
            debug!("toolchanger {} -> {next}", self.state);
            self.state = next;
        }
        self.signals.write_s32(Signal::State, next.as_pin());
    }

    // ─── Step B: status propagation ─────────────────────────────────

    fn command_in_flight(&self) -> bool {
        self.status.outcome == RcsStatus::Exec || self.state.is_busy()
    }

    fn propagate_status<C: CommandChannel>(
        &mut self,
        events: InputEvents,
        channel: &mut C,
    ) -> Result<(), ChannelError> {
        if events.intersects(InputEvents::PROACTIVE) {
            // An open command keeps its serial so the echo never goes back.
            if !self.command_in_flight() {
                self.status.echo_serial_number = self.last_serial.unwrap_or(0).wrapping_add(1);
                self.status.outcome = RcsStatus::Done;
            }
            self.push_status(channel)?;
        }

        if events.contains(InputEvents::PREPARING) {
            self.status.outcome = RcsStatus::Exec;
            self.push_status(channel)?;
        }

        if events.intersects(InputEvents::IN_PROGRESS) {
            self.status.outcome = if self.fault.faulted {
                RcsStatus::Error
            } else {
                RcsStatus::Exec
            };
            self.push_status(channel)?;
        }

        if events.intersects(InputEvents::COMPLETIONS) {
            self.status.outcome = if std::mem::take(&mut self.persist_failed) {
                RcsStatus::Error
            } else {
                RcsStatus::Done
            };
            self.push_status(channel)?;
        }
        Ok(())
    }

    /// Status push driven by an input change rather than a command.
    fn push_status<C: CommandChannel>(&mut self, channel: &mut C) -> Result<(), ChannelError> {
        self.status.command_type = CommandType::IoStat;
        self.publish(channel)
    }

    fn publish<C: CommandChannel>(&mut self, channel: &mut C) -> Result<(), ChannelError> {
        self.status.fault = self.fault.faulted;
        self.status.reason = self.fault.reason;
        self.status.state = self.state;
        self.status.heartbeat = self.status.heartbeat.wrapping_add(1);

        if self.status.outcome != self.last_published_outcome {
            debug!(
                serial = self.status.echo_serial_number,
                "outcome {} -> {}", self.last_published_outcome, self.status.outcome
            );
            self.last_published_outcome = self.status.outcome;
        }
        channel.publish(&self.status)
    }

    // ─── Step C: command dispatch ───────────────────────────────────

    fn dispatch(&mut self, msg: CommandMessage, events: InputEvents) {
        let CommandMessage {
            serial_number,
            command,
        } = msg;
        let command_type = command.command_type();
        debug!(serial = serial_number, "{command_type}: {command:?}");

        self.status.outcome = self.execute(command, events);
        self.status.command_type = command_type;
        self.status.echo_serial_number = serial_number;
        self.last_serial = Some(serial_number);
        self.dispatched = true;
    }

    fn execute(&mut self, command: IoCommand, events: InputEvents) -> RcsStatus {
        match command {
            IoCommand::Empty => RcsStatus::Done,
            IoCommand::Init => {
                self.reset_outputs();
                RcsStatus::Done
            }
            IoCommand::ToolInit => self.reload_table(None),
            IoCommand::ToolHalt => {
                debug!("tool halt");
                RcsStatus::Done
            }
            IoCommand::ToolAbort { reason } => {
                self.abort(reason);
                RcsStatus::Done
            }
            IoCommand::ToolPrepare { pocket, tool } => self.prepare(pocket, tool, events),
            IoCommand::ToolLoad => self.load(events),
            IoCommand::ToolStartChange => self.start_change(events),
            IoCommand::ToolUnload => {
                self.status.tool.tool_in_spindle = 0;
                RcsStatus::Done
            }
            IoCommand::ToolLoadToolTable { file } => self.reload_table(file.as_deref()),
            IoCommand::ToolSetOffset {
                pocket,
                tool_number,
                offset,
                diameter,
                front_angle,
                back_angle,
                orientation,
            } => self.set_offset(
                pocket,
                tool_number,
                offset,
                diameter,
                front_angle,
                back_angle,
                orientation,
            ),
            IoCommand::ToolSetNumber { pocket } => self.set_number(pocket),
            IoCommand::CoolantMistOn => self.set_mist(true),
            IoCommand::CoolantMistOff => self.set_mist(false),
            IoCommand::CoolantFloodOn => self.set_flood(true),
            IoCommand::CoolantFloodOff => self.set_flood(false),
            IoCommand::AuxEstopOn => {
                self.signals.write_bit(Signal::UserEnableOut, false);
                self.reset_outputs();
                RcsStatus::Done
            }
            IoCommand::AuxEstopOff => {
                self.signals.write_bit(Signal::UserEnableOut, true);
                // rising edge resets an external latch
                self.signals.write_bit(Signal::UserRequestEnable, true);
                RcsStatus::Done
            }
            IoCommand::AuxEstopReset => RcsStatus::Done,
            IoCommand::LubeOn => self.set_lube(true),
            IoCommand::LubeOff => self.set_lube(false),
            IoCommand::SetDebug { debug } => {
                self.set_debug(debug);
                RcsStatus::Done
            }
            IoCommand::Unknown => {
                warn!("unknown command ignored");
                RcsStatus::Done
            }
        }
    }

    /// Drive every output to its safe default.
    fn reset_outputs(&mut self) {
        for signal in [
            Signal::UserEnableOut,
            Signal::UserRequestEnable,
            Signal::CoolantMist,
            Signal::CoolantFlood,
            Signal::Lube,
            Signal::ToolPrepare,
            Signal::ToolChange,
        ] {
            self.signals.write_bit(signal, false);
        }
        for signal in [
            Signal::ToolPrepNumber,
            Signal::ToolPrepPocket,
            Signal::ToolPrepIndex,
        ] {
            self.signals.write_s32(signal, 0);
        }
        self.status.coolant = CoolantStatus::default();
        self.status.lube.on = false;

        if self.is_v2() {
            self.signals.write_bit(Signal::EmcAbort, false);
            self.signals.write_s32(Signal::EmcReason, 0);
            self.signals.write_bit(Signal::ToolchangerFaultAck, false);
            self.signals.write_bit(Signal::ToolchangerFaulted, false);
            self.signals.write_bit(Signal::StartChange, false);
            // re-latched on the next sample if the fault line is still high
            self.fault.clear();
        }
        self.apply(ToolchangerEvent::Reset);
    }

    fn abort(&mut self, reason: i32) {
        warn!("tool abort, reason {reason}");
        self.set_mist(false);
        self.set_flood(false);

        if self.is_v2() {
            // abort goes up before the requests drop
            self.signals.write_s32(Signal::EmcReason, reason);
            self.signals.write_bit(Signal::EmcAbort, true);
        }
        self.signals.write_bit(Signal::ToolChange, false);
        self.signals.write_bit(Signal::ToolPrepare, false);
        self.signals.write_bit(Signal::StartChange, false);
        self.apply(ToolchangerEvent::AbortRequested);
    }

    fn prepare(&mut self, pocket: i32, tool: i32, events: InputEvents) -> RcsStatus {
        let random = self.tools.is_random();
        if random && pocket == 0 {
            debug!("prepare of the spindle pocket ignored");
            return RcsStatus::Done;
        }
        let Some(rec) = self.tools.get(pocket) else {
            error!("prepare: pocket {pocket} out of range");
            return RcsStatus::Error;
        };

        let (number, phys_pocket) = if !random && pocket == 0 {
            (0, 0)
        } else {
            if rec.is_empty() {
                warn!("prepare: pocket {pocket} is empty, requested tool {tool}");
            } else if rec.tool_number != tool {
                warn!(
                    "prepare: pocket {pocket} holds tool {}, requested {tool}",
                    rec.tool_number
                );
            }
            let number = if rec.is_empty() { tool } else { rec.tool_number };
            (number, if random { pocket } else { rec.pocket_number })
        };

        if self.fault.faulted {
            info!(
                "prepare with toolchanger faulted (reason {}), next change will {}",
                self.fault.reason,
                if self.fault.is_soft() { "report the fault" } else { "abort" }
            );
        }

        self.signals.write_s32(Signal::ToolPrepIndex, pocket);
        self.signals.write_s32(Signal::ToolPrepPocket, phys_pocket);
        self.signals.write_s32(Signal::ToolPrepNumber, number);
        self.signals.write_bit(Signal::ToolPrepare, true);
        self.apply(ToolchangerEvent::PrepareRequested);

        if events.contains(InputEvents::PREPARE_COMPLETE) {
            RcsStatus::Done
        } else {
            RcsStatus::Exec
        }
    }

    fn load(&mut self, events: InputEvents) -> RcsStatus {
        let prepared = self.status.tool.pocket_prepared;
        let random = self.tools.is_random();

        if random && prepared == 0 {
            debug!("load from the spindle pocket ignored");
            return RcsStatus::Done;
        }
        if !random
            && prepared > 0
            && self.tools.get(prepared).map(|rec| rec.tool_number)
                == Some(self.status.tool.tool_in_spindle)
        {
            debug!("tool {} already in spindle", self.status.tool.tool_in_spindle);
            return RcsStatus::Done;
        }
        if prepared == NO_POCKET {
            debug!("load with nothing prepared ignored");
            return RcsStatus::Done;
        }

        self.signals.write_bit(Signal::ToolChange, true);
        self.apply(ToolchangerEvent::ChangeRequested);

        if events.contains(InputEvents::CHANGE_COMPLETE) {
            RcsStatus::Done
        } else {
            RcsStatus::Exec
        }
    }

    fn start_change(&mut self, events: InputEvents) -> RcsStatus {
        if !(self.is_v2() && self.settings.support_start_change) {
            trace!("start-change not enabled");
            return RcsStatus::Done;
        }
        self.signals.write_bit(Signal::StartChange, true);
        self.apply(ToolchangerEvent::StartChangeRequested);

        if events.contains(InputEvents::START_CHANGE_ACKED) {
            RcsStatus::Done
        } else {
            RcsStatus::Exec
        }
    }

    /// Reload the table, from `file` or the configured path, and resync
    /// the spindle slot.
    fn reload_table(&mut self, file: Option<&Path>) -> RcsStatus {
        let path = file
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(self.settings.tool_table.as_path())
            .to_path_buf();

        match self.tools.load(&path) {
            Ok(count) => info!("reloaded {count} tools from {}", path.display()),
            Err(e) => {
                error!("{e}");
                return RcsStatus::Error;
            }
        }
        match self.tools.reload_tool_number(self.status.tool.tool_in_spindle) {
            Ok(()) => RcsStatus::Done,
            Err(e) => {
                error!("{e}");
                RcsStatus::Error
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn set_offset(
        &mut self,
        pocket: i32,
        tool_number: i32,
        offset: ToolOffset,
        diameter: f64,
        front_angle: f64,
        back_angle: f64,
        orientation: i32,
    ) -> RcsStatus {
        match self.tools.set_offset(
            pocket,
            tool_number,
            offset,
            diameter,
            front_angle,
            back_angle,
            orientation,
        ) {
            Ok(()) => RcsStatus::Done,
            Err(e) => {
                error!("set offset, pocket {pocket}: {e}");
                RcsStatus::Error
            }
        }
    }

    fn set_number(&mut self, pocket: i32) -> RcsStatus {
        let result = self.tools.load_tool(pocket);
        let tool = self.tools.spindle().spindle_tool();
        self.status.tool.tool_in_spindle = tool;
        self.signals.write_s32(Signal::ToolNumber, tool);
        match result {
            Ok(()) => {
                debug!("spindle set from pocket {pocket}, tool {tool}");
                RcsStatus::Done
            }
            Err(e) => {
                error!("set number, pocket {pocket}: {e}");
                RcsStatus::Error
            }
        }
    }

    fn set_mist(&mut self, on: bool) -> RcsStatus {
        self.status.coolant.mist = on;
        self.signals.write_bit(Signal::CoolantMist, on);
        RcsStatus::Done
    }

    fn set_flood(&mut self, on: bool) -> RcsStatus {
        self.status.coolant.flood = on;
        self.signals.write_bit(Signal::CoolantFlood, on);
        RcsStatus::Done
    }

    fn set_lube(&mut self, on: bool) -> RcsStatus {
        self.status.lube.on = on;
        self.signals.write_bit(Signal::Lube, on);
        RcsStatus::Done
    }

    fn set_debug(&mut self, bits: u32) {
        let flags = DebugFlags::from_bits_retain(bits);
        if flags != self.debug {
            info!("debug flags 0x{:08x} -> 0x{bits:08x}", self.debug.bits());
            self.debug = flags;
            if let Some(hook) = self.debug_hook.as_mut() {
                hook(flags);
            }
        }
        self.status.debug = bits;
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
