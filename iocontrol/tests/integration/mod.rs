mod abort;
mod end_to_end;
mod faults;
mod status;

use iocontrol::channel::MemoryChannel;
use iocontrol::controller::{CycleReport, IoController};
use iocontrol::signals::{SignalBus, SignalTable};
use iocontrol_common::command::{CommandMessage, IoCommand};
use iocontrol_common::config::{IoSettings, ProtocolVersion};
use iocontrol_common::signal::Signal;
use iocontrol_common::status::IoStatus;
use tempfile::TempDir;

/// Sequential table: index 3 holds tool 7.
pub const SEQUENTIAL_TABLE: &str = "\
T1 P1 Z0.5 ;one
T2 P2 Z0.25 ;two
T7 P3 Z1.5 D0.25 ;seven
T12 P4 ;twelve
";

/// Controller, channel and a tool table on disk. The test acts as the
/// external driver.
pub struct Rig {
    pub dir: TempDir,
    pub io: IoController<SignalTable>,
    pub ch: MemoryChannel,
    serial: i32,
}

impl Rig {
    pub fn new(protocol: ProtocolVersion, random: bool, table: &str) -> Self {
        Self::with_settings(
            IoSettings {
                protocol_version: protocol,
                random_toolchanger: random,
                support_start_change: true,
                ..IoSettings::default()
            },
            table,
        )
    }

    pub fn with_settings(mut settings: IoSettings, table: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tool.tbl");
        std::fs::write(&path, table).unwrap();
        settings.tool_table = path;

        let mut signals = SignalTable::new(settings.protocol_version);
        signals.drive_bit(Signal::LubeLevel, true);
        let io = IoController::new(settings, signals).unwrap();
        Self {
            dir,
            io,
            ch: MemoryChannel::new(),
            serial: 0,
        }
    }

    /// Queue `command` with the next serial and run one cycle.
    pub fn send(&mut self, command: IoCommand) -> (i32, CycleReport) {
        self.serial += 1;
        let serial = self.serial;
        self.ch.send(CommandMessage::new(serial, command));
        (serial, self.cycle())
    }

    pub fn cycle(&mut self) -> CycleReport {
        let report = self.io.run_cycle(&mut self.ch).unwrap();
        self.io.finish_cycle();
        report
    }

    pub fn drive(&mut self, signal: Signal, value: bool) {
        self.io.signals_mut().drive_bit(signal, value);
    }

    pub fn drive_s32(&mut self, signal: Signal, value: i32) {
        self.io.signals_mut().drive_s32(signal, value);
    }

    pub fn out(&self, signal: Signal) -> bool {
        self.io.signals().read_bit(signal)
    }

    pub fn out_s32(&self, signal: Signal) -> i32 {
        self.io.signals().read_s32(signal)
    }

    pub fn last(&self) -> &IoStatus {
        self.ch.last_status().unwrap()
    }
}
