//! Integration test: published status stream.

use iocontrol::state::InputEvents;
use iocontrol_common::command::{CommandMessage, CommandType, IoCommand};
use iocontrol_common::config::ProtocolVersion;
use iocontrol_common::signal::Signal;
use iocontrol_common::status::{IoStatus, RcsStatus};

use super::{Rig, SEQUENTIAL_TABLE};

fn assert_monotonic(statuses: &[IoStatus]) {
    for pair in statuses.windows(2) {
        assert!(
            pair[1].heartbeat > pair[0].heartbeat,
            "heartbeat {} -> {}",
            pair[0].heartbeat,
            pair[1].heartbeat
        );
        assert!(
            pair[1].echo_serial_number >= pair[0].echo_serial_number,
            "echo {} -> {}",
            pair[0].echo_serial_number,
            pair[1].echo_serial_number
        );
    }
}

#[test]
fn heartbeat_and_echo_monotonic() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.send(IoCommand::LubeOn);
    rig.send(IoCommand::ToolPrepare { pocket: 3, tool: 7 });
    rig.drive(Signal::LubeLevel, false);
    rig.cycle();
    rig.drive(Signal::ToolPrepared, true);
    rig.cycle();
    rig.drive(Signal::EmcEnableIn, true);
    rig.cycle();
    rig.send(IoCommand::CoolantMistOn);
    rig.drive(Signal::LubeLevel, true);
    rig.cycle();
    rig.cycle();

    let statuses = rig.ch.take_published();
    assert!(statuses.len() >= 7);
    assert_monotonic(&statuses);
}

#[test]
fn prepare_done_only_after_completion() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.ch.take_published();

    let (n, _) = rig.send(IoCommand::ToolPrepare { pocket: 3, tool: 7 });
    // Unsolicited pushes while the prepare is open keep serial and EXEC.
    rig.drive(Signal::LubeLevel, false);
    rig.cycle();
    rig.drive(Signal::EmcEnableIn, true);
    rig.cycle();
    let before: Vec<IoStatus> = rig.ch.take_published();
    assert!(
        before
            .iter()
            .all(|s| !(s.echo_serial_number == n && s.outcome == RcsStatus::Done))
    );

    rig.drive(Signal::ToolPrepared, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::PREPARE_COMPLETE));
    let after = rig.ch.take_published();
    assert!(
        after
            .iter()
            .any(|s| s.echo_serial_number == n && s.outcome == RcsStatus::Done)
    );
}

#[test]
fn estop_change_pushes_unsolicited_done() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    let (n, _) = rig.send(IoCommand::AuxEstopOff);
    assert!(rig.out(Signal::UserEnableOut));
    rig.ch.take_published();

    rig.drive(Signal::EmcEnableIn, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::ESTOP_CHANGED));

    let pushed = rig.ch.take_published();
    assert!(pushed.len() >= 2);
    assert!(!pushed[0].estop);
    assert_eq!(pushed[0].echo_serial_number, n + 1);
    assert_eq!(pushed[0].outcome, RcsStatus::Done);
    assert_eq!(pushed[0].command_type, CommandType::IoStat);
}

#[test]
fn completion_push_carries_status_type() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.send(IoCommand::CoolantFloodOn);
    assert_eq!(rig.last().command_type, CommandType::CoolantFloodOn);

    rig.send(IoCommand::ToolPrepare { pocket: 3, tool: 7 });
    rig.ch.take_published();
    rig.drive(Signal::ToolPrepared, true);
    rig.cycle();
    let pushed = rig.ch.take_published();
    assert!(pushed.len() >= 2);
    assert_eq!(pushed[0].command_type, CommandType::IoStat);
    assert_eq!(pushed[0].outcome, RcsStatus::Done);

    rig.drive(Signal::ToolPrepared, false);
    rig.send(IoCommand::LubeOn);
    assert_eq!(rig.last().command_type, CommandType::LubeOn);
}

#[test]
fn lube_level_low_reported() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.cycle();
    assert!(rig.last().lube.level);

    rig.drive(Signal::LubeLevel, false);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::LUBELEVEL_CHANGED));
    assert!(!rig.last().lube.level);
}

#[test]
fn status_carries_command_type_and_state() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.send(IoCommand::ToolPrepare { pocket: 1, tool: 1 });
    let status = rig.last();
    assert_eq!(status.command_type, CommandType::ToolPrepare);
    assert_eq!(status.state.as_pin(), 1);

    let json = serde_json::to_string(status).unwrap();
    assert!(json.contains("\"outcome\":\"EXEC\""));
}

#[test]
fn empty_and_repeated_messages_are_ignored() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.ch.send(CommandMessage::new(9, IoCommand::Empty));
    let report = rig.cycle();
    assert_eq!(report.command, None);

    rig.ch.send(CommandMessage::new(10, IoCommand::CoolantFloodOn));
    rig.cycle();
    rig.ch.send(CommandMessage::new(10, IoCommand::CoolantFloodOff));
    let report = rig.cycle();
    assert_eq!(report.command, None);
    assert!(rig.out(Signal::CoolantFlood));
    assert_eq!(rig.last().echo_serial_number, 10);
}

#[test]
fn failed_table_load_reports_error_then_recovers() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    let (n, report) = rig.send(IoCommand::ToolLoadToolTable {
        file: Some(rig.dir.path().join("missing.tbl")),
    });
    assert_eq!(report.outcome, RcsStatus::Error);
    assert_eq!(rig.last().echo_serial_number, n);
    assert_eq!(rig.io.tools().get(3).unwrap().tool_number, 7);

    let (_, report) = rig.send(IoCommand::ToolLoadToolTable { file: None });
    assert_eq!(report.outcome, RcsStatus::Done);
}
