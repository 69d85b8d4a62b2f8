//! Integration test: full prepare → load cycle on both changer kinds.

use iocontrol::state::InputEvents;
use iocontrol_common::command::IoCommand;
use iocontrol_common::config::ProtocolVersion;
use iocontrol_common::signal::Signal;
use iocontrol_common::status::{RcsStatus, ToolchangerState};

use super::{Rig, SEQUENTIAL_TABLE};

#[test]
fn sequential_v2_prepare_then_load() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);

    // ── Prepare ──
    let (n, report) = rig.send(IoCommand::ToolPrepare { pocket: 3, tool: 7 });
    assert_eq!(report.outcome, RcsStatus::Exec);
    assert!(rig.out(Signal::ToolPrepare));
    assert_eq!(rig.out_s32(Signal::ToolPrepNumber), 7);
    assert_eq!(rig.out_s32(Signal::ToolPrepPocket), 3);
    assert_eq!(rig.last().echo_serial_number, n);

    for _ in 0..3 {
        let report = rig.cycle();
        assert!(report.events.contains(InputEvents::PREPARING));
        assert_eq!(rig.last().outcome, RcsStatus::Exec);
        assert_eq!(rig.last().echo_serial_number, n);
    }

    rig.drive(Signal::ToolPrepared, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::PREPARE_COMPLETE));
    assert_eq!(rig.io.status().tool.pocket_prepared, 3);
    assert!(!rig.out(Signal::ToolPrepare));
    assert_eq!(rig.last().outcome, RcsStatus::Done);
    assert_eq!(rig.last().echo_serial_number, n);
    rig.drive(Signal::ToolPrepared, false);

    // ── Load ──
    let (n1, report) = rig.send(IoCommand::ToolLoad);
    assert_eq!(n1, n + 1);
    assert_eq!(report.outcome, RcsStatus::Exec);
    assert!(rig.out(Signal::ToolChange));
    assert_eq!(rig.io.state(), ToolchangerState::Changing);

    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::CHANGING));
    assert_eq!(rig.last().outcome, RcsStatus::Exec);

    rig.drive(Signal::ToolChanged, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::CHANGE_COMPLETE));
    let status = rig.last();
    assert_eq!(status.tool.tool_in_spindle, 7);
    assert_eq!(status.tool.pocket_prepared, -1);
    assert_eq!(status.outcome, RcsStatus::Done);
    assert_eq!(status.echo_serial_number, n1);
    assert!(!rig.out(Signal::ToolChange));
    assert_eq!(rig.out_s32(Signal::ToolNumber), 7);
    assert_eq!(rig.io.state(), ToolchangerState::Idle);

    // Sequential spindle slot mirrors pocket 3; the file is untouched.
    assert_eq!(rig.io.tools().spindle().tool_number, 7);
    assert_eq!(rig.io.tools().spindle().offset.z, 1.5);
    let text = std::fs::read_to_string(rig.dir.path().join("tool.tbl")).unwrap();
    assert_eq!(text, SEQUENTIAL_TABLE);
}

#[test]
fn sequential_v1_prepare_then_load() {
    let mut rig = Rig::new(ProtocolVersion::V1, false, SEQUENTIAL_TABLE);

    rig.send(IoCommand::ToolPrepare { pocket: 1, tool: 1 });
    rig.drive(Signal::ToolPrepared, true);
    rig.cycle();
    rig.drive(Signal::ToolPrepared, false);
    assert_eq!(rig.io.status().tool.pocket_prepared, 1);

    let (n, _) = rig.send(IoCommand::ToolLoad);
    rig.drive(Signal::ToolChanged, true);
    rig.cycle();
    rig.drive(Signal::ToolChanged, false);

    assert_eq!(rig.last().echo_serial_number, n);
    assert_eq!(rig.last().outcome, RcsStatus::Done);
    assert_eq!(rig.io.status().tool.tool_in_spindle, 1);
}

#[test]
fn random_changer_round_trip_persists() {
    let mut rig = Rig::new(ProtocolVersion::V2, true, "T4 P0 ;in spindle\nT8 P2 ;eight\n");
    assert_eq!(rig.io.status().tool.tool_in_spindle, 4);

    rig.send(IoCommand::ToolPrepare { pocket: 2, tool: 8 });
    rig.drive(Signal::ToolPrepared, true);
    rig.cycle();
    rig.drive(Signal::ToolPrepared, false);
    rig.send(IoCommand::ToolLoad);
    rig.drive(Signal::ToolChanged, true);
    rig.cycle();
    rig.drive(Signal::ToolChanged, false);

    assert_eq!(rig.io.status().tool.tool_in_spindle, 8);
    let text = std::fs::read_to_string(rig.dir.path().join("tool.tbl")).unwrap();
    assert_eq!(text, "T8 P0 ;eight\nT4 P2 ;in spindle\n");

    // And back again.
    rig.send(IoCommand::ToolPrepare { pocket: 2, tool: 4 });
    rig.drive(Signal::ToolPrepared, true);
    rig.cycle();
    rig.drive(Signal::ToolPrepared, false);
    rig.send(IoCommand::ToolLoad);
    rig.drive(Signal::ToolChanged, true);
    rig.cycle();

    assert_eq!(rig.io.status().tool.tool_in_spindle, 4);
    let text = std::fs::read_to_string(rig.dir.path().join("tool.tbl")).unwrap();
    assert_eq!(text, "T4 P0 ;in spindle\nT8 P2 ;eight\n");
}

#[test]
fn load_of_loaded_tool_is_noop() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.send(IoCommand::ToolSetNumber { pocket: 3 });
    assert_eq!(rig.io.status().tool.tool_in_spindle, 7);

    rig.send(IoCommand::ToolPrepare { pocket: 3, tool: 7 });
    rig.drive(Signal::ToolPrepared, true);
    rig.cycle();
    rig.drive(Signal::ToolPrepared, false);

    let (_, report) = rig.send(IoCommand::ToolLoad);
    assert_eq!(report.outcome, RcsStatus::Done);
    assert!(!rig.out(Signal::ToolChange));
    assert_eq!(rig.io.status().tool.tool_in_spindle, 7);
    assert_eq!(rig.io.state(), ToolchangerState::Idle);
}

#[test]
fn simultaneous_ack_completes_in_dispatch_cycle() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    // A driver that holds tool-prepared high answers the request in the
    // next sample, not the dispatch cycle itself.
    rig.drive(Signal::ToolPrepared, true);
    let (n, report) = rig.send(IoCommand::ToolPrepare { pocket: 2, tool: 2 });
    assert_eq!(report.outcome, RcsStatus::Exec);

    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::PREPARE_COMPLETE));
    assert_eq!(rig.last().outcome, RcsStatus::Done);
    assert_eq!(rig.last().echo_serial_number, n);
}
