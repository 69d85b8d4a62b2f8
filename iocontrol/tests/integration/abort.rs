//! Integration test: TOOL_ABORT and the abort acknowledgement.

use iocontrol::state::InputEvents;
use iocontrol_common::command::IoCommand;
use iocontrol_common::config::ProtocolVersion;
use iocontrol_common::consts::ABORT_BY_USER;
use iocontrol_common::signal::Signal;
use iocontrol_common::status::{RcsStatus, ToolchangerState};

use super::{Rig, SEQUENTIAL_TABLE};

#[test]
fn abort_during_change_v2() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.send(IoCommand::CoolantFloodOn);
    rig.send(IoCommand::ToolPrepare { pocket: 2, tool: 2 });
    rig.drive(Signal::ToolPrepared, true);
    rig.cycle();
    rig.drive(Signal::ToolPrepared, false);
    rig.send(IoCommand::ToolLoad);
    assert_eq!(rig.io.state(), ToolchangerState::Changing);

    let (n, report) = rig.send(IoCommand::ToolAbort {
        reason: ABORT_BY_USER,
    });
    assert_eq!(report.outcome, RcsStatus::Done);
    assert_eq!(rig.last().echo_serial_number, n);
    assert!(!rig.out(Signal::ToolChange));
    assert!(!rig.out(Signal::CoolantFlood));
    assert!(!rig.io.status().coolant.flood);
    assert!(rig.out(Signal::EmcAbort));
    assert_eq!(rig.out_s32(Signal::EmcReason), ABORT_BY_USER);
    assert_eq!(rig.io.state(), ToolchangerState::WaitForAbortAck);

    // Waiting: the abort stays up.
    for _ in 0..3 {
        let report = rig.cycle();
        assert!(report.events.contains(InputEvents::EMC_ABORT_SIGNALED));
        assert!(rig.out(Signal::EmcAbort));
    }

    rig.drive(Signal::EmcAbortAck, true);
    rig.cycle();
    assert!(!rig.out(Signal::EmcAbort));
    assert_eq!(rig.io.state(), ToolchangerState::Idle);
    assert_eq!(rig.io.status().tool.tool_in_spindle, 0);
}

#[test]
fn abort_v1_drops_requests_only() {
    let mut rig = Rig::new(ProtocolVersion::V1, false, SEQUENTIAL_TABLE);
    rig.send(IoCommand::CoolantMistOn);
    rig.send(IoCommand::ToolPrepare { pocket: 2, tool: 2 });
    assert!(rig.out(Signal::ToolPrepare));

    rig.send(IoCommand::ToolAbort {
        reason: ABORT_BY_USER,
    });
    assert!(!rig.out(Signal::ToolPrepare));
    assert!(!rig.out(Signal::CoolantMist));
    assert_eq!(rig.io.state(), ToolchangerState::Idle);
    assert_eq!(rig.last().outcome, RcsStatus::Done);
}

#[test]
fn abort_while_idle_still_handshakes() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    rig.send(IoCommand::ToolAbort { reason: 42 });
    assert!(rig.out(Signal::EmcAbort));
    assert_eq!(rig.out_s32(Signal::EmcReason), 42);

    rig.drive(Signal::EmcAbortAck, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::EMC_ABORT_ACKED));
    assert_eq!(rig.io.state(), ToolchangerState::Idle);
}

#[test]
fn start_change_then_abort() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    let (_, report) = rig.send(IoCommand::ToolStartChange);
    assert_eq!(report.outcome, RcsStatus::Exec);
    assert!(rig.out(Signal::StartChange));

    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::START_CHANGE));
    assert_eq!(rig.last().outcome, RcsStatus::Exec);

    rig.send(IoCommand::ToolAbort {
        reason: ABORT_BY_USER,
    });
    assert!(!rig.out(Signal::StartChange));
    assert_eq!(rig.io.state(), ToolchangerState::WaitForAbortAck);
}
