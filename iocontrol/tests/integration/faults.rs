//! Integration test: toolchanger fault latch, pre-emption and clear (V2).

use iocontrol::state::InputEvents;
use iocontrol_common::command::IoCommand;
use iocontrol_common::config::ProtocolVersion;
use iocontrol_common::consts::ABORT_BY_TOOLCHANGER_FAULT;
use iocontrol_common::signal::Signal;
use iocontrol_common::status::{RcsStatus, ToolchangerState};

use super::{Rig, SEQUENTIAL_TABLE};

/// Prepare pocket 3 to completion.
fn prepared(rig: &mut Rig) {
    rig.send(IoCommand::ToolPrepare { pocket: 3, tool: 7 });
    rig.drive(Signal::ToolPrepared, true);
    rig.cycle();
    rig.drive(Signal::ToolPrepared, false);
    assert_eq!(rig.io.status().tool.pocket_prepared, 3);
}

fn latch_fault(rig: &mut Rig, reason: i32) {
    rig.drive_s32(Signal::ToolchangerReason, reason);
    rig.drive(Signal::ToolchangerFault, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::TC_FAULT));
}

#[test]
fn fault_line_latches_and_acks() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    latch_fault(&mut rig, -2);

    assert!(rig.io.fault().faulted);
    assert!(rig.io.fault().is_hard());
    assert!(rig.out(Signal::ToolchangerFaultAck));
    assert!(rig.out(Signal::ToolchangerFaulted));
    assert!(rig.last().fault);
    assert_eq!(rig.last().reason, -2);

    // Fault line drops: ack follows, the latch stays.
    rig.drive(Signal::ToolchangerFault, false);
    rig.cycle();
    assert!(!rig.out(Signal::ToolchangerFaultAck));
    assert!(rig.out(Signal::ToolchangerFaulted));
    assert!(rig.io.fault().faulted);
}

#[test]
fn latched_fault_preempts_change() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    prepared(&mut rig);
    latch_fault(&mut rig, -1);

    let (n, report) = rig.send(IoCommand::ToolLoad);
    assert_eq!(report.outcome, RcsStatus::Exec);
    assert!(rig.out(Signal::ToolChange));

    // Even with tool-changed asserted, the fault check comes first.
    rig.drive(Signal::ToolChanged, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::TC_ABORT));
    assert!(!report.events.contains(InputEvents::CHANGE_COMPLETE));
    assert!(rig.out(Signal::EmcAbort));
    assert_eq!(rig.out_s32(Signal::EmcReason), ABORT_BY_TOOLCHANGER_FAULT);
    assert!(!rig.out(Signal::ToolChange));
    assert_eq!(rig.io.state(), ToolchangerState::WaitForAbortAck);
    assert_eq!(rig.out_s32(Signal::State), 4);

    let status = rig.last();
    assert_eq!(status.outcome, RcsStatus::Error);
    assert_eq!(status.echo_serial_number, n);
    assert_eq!(status.tool.tool_in_spindle, 0);
    assert_eq!(status.tool.pocket_prepared, 3);

    // Abort acknowledged.
    rig.drive(Signal::EmcAbortAck, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::EMC_ABORT_ACKED));
    assert!(!rig.out(Signal::EmcAbort));
    assert_eq!(rig.io.state(), ToolchangerState::Idle);
}

#[test]
fn clear_fault_ignored_while_line_high() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    latch_fault(&mut rig, 3);

    rig.drive(Signal::ToolchangerClearFault, true);
    rig.cycle();
    assert!(rig.io.fault().faulted);
    assert!(rig.last().fault);

    rig.drive(Signal::ToolchangerFault, false);
    rig.cycle();
    assert!(!rig.io.fault().faulted);
    assert!(!rig.out(Signal::ToolchangerFaulted));
    assert!(!rig.last().fault);
    assert_eq!(rig.last().reason, 0);
}

#[test]
fn soft_fault_still_preempts_change() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    prepared(&mut rig);
    latch_fault(&mut rig, 5);
    assert!(rig.io.fault().is_soft());

    rig.send(IoCommand::ToolLoad);
    rig.cycle();
    assert!(rig.out(Signal::EmcAbort));
    assert_eq!(rig.last().outcome, RcsStatus::Error);
    assert_eq!(rig.last().reason, 5);
}

#[test]
fn change_after_cleared_fault_commits() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    latch_fault(&mut rig, -1);
    rig.drive(Signal::ToolchangerFault, false);
    rig.drive(Signal::ToolchangerClearFault, true);
    rig.cycle();
    rig.drive(Signal::ToolchangerClearFault, false);
    assert!(!rig.io.fault().faulted);

    prepared(&mut rig);
    rig.send(IoCommand::ToolLoad);
    rig.drive(Signal::ToolChanged, true);
    let report = rig.cycle();
    assert!(report.events.contains(InputEvents::CHANGE_COMPLETE));
    assert_eq!(rig.io.status().tool.tool_in_spindle, 7);
}

#[test]
fn fault_lines_ignored_under_v1() {
    let mut rig = Rig::new(ProtocolVersion::V1, false, SEQUENTIAL_TABLE);
    rig.drive(Signal::ToolchangerFault, true);
    let report = rig.cycle();
    assert!(!report.events.contains(InputEvents::TC_FAULT));
    assert!(!rig.io.fault().faulted);

    prepared(&mut rig);
    rig.send(IoCommand::ToolLoad);
    rig.drive(Signal::ToolChanged, true);
    rig.cycle();
    assert_eq!(rig.io.status().tool.tool_in_spindle, 7);
}

#[test]
fn estop_on_clears_latch_until_next_sample() {
    let mut rig = Rig::new(ProtocolVersion::V2, false, SEQUENTIAL_TABLE);
    latch_fault(&mut rig, -1);
    rig.drive(Signal::ToolchangerFault, false);
    rig.cycle();

    rig.send(IoCommand::AuxEstopOn);
    assert!(!rig.io.fault().faulted);
    assert!(!rig.out(Signal::ToolchangerFaulted));
}
