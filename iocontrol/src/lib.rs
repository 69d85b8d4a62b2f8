//! # iocontrol
//!
//! I/O controller for a CNC machine. Bridges the motion/task supervisor's
//! command/status channel to a set of named signal points driven by the
//! toolchanger, coolant, lube and estop hardware.
//!
//! ## Layers
//!
//! 1. **Signals** ([`signals`]) - named bit/s32 points, one writer each
//! 2. **Tool table** ([`tool_table`]) - pocket store, load/save, spindle slot
//! 3. **Channel** ([`channel`]) - command intake and status publish
//! 4. **State machine** ([`state`]) - toolchanger handshake transitions
//! 5. **Controller** ([`controller`]) - one cycle of sample, propagate, dispatch
//! 6. **Cycle** ([`cycle`]) - fixed-period loop around the controller
//!
//! [`sim`] stands in for the toolchanger hardware when none is attached.

pub mod channel;
pub mod controller;
pub mod cycle;
pub mod signals;
pub mod sim;
pub mod state;
pub mod tool_table;
