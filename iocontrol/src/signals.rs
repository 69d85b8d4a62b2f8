//! Signal layer: named bit/s32 points shared with the external driver.
//!
//! Built once at startup for a protocol version. Under V1 the V2-only
//! points are never registered: reading them yields `false`/`0` and
//! writing them does nothing.
//!
//! Each point has a single writer. The controller writes outputs through
//! [`SignalBus`]; the external driver (hardware glue or the simulator)
//! writes inputs through [`SignalTable::drive_bit`] / [`SignalTable::drive_s32`].

use std::collections::HashMap;
use std::fmt;

use iocontrol_common::config::ProtocolVersion;
use iocontrol_common::signal::{Signal, SignalDirection, SignalKind};
use tracing::{trace, warn};

// ─── SignalBus ──────────────────────────────────────────────────────

/// Controller-side access to named points.
pub trait SignalBus {
    fn read_bit(&self, signal: Signal) -> bool;
    fn write_bit(&mut self, signal: Signal, value: bool);
    fn read_s32(&self, signal: Signal) -> i32;
    fn write_s32(&mut self, signal: Signal, value: i32);
}

// ─── SignalValue ────────────────────────────────────────────────────

/// Current value of a registered point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalValue {
    Bit(bool),
    S32(i32),
}

impl SignalValue {
    const fn zero(kind: SignalKind) -> Self {
        match kind {
            SignalKind::Bit => Self::Bit(false),
            SignalKind::S32 => Self::S32(0),
        }
    }
}

impl fmt::Display for SignalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bit(v) => write!(f, "{}", u8::from(*v)),
            Self::S32(v) => write!(f, "{v}"),
        }
    }
}

// ─── SignalTable ────────────────────────────────────────────────────

/// In-process registry of every point for one protocol version.
#[derive(Debug, Clone)]
pub struct SignalTable {
    points: HashMap<Signal, SignalValue>,
    protocol: ProtocolVersion,
}

impl SignalTable {
    /// Register all points valid under `protocol`, every value zeroed.
    pub fn new(protocol: ProtocolVersion) -> Self {
        let points = Signal::ALL
            .iter()
            .filter(|s| protocol.is_v2() || !s.is_v2_only())
            .map(|s| (*s, SignalValue::zero(s.kind())))
            .collect();
        Self { points, protocol }
    }

    #[inline]
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    #[inline]
    pub fn is_registered(&self, signal: Signal) -> bool {
        self.points.contains_key(&signal)
    }

    /// Number of registered points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Driver side: set an input bit.
    pub fn drive_bit(&mut self, signal: Signal, value: bool) {
        self.drive(signal, SignalValue::Bit(value));
    }

    /// Driver side: set an input integer.
    pub fn drive_s32(&mut self, signal: Signal, value: i32) {
        self.drive(signal, SignalValue::S32(value));
    }

    /// All registered points with their values, in declaration order.
    pub fn snapshot(&self) -> Vec<(Signal, SignalValue)> {
        Signal::ALL
            .iter()
            .filter_map(|s| self.points.get(s).map(|v| (*s, *v)))
            .collect()
    }

    fn drive(&mut self, signal: Signal, value: SignalValue) {
        if signal.direction() != SignalDirection::In {
            warn!("driver write to output point '{signal}' ignored");
            return;
        }
        self.store(signal, value);
    }

    fn store(&mut self, signal: Signal, value: SignalValue) {
        match self.points.get_mut(&signal) {
            Some(slot) if std::mem::discriminant(slot) == std::mem::discriminant(&value) => {
                *slot = value;
            }
            Some(_) => warn!("kind mismatch writing '{signal}' ({}), ignored", signal.kind()),
            None => trace!("'{signal}' not registered under protocol {}", self.protocol),
        }
    }
}

impl SignalBus for SignalTable {
    fn read_bit(&self, signal: Signal) -> bool {
        matches!(self.points.get(&signal), Some(SignalValue::Bit(true)))
    }

    fn write_bit(&mut self, signal: Signal, value: bool) {
        if signal.direction() != SignalDirection::Out {
            warn!("controller write to input point '{signal}' ignored");
            return;
        }
        self.store(signal, SignalValue::Bit(value));
    }

    fn read_s32(&self, signal: Signal) -> i32 {
        match self.points.get(&signal) {
            Some(SignalValue::S32(v)) => *v,
            _ => 0,
        }
    }

    fn write_s32(&mut self, signal: Signal, value: i32) {
        if signal.direction() != SignalDirection::Out {
            warn!("controller write to input point '{signal}' ignored");
            return;
        }
        self.store(signal, SignalValue::S32(value));
    }
}
