//! Fixed-period cycle: simulate → sample/dispatch/publish → sleep → finish.
//!
//! Pacing is `std::thread::sleep` for the remainder of the period. An
//! overrun is counted and logged; the next cycle starts immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, CommandChannel};
use crate::controller::IoController;
use crate::signals::SignalTable;
use crate::sim::ToolchangerSim;

// ─── Cycle Statistics ───────────────────────────────────────────────

/// Per-cycle timing statistics. O(1) update, no allocation.
#[derive(Debug, Clone)]
pub struct CycleStats {
    /// Total cycles executed.
    pub cycle_count: u64,
    /// Last cycle duration [ns].
    pub last_cycle_ns: i64,
    /// Minimum cycle duration [ns].
    pub min_cycle_ns: i64,
    /// Maximum cycle duration [ns].
    pub max_cycle_ns: i64,
    /// Running sum for average computation.
    pub sum_cycle_ns: i64,
    /// Cycles whose work exceeded the period.
    pub overruns: u64,
    /// Commands dispatched.
    pub commands: u64,
}

impl CycleStats {
    pub const fn new() -> Self {
        Self {
            cycle_count: 0,
            last_cycle_ns: 0,
            min_cycle_ns: i64::MAX,
            max_cycle_ns: 0,
            sum_cycle_ns: 0,
            overruns: 0,
            commands: 0,
        }
    }

    /// Record one cycle's work duration.
    #[inline]
    pub fn record(&mut self, duration_ns: i64) {
        self.cycle_count += 1;
        self.last_cycle_ns = duration_ns;
        self.min_cycle_ns = self.min_cycle_ns.min(duration_ns);
        self.max_cycle_ns = self.max_cycle_ns.max(duration_ns);
        self.sum_cycle_ns = self.sum_cycle_ns.saturating_add(duration_ns);
    }

    /// Average cycle time [ns] (0 if no cycles).
    #[inline]
    pub fn avg_cycle_ns(&self) -> i64 {
        if self.cycle_count == 0 {
            0
        } else {
            self.sum_cycle_ns / self.cycle_count as i64
        }
    }
}

impl Default for CycleStats {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CycleError {
    /// Command/status channel lost.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("cycle setup failed: {0}")]
    Setup(String),
}

// ─── CycleRunner ────────────────────────────────────────────────────

pub struct CycleRunner<C: CommandChannel> {
    controller: IoController<SignalTable>,
    channel: C,
    sim: Option<ToolchangerSim>,
    running: Arc<AtomicBool>,
    stats: CycleStats,
    period: Duration,
}

impl<C: CommandChannel> CycleRunner<C> {
    /// The period comes from the controller's settings. A simulator, if
    /// given, is primed before the first cycle.
    pub fn new(
        mut controller: IoController<SignalTable>,
        channel: C,
        sim: Option<ToolchangerSim>,
        running: Arc<AtomicBool>,
    ) -> Result<Self, CycleError> {
        let period = controller.settings().cycle_duration();
        if period.is_zero() {
            return Err(CycleError::Setup("cycle period is zero".to_string()));
        }
        if let Some(sim) = &sim {
            sim.prime(controller.signals_mut());
        }
        Ok(Self {
            controller,
            channel,
            sim,
            running,
            stats: CycleStats::new(),
            period,
        })
    }

    #[inline]
    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }

    #[inline]
    pub fn controller(&self) -> &IoController<SignalTable> {
        &self.controller
    }

    #[inline]
    pub fn channel(&self) -> &C {
        &self.channel
    }

    #[inline]
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Loop until the running flag drops or the channel fails.
    pub fn run(&mut self) -> Result<(), CycleError> {
        info!(
            "cycle running: period {:?}, protocol {}, simulator {}",
            self.period,
            self.controller.settings().protocol_version,
            if self.sim.is_some() { "on" } else { "off" }
        );

        while self.running.load(Ordering::SeqCst) {
            self.step()?;
        }

        info!(
            "cycle stopped after {} cycles ({} commands, {} overruns, avg {} ns, max {} ns)",
            self.stats.cycle_count,
            self.stats.commands,
            self.stats.overruns,
            self.stats.avg_cycle_ns(),
            self.stats.max_cycle_ns
        );
        Ok(())
    }

    /// One full period, sleep included.
    pub fn step(&mut self) -> Result<(), CycleError> {
        let start = Instant::now();

        if let Some(sim) = self.sim.as_mut() {
            sim.step(self.controller.signals_mut(), start);
        }
        let report = self.controller.run_cycle(&mut self.channel)?;
        if let Some(command) = report.command {
            self.stats.commands += 1;
            debug!("{command} -> {}", report.outcome);
        }

        let elapsed = start.elapsed();
        self.stats
            .record(i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX));

        match self.period.checked_sub(elapsed) {
            Some(remaining) => std::thread::sleep(remaining),
            None => {
                self.stats.overruns += 1;
                warn!(
                    "cycle overrun: {:?} > {:?} period ({} total)",
                    elapsed, self.period, self.stats.overruns
                );
            }
        }

        self.controller.finish_cycle();
        Ok(())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
