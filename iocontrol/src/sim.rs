//! Toolchanger simulator.
//!
//! Stands in for the external driver when no hardware is attached. Each
//! linked reaction watches a bit output for an edge and, after a delay,
//! drives a bit input. The default link set answers every handshake:
//!
//! | output              | input              |
//! |---------------------|--------------------|
//! | `user-enable-out`   | `emc-enable-in`    |
//! | `tool-prepare`      | `tool-prepared`    |
//! | `tool-change`       | `tool-changed`     |
//! | `emc-abort`         | `emc-abort-ack`    |
//! | `start-change`      | `start-change-ack` |

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use iocontrol_common::config::{ConfigError, LinkConfig, SignalLevel, SimulationConfig};
use iocontrol_common::signal::Signal;
use tracing::{debug, trace};

use crate::signals::{SignalBus, SignalTable};

/// Input change queued by a linked reaction.
#[derive(Debug, Clone)]
struct PendingChange {
    due: Instant,
    input: Signal,
    level: bool,
}

pub struct ToolchangerSim {
    links: Vec<LinkConfig>,
    initial: Vec<(Signal, SignalLevel)>,
    /// Last seen level of every watched output.
    prev_outputs: HashMap<Signal, bool>,
    pending: VecDeque<PendingChange>,
}

impl ToolchangerSim {
    /// Simulator with the loopback links and lube level ok.
    pub fn loopback() -> Self {
        Self::new(default_links(), Vec::new())
    }

    /// Simulator from `[simulation]`. An empty link list selects the
    /// loopback set.
    pub fn from_config(config: &SimulationConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let links = if config.links.is_empty() {
            default_links()
        } else {
            config.links.clone()
        };
        Ok(Self::new(links, config.resolved_inputs()?))
    }

    fn new(links: Vec<LinkConfig>, overrides: Vec<(Signal, SignalLevel)>) -> Self {
        let mut initial = vec![(Signal::LubeLevel, SignalLevel::Bit(true))];
        for (signal, level) in overrides {
            initial.retain(|(s, _)| *s != signal);
            initial.push((signal, level));
        }
        let prev_outputs = links.iter().map(|l| (l.output, false)).collect();

        debug!(
            "toolchanger simulator: {} links, {} initial inputs",
            links.len(),
            initial.len()
        );
        Self {
            links,
            initial,
            prev_outputs,
            pending: VecDeque::new(),
        }
    }

    /// Drive the initial input levels.
    pub fn prime(&self, table: &mut SignalTable) {
        for (signal, level) in &self.initial {
            match *level {
                SignalLevel::Bit(v) => table.drive_bit(*signal, v),
                SignalLevel::S32(v) => table.drive_s32(*signal, v),
            }
        }
    }

    /// Queued input changes not yet applied.
    #[inline]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Detect output edges, then apply every queued change due by `now`.
    pub fn step(&mut self, table: &mut SignalTable, now: Instant) {
        for link in &self.links {
            let level = table.read_bit(link.output);
            let prev = self.prev_outputs.get(&link.output).copied().unwrap_or(false);
            if level != prev && level == link.trigger {
                trace!(
                    "{} -> {} queues {} = {} in {:.3}s",
                    link.output,
                    u8::from(level),
                    link.input,
                    u8::from(link.result),
                    link.delay_s
                );
                self.pending.push_back(PendingChange {
                    due: now + Duration::from_secs_f64(link.delay_s),
                    input: link.input,
                    level: link.result,
                });
            }
        }
        for link in &self.links {
            self.prev_outputs
                .insert(link.output, table.read_bit(link.output));
        }

        while let Some(pos) = self.pending.iter().position(|c| c.due <= now) {
            let Some(change) = self.pending.remove(pos) else {
                break;
            };
            if table.read_bit(change.input) != change.level {
                debug!("sim: {} = {}", change.input, u8::from(change.level));
            }
            table.drive_bit(change.input, change.level);
        }
    }
}

fn echo(output: Signal, input: Signal) -> [LinkConfig; 2] {
    [true, false].map(|level| LinkConfig {
        output,
        trigger: level,
        delay_s: 0.0,
        input,
        result: level,
    })
}

/// Every handshake output echoed on its acknowledge input.
pub fn default_links() -> Vec<LinkConfig> {
    [
        echo(Signal::UserEnableOut, Signal::EmcEnableIn),
        echo(Signal::ToolPrepare, Signal::ToolPrepared),
        echo(Signal::ToolChange, Signal::ToolChanged),
        echo(Signal::EmcAbort, Signal::EmcAbortAck),
        echo(Signal::StartChange, Signal::StartChangeAck),
    ]
    .into_iter()
    .flatten()
    .collect()
}
