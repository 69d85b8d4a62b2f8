//! Command/status channel adapters.
//!
//! The controller only needs two operations: take the next pending
//! command without blocking, and publish a status snapshot. Empty
//! (`NONE`) messages never reach the controller.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread::{self, JoinHandle};

use iocontrol_common::command::CommandMessage;
use iocontrol_common::status::IoStatus;
use thiserror::Error;
use tracing::{debug, warn};

// ─── Errors ─────────────────────────────────────────────────────────

/// Channel failure. Always fatal to the process.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("command channel disconnected")]
    Disconnected,

    #[error("status channel I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("status encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

// ─── CommandChannel ─────────────────────────────────────────────────

pub trait CommandChannel {
    /// Next pending command, `None` when nothing new is waiting.
    fn try_receive(&mut self) -> Result<Option<CommandMessage>, ChannelError>;

    /// Publish a status snapshot.
    fn publish(&mut self, status: &IoStatus) -> Result<(), ChannelError>;
}

// ─── JsonLinesChannel ───────────────────────────────────────────────

/// Commands as JSON lines from a reader thread, statuses as JSON lines to
/// a writer.
pub struct JsonLinesChannel<W: Write> {
    commands: Receiver<CommandMessage>,
    writer: W,
    reader: Option<JoinHandle<()>>,
}

impl JsonLinesChannel<io::Stdout> {
    /// Commands on stdin, statuses on stdout.
    pub fn stdio() -> io::Result<Self> {
        Self::spawn(io::BufReader::new(io::stdin()), io::stdout())
    }
}

impl<W: Write> JsonLinesChannel<W> {
    /// Start the reader thread on `input`.
    pub fn spawn<R>(input: R, writer: W) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("iocontrol-cmd-reader".into())
            .spawn(move || {
                for (lineno, line) in input.lines().enumerate() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("command input error: {e}");
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<CommandMessage>(&line) {
                        Ok(msg) => {
                            if tx.send(msg).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!("command line {} ignored: {e}", lineno + 1),
                    }
                }
                debug!("command input closed");
            })?;

        Ok(Self {
            commands: rx,
            writer,
            reader: Some(handle),
        })
    }
}

impl<W: Write> CommandChannel for JsonLinesChannel<W> {
    fn try_receive(&mut self) -> Result<Option<CommandMessage>, ChannelError> {
        loop {
            match self.commands.try_recv() {
                Ok(msg) if msg.is_empty() => continue,
                Ok(msg) => return Ok(Some(msg)),
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => return Err(ChannelError::Disconnected),
            }
        }
    }

    fn publish(&mut self, status: &IoStatus) -> Result<(), ChannelError> {
        serde_json::to_writer(&mut self.writer, status)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }
}

impl<W: Write> Drop for JsonLinesChannel<W> {
    fn drop(&mut self) {
        // The reader blocks on input; only join it once it has finished.
        if let Some(handle) = self.reader.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

// ─── MemoryChannel ──────────────────────────────────────────────────

/// In-process channel: a command queue and a log of published statuses.
#[derive(Debug, Default)]
pub struct MemoryChannel {
    pending: VecDeque<CommandMessage>,
    published: Vec<IoStatus>,
    closed: bool,
    /// Keep only the most recent status (benchmarks).
    keep_last_only: bool,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel that retains only the last published status.
    pub fn bounded() -> Self {
        Self {
            keep_last_only: true,
            ..Self::default()
        }
    }

    pub fn send(&mut self, msg: CommandMessage) {
        self.pending.push_back(msg);
    }

    /// Simulate loss of the supervisor: once drained, `try_receive` fails.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn published(&self) -> &[IoStatus] {
        &self.published
    }

    pub fn last_status(&self) -> Option<&IoStatus> {
        self.published.last()
    }

    /// Drain the status log.
    pub fn take_published(&mut self) -> Vec<IoStatus> {
        std::mem::take(&mut self.published)
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl CommandChannel for MemoryChannel {
    fn try_receive(&mut self) -> Result<Option<CommandMessage>, ChannelError> {
        while let Some(msg) = self.pending.pop_front() {
            if !msg.is_empty() {
                return Ok(Some(msg));
            }
        }
        if self.closed {
            Err(ChannelError::Disconnected)
        } else {
            Ok(None)
        }
    }

    fn publish(&mut self, status: &IoStatus) -> Result<(), ChannelError> {
        if self.keep_last_only {
            self.published.clear();
        }
        self.published.push(status.clone());
        Ok(())
    }
}
