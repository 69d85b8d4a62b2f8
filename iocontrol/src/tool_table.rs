//! Tool table store.
//!
//! Fixed array of `MAX_POCKETS` records indexed by pocket. Index 0 is the
//! spindle. A random toolchanger swaps records between the spindle and a
//! pocket and persists the result; a sequential toolchanger copies the
//! pocket into the synthetic spindle slot and never persists it.
//!
//! # File format
//!
//! Load accepts two line forms and skips everything else:
//!
//! ```text
//! 3 7 1.25 0.5 ;legacy: pocket tool length diameter
//! T7 P3 D0.5 Z1.25 ;word form, as written by save
//! ```
//!
//! Save writes the word form only, omitting zero-valued fields.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use iocontrol_common::consts::MAX_POCKETS;
use iocontrol_common::tool::{ToolOffset, ToolRecord};
use thiserror::Error;
use tracing::{debug, trace};

// ─── Errors ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolTableError {
    /// The table file could not be opened, read or written.
    #[error("bad tool table file {}: {source}", path.display())]
    BadFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("pocket {0} outside [0, {MAX_POCKETS})")]
    PocketOutOfRange(i32),
}

impl ToolTableError {
    fn bad_file(path: &Path, source: io::Error) -> Self {
        Self::BadFile {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ─── Line parsing ───────────────────────────────────────────────────

/// One successfully parsed line.
#[derive(Debug, Clone, PartialEq)]
enum TableLine {
    /// `pocket tool length diameter`
    Legacy { pocket: i32, record: ToolRecord },
    /// `T.. P.. [fields]`
    Words { pocket: i32, record: ToolRecord },
}

fn split_comment(line: &str) -> (&str, &str) {
    match line.split_once(';') {
        Some((body, comment)) => (body, comment.trim()),
        None => (line, ""),
    }
}

fn parse_legacy(body: &str) -> Option<(i32, ToolRecord)> {
    let mut fields = body.split_whitespace();
    let pocket = fields.next()?.parse::<i32>().ok()?;
    let tool = fields.next()?.parse::<i32>().ok()?;
    let length = fields.next()?.parse::<f64>().ok()?;
    let diameter = fields.next()?.parse::<f64>().ok()?;
    if fields.next().is_some() {
        return None;
    }
    let record = ToolRecord {
        tool_number: tool,
        pocket_number: pocket,
        offset: ToolOffset::z_only(length),
        diameter,
        ..ToolRecord::empty()
    };
    Some((pocket, record))
}

fn parse_words(body: &str) -> Option<(i32, ToolRecord)> {
    let mut record = ToolRecord::empty();
    let mut tool = None;
    let mut pocket = None;

    for word in body.split_whitespace() {
        let mut chars = word.chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let value = chars.as_str();
        match letter {
            'T' => tool = Some(value.parse::<i32>().ok()?),
            'P' => pocket = Some(value.parse::<i32>().ok()?),
            'Q' => record.orientation = value.parse::<i32>().ok()?,
            _ => {
                let v = value.parse::<f64>().ok()?;
                match letter {
                    'D' => record.diameter = v,
                    'X' => record.offset.x = v,
                    'Y' => record.offset.y = v,
                    'Z' => record.offset.z = v,
                    'A' => record.offset.a = v,
                    'B' => record.offset.b = v,
                    'C' => record.offset.c = v,
                    'U' => record.offset.u = v,
                    'V' => record.offset.v = v,
                    'W' => record.offset.w = v,
                    'I' => record.front_angle = v,
                    'J' => record.back_angle = v,
                    _ => return None,
                }
            }
        }
    }

    let (tool, pocket) = (tool?, pocket?);
    record.tool_number = tool;
    record.pocket_number = pocket;
    Some((pocket, record))
}

fn parse_line(line: &str) -> Option<TableLine> {
    let (body, comment) = split_comment(line);
    if body.trim().is_empty() {
        return None;
    }
    let starts_with_word = body
        .trim_start()
        .starts_with(|c: char| c.is_ascii_alphabetic());

    let mut parsed = if starts_with_word {
        parse_words(body).map(|(pocket, record)| TableLine::Words { pocket, record })
    } else {
        parse_legacy(body).map(|(pocket, record)| TableLine::Legacy { pocket, record })
    }?;

    match &mut parsed {
        TableLine::Legacy { record, .. } | TableLine::Words { record, .. } => {
            record.set_comment(comment)
        }
    }
    Some(parsed)
}

fn format_record(out: &mut String, pocket: i32, rec: &ToolRecord) {
    let _ = write!(out, "T{} P{}", rec.tool_number, pocket);
    let fields = [
        ('D', rec.diameter),
        ('X', rec.offset.x),
        ('Y', rec.offset.y),
        ('Z', rec.offset.z),
        ('A', rec.offset.a),
        ('B', rec.offset.b),
        ('C', rec.offset.c),
        ('U', rec.offset.u),
        ('V', rec.offset.v),
        ('W', rec.offset.w),
        ('I', rec.front_angle),
        ('J', rec.back_angle),
    ];
    for (letter, value) in fields {
        if value != 0.0 {
            let _ = write!(out, " {letter}{value}");
        }
    }
    if rec.orientation != 0 {
        let _ = write!(out, " Q{}", rec.orientation);
    }
    let _ = write!(out, " ;{}", rec.comment);
}

// ─── ToolTable ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ToolTable {
    pockets: Vec<ToolRecord>,
    random: bool,
    /// File that mutations are persisted to.
    path: PathBuf,
}

impl ToolTable {
    /// Empty table persisting to `path`.
    pub fn new(path: impl Into<PathBuf>, random: bool) -> Self {
        Self {
            pockets: vec![ToolRecord::empty(); MAX_POCKETS],
            random,
            path: path.into(),
        }
    }

    #[inline]
    pub fn is_random(&self) -> bool {
        self.random
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record at `pocket`, `None` if out of range.
    pub fn get(&self, pocket: i32) -> Option<&ToolRecord> {
        usize::try_from(pocket)
            .ok()
            .and_then(|i| self.pockets.get(i))
    }

    /// Spindle slot.
    #[inline]
    pub fn spindle(&self) -> &ToolRecord {
        &self.pockets[0]
    }

    /// First pocket holding `tool`. The spindle is only searched on a
    /// random changer.
    pub fn find_pocket(&self, tool: i32) -> Option<i32> {
        let start = if self.random { 0 } else { 1 };
        self.pockets
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, rec)| !rec.is_empty() && rec.tool_number == tool)
            .map(|(i, _)| i as i32)
    }

    /// Highest index holding a tool, 0 when the table is empty.
    pub fn last_index(&self) -> i32 {
        self.pockets
            .iter()
            .rposition(|rec| !rec.is_empty())
            .map_or(0, |i| i as i32)
    }

    fn index(pocket: i32) -> Result<usize, ToolTableError> {
        usize::try_from(pocket)
            .ok()
            .filter(|i| *i < MAX_POCKETS)
            .ok_or(ToolTableError::PocketOutOfRange(pocket))
    }

    /// Read `path` into a fresh table and swap it in. Returns the number of
    /// tools loaded. On error the current table is left untouched.
    pub fn load(&mut self, path: &Path) -> Result<usize, ToolTableError> {
        let file = File::open(path).map_err(|e| ToolTableError::bad_file(path, e))?;
        let mut reader = BufReader::new(file);
        let mut pockets = vec![ToolRecord::empty(); MAX_POCKETS];

        let mut next_sequential = 1usize;
        let mut loaded = 0usize;
        let mut raw = Vec::new();
        let mut lineno = 0usize;
        loop {
            raw.clear();
            let read = reader
                .read_until(b'\n', &mut raw)
                .map_err(|e| ToolTableError::bad_file(path, e))?;
            if read == 0 {
                break;
            }
            lineno += 1;

            // Comments are free text and need not be UTF-8.
            let line = String::from_utf8_lossy(&raw);
            let Some(parsed) = parse_line(line.trim_end_matches(['\r', '\n'])) else {
                trace!("tool table {}:{lineno}: skipped", path.display());
                continue;
            };

            let (index, record) = match parsed {
                TableLine::Legacy { pocket, record } => (i64::from(pocket), record),
                TableLine::Words { pocket, record } if self.random => (i64::from(pocket), record),
                TableLine::Words { pocket, record } => {
                    if !(0..MAX_POCKETS as i32).contains(&pocket) {
                        debug!(
                            "tool table {}:{lineno}: pocket {pocket} ignored",
                            path.display()
                        );
                        continue;
                    }
                    while next_sequential < MAX_POCKETS && !pockets[next_sequential].is_empty() {
                        next_sequential += 1;
                    }
                    let index = next_sequential;
                    next_sequential += 1;
                    (index as i64, record)
                }
            };

            if index < 0 || index >= MAX_POCKETS as i64 || (!self.random && index == 0) {
                debug!(
                    "tool table {}:{lineno}: pocket {index} ignored",
                    path.display()
                );
                continue;
            }
            pockets[index as usize] = record;
            loaded += 1;
        }

        self.pockets = pockets;
        debug!("loaded {loaded} tools from {}", path.display());
        Ok(loaded)
    }

    /// Write every non-empty pocket to `path`.
    pub fn save(&self, path: &Path) -> Result<(), ToolTableError> {
        let file = File::create(path).map_err(|e| ToolTableError::bad_file(path, e))?;
        let mut out = BufWriter::new(file);
        let start = if self.random { 0 } else { 1 };

        let mut line = String::new();
        for (index, rec) in self.pockets.iter().enumerate().skip(start) {
            if rec.is_empty() {
                continue;
            }
            let pocket = if self.random {
                index as i32
            } else {
                rec.pocket_number
            };
            line.clear();
            format_record(&mut line, pocket, rec);
            writeln!(out, "{line}").map_err(|e| ToolTableError::bad_file(path, e))?;
        }
        out.flush().map_err(|e| ToolTableError::bad_file(path, e))
    }

    /// Save to the configured file.
    #[inline]
    pub fn persist(&self) -> Result<(), ToolTableError> {
        self.save(&self.path)
    }

    /// Bring `pocket` into the spindle slot.
    ///
    /// Random: swap with pocket 0 and persist. Sequential: copy into
    /// pocket 0, or empty it for the unload pocket 0.
    pub fn load_tool(&mut self, pocket: i32) -> Result<(), ToolTableError> {
        let index = Self::index(pocket)?;
        if self.random {
            self.pockets.swap(0, index);
            self.persist()
        } else {
            self.pockets[0] = if index == 0 {
                ToolRecord::empty()
            } else {
                self.pockets[index].clone()
            };
            Ok(())
        }
    }

    /// Overwrite the geometry of `pocket`, mirror it into the spindle slot
    /// when that tool is loaded, then persist.
    #[allow(clippy::too_many_arguments)]
    pub fn set_offset(
        &mut self,
        pocket: i32,
        tool_number: i32,
        offset: ToolOffset,
        diameter: f64,
        front_angle: f64,
        back_angle: f64,
        orientation: i32,
    ) -> Result<(), ToolTableError> {
        let index = Self::index(pocket)?;

        let apply = |rec: &mut ToolRecord| {
            rec.tool_number = tool_number;
            rec.offset = offset;
            rec.diameter = diameter;
            rec.front_angle = front_angle;
            rec.back_angle = back_angle;
            rec.orientation = orientation;
        };

        let rec = &mut self.pockets[index];
        if rec.is_empty() {
            rec.pocket_number = pocket;
        }
        apply(rec);

        if index != 0 && tool_number > 0 && self.pockets[0].tool_number == tool_number {
            apply(&mut self.pockets[0]);
        }
        self.persist()
    }

    /// Re-sync the spindle slot with `tool` after a reload. Sequential
    /// changers only; a random table already records the spindle.
    pub fn reload_tool_number(&mut self, tool: i32) -> Result<(), ToolTableError> {
        if self.random {
            return Ok(());
        }
        match self.find_pocket(tool) {
            Some(pocket) => self.load_tool(pocket),
            None => Ok(()),
        }
    }
}
