//! Configuration loading traits and types.
//!
//! The I/O controller is configured from a single TOML file:
//!
//! ```toml
//! [shared]
//! service_name = "iocontrol"
//! log_level = "info"
//!
//! [iocontrol]
//! tool_table = "tool.tbl"
//! cycle_time = 0.1
//! protocol_version = 2
//! random_toolchanger = false
//! support_start_change = false
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use iocontrol_common::config::{ConfigError, ConfigLoader, IoControlConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = IoControlConfig::load(Path::new("config/iocontrol.toml"))?;
//!     config.validate()?;
//!     println!("cycle time: {}s", config.iocontrol.cycle_time);
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{DEFAULT_CYCLE_TIME_S, DEFAULT_TOOL_TABLE, MAX_CYCLE_TIME_S};
use crate::signal::{Signal, SignalDirection, SignalKind};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields shared by every process of the workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Protocol Version ───────────────────────────────────────────────

/// Toolchanger handshake protocol version.
///
/// V1 is the plain prepare/change handshake. V2 adds toolchanger fault
/// reporting, the controller-originated abort handshake and the optional
/// start-change handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ProtocolVersion {
    V1 = 1,
    V2 = 2,
}

impl ProtocolVersion {
    /// True if V2-only signals and handshakes are active.
    #[inline]
    pub const fn is_v2(&self) -> bool {
        matches!(self, Self::V2)
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::V2
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = String;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            _ => Err(format!("unsupported protocol_version {value}, expected 1 or 2")),
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(value: ProtocolVersion) -> Self {
        value as u8
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", *self as u8)
    }
}

// ─── Debug Flags ────────────────────────────────────────────────────

bitflags! {
    /// Process-wide debug flags, settable at runtime through `SET_DEBUG`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DebugFlags: u32 {
        /// Configuration loading details.
        const CONFIG    = 0x0000_0002;
        /// Command/status channel traffic.
        const NML       = 0x0000_0040;
        /// RCS status transitions.
        const RCS       = 0x0000_0200;
        /// I/O controller verbose logging.
        const IOCONTROL = 0x0000_1000;
    }
}

impl Default for DebugFlags {
    fn default() -> Self {
        Self::empty()
    }
}

// ─── I/O Controller Settings ────────────────────────────────────────

fn default_tool_table() -> PathBuf {
    PathBuf::from(DEFAULT_TOOL_TABLE)
}

fn default_cycle_time() -> f64 {
    DEFAULT_CYCLE_TIME_S
}

/// Resolved settings the controller needs at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoSettings {
    /// Tool table file. Relative paths resolve against the config file directory.
    #[serde(default = "default_tool_table")]
    pub tool_table: PathBuf,

    /// Cycle period [s].
    #[serde(default = "default_cycle_time")]
    pub cycle_time: f64,

    /// Toolchanger protocol version.
    #[serde(default)]
    pub protocol_version: ProtocolVersion,

    /// Random (swap) toolchanger instead of sequential.
    #[serde(default)]
    pub random_toolchanger: bool,

    /// Honour `TOOL_START_CHANGE` (V2 only).
    #[serde(default)]
    pub support_start_change: bool,

    /// Initial debug flags.
    #[serde(default)]
    pub debug: u32,
}

impl Default for IoSettings {
    fn default() -> Self {
        Self {
            tool_table: default_tool_table(),
            cycle_time: DEFAULT_CYCLE_TIME_S,
            protocol_version: ProtocolVersion::default(),
            random_toolchanger: false,
            support_start_change: false,
            debug: 0,
        }
    }
}

impl IoSettings {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tool_table.as_os_str().is_empty() {
            return Err(ConfigError::ValidationError(
                "tool_table cannot be empty".to_string(),
            ));
        }
        if !(self.cycle_time > 0.0 && self.cycle_time <= MAX_CYCLE_TIME_S) {
            return Err(ConfigError::ValidationError(format!(
                "cycle_time must be in (0, {MAX_CYCLE_TIME_S}] seconds, got {}",
                self.cycle_time
            )));
        }
        if self.support_start_change && !self.protocol_version.is_v2() {
            tracing::warn!("support_start_change has no effect with protocol v1");
        }
        Ok(())
    }

    /// Cycle period as a `Duration`, zero when `cycle_time` is unrepresentable.
    #[inline]
    pub fn cycle_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.cycle_time).unwrap_or(Duration::ZERO)
    }

    /// Initial debug flags (unknown bits are kept).
    #[inline]
    pub fn debug_flags(&self) -> DebugFlags {
        DebugFlags::from_bits_retain(self.debug)
    }
}

// ─── Simulation ─────────────────────────────────────────────────────

/// Initial level of a simulated input point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignalLevel {
    Bit(bool),
    S32(i32),
}

/// Linked reaction: when `output` changes to `trigger`, after `delay_s`
/// seconds, drive `input` to `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkConfig {
    /// Output point watched for edges.
    pub output: Signal,
    /// Output level that fires this reaction.
    pub trigger: bool,
    /// Delay before the input changes [s].
    #[serde(default)]
    pub delay_s: f64,
    /// Input point driven by the reaction.
    pub input: Signal,
    /// Level written to `input`.
    pub result: bool,
}

/// Toolchanger simulator configuration (`[simulation]`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    /// Initial input levels keyed by signal name.
    #[serde(default)]
    pub inputs: BTreeMap<String, SignalLevel>,
    /// Linked output → input reactions. Empty selects the loopback set.
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

impl SimulationConfig {
    /// Initial input levels with their names resolved.
    pub fn resolved_inputs(&self) -> Result<Vec<(Signal, SignalLevel)>, ConfigError> {
        self.inputs
            .iter()
            .map(|(name, level)| {
                name.parse::<Signal>()
                    .map(|signal| (signal, *level))
                    .map_err(ConfigError::ValidationError)
            })
            .collect()
    }

    /// Validate directions, kinds and delays.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (signal, level) in &self.resolved_inputs()? {
            if signal.direction() != SignalDirection::In {
                return Err(ConfigError::ValidationError(format!(
                    "simulation input '{signal}' is not an input point"
                )));
            }
            let kind_ok = matches!(
                (signal.kind(), level),
                (SignalKind::Bit, SignalLevel::Bit(_)) | (SignalKind::S32, SignalLevel::S32(_))
            );
            if !kind_ok {
                return Err(ConfigError::ValidationError(format!(
                    "simulation input '{signal}' expects a {} value",
                    signal.kind()
                )));
            }
        }
        for link in &self.links {
            if link.output.direction() != SignalDirection::Out
                || link.output.kind() != SignalKind::Bit
            {
                return Err(ConfigError::ValidationError(format!(
                    "link output '{}' must be a bit output",
                    link.output
                )));
            }
            if link.input.direction() != SignalDirection::In || link.input.kind() != SignalKind::Bit
            {
                return Err(ConfigError::ValidationError(format!(
                    "link input '{}' must be a bit input",
                    link.input
                )));
            }
            if !link.delay_s.is_finite() || link.delay_s < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "link {} -> {}: delay_s must be >= 0, got {}",
                    link.output, link.input, link.delay_s
                )));
            }
        }
        Ok(())
    }
}

// ─── Top-Level Config ───────────────────────────────────────────────

/// Complete configuration file of the I/O controller process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IoControlConfig {
    /// Logging and identity.
    pub shared: SharedConfig,
    /// Controller settings.
    #[serde(default)]
    pub iocontrol: IoSettings,
    /// Optional toolchanger simulator.
    #[serde(default)]
    pub simulation: Option<SimulationConfig>,
}

impl IoControlConfig {
    /// Parse from a TOML string (for testing).
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.iocontrol.validate()?;
        if let Some(sim) = &self.simulation {
            sim.validate()?;
        }
        Ok(())
    }

    /// Make relative paths absolute with respect to `config_path`'s directory.
    pub fn resolve_paths(&mut self, config_path: &Path) {
        let base = config_path.parent().unwrap_or(Path::new("."));
        self.iocontrol.tool_table = resolve_path(base, &self.iocontrol.tool_table);
    }
}

/// Resolve a possibly relative path against a base directory.
pub fn resolve_path(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
