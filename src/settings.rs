//! Runtime signals resolved once at startup.
//!
//! Every environment switch that steers logging or usage reporting is read
//! here exactly once into [`RuntimeSettings`], which is then handed to
//! [`crate::logger`] and [`crate::telemetry`]. Nothing downstream reads the
//! environment again.
//!
//! Signals:
//! - `_DEBUG`: `TRACE`, `LOW`, any other non-empty value means debug.
//! - `SLING_LOGGING_COLOR`: ANSI colour, off unless truthy.
//! - `_DEBUG_CALLER_LEVEL`: source attribution on log records.
//! - `G_LOGGING`: `TASK`, `MASTER`, `WORKER`.
//! - `SLING_ENV`: `STG` selects the staging collector.
//! - `SLING_SEND_ANON_USAGE`: usage reporting switch.

use std::env;

use tracing::level_filters::LevelFilter;

pub const SEND_ANON_USAGE_VAR: &str = "SLING_SEND_ANON_USAGE";

/// Log verbosity selected by `_DEBUG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    #[default]
    Info,
    Debug,
    /// Debug output plus the low-level diagnostics (swallowed telemetry
    /// errors, fuller console timestamps).
    DebugLow,
    Trace,
}

impl Verbosity {
    fn from_signal(raw: &str) -> Self {
        match raw {
            "" => Self::Info,
            "TRACE" => Self::Trace,
            "LOW" => Self::DebugLow,
            _ => Self::Debug,
        }
    }

    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Info => LevelFilter::INFO,
            Self::Debug | Self::DebugLow => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    /// `true` when low-level diagnostics should be emitted.
    pub fn is_debug_low(self) -> bool {
        matches!(self, Self::DebugLow | Self::Trace)
    }
}

/// Deployment mode selected by `G_LOGGING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// Output captured by a supervising process.
    Task,
    Master,
    Worker,
    /// Interactive console.
    #[default]
    Default,
}

impl LoggingMode {
    fn from_signal(raw: &str) -> Self {
        match raw {
            "TASK" => Self::Task,
            "MASTER" => Self::Master,
            "WORKER" => Self::Worker,
            _ => Self::Default,
        }
    }
}

/// Usage collector tier selected by `SLING_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tier {
    Staging,
    #[default]
    Production,
}

impl Tier {
    fn from_signal(raw: &str) -> Self {
        if raw == "STG" { Self::Staging } else { Self::Production }
    }
}

/// Fully-resolved runtime signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub verbosity: Verbosity,
    /// ANSI colour on console output.
    pub color: bool,
    /// Raw `_DEBUG_CALLER_LEVEL`; `Some` turns on file:line attribution.
    pub caller_depth: Option<i64>,
    pub mode: LoggingMode,
    pub tier: Tier,
    /// `false` once the user opted out of anonymous usage reporting.
    pub send_anon_usage: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Info,
            color: false,
            caller_depth: None,
            mode: LoggingMode::Default,
            tier: Tier::Production,
            send_anon_usage: true,
        }
    }
}

impl RuntimeSettings {
    /// Read every signal from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve from an arbitrary lookup. Tests pass a map here instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).unwrap_or_default();

        // Only a recognised false spelling opts out.
        let send_anon_usage = parse_bool(&read(SEND_ANON_USAGE_VAR)).unwrap_or(true);
        let caller_depth = match read("_DEBUG_CALLER_LEVEL").as_str() {
            "" => None,
            raw => Some(to_int(raw)),
        };

        Self {
            verbosity: Verbosity::from_signal(&read("_DEBUG")),
            color: to_bool(&read("SLING_LOGGING_COLOR")),
            caller_depth,
            mode: LoggingMode::from_signal(&read("G_LOGGING")),
            tier: Tier::from_signal(&read("SLING_ENV")),
            send_anon_usage,
        }
    }

    /// Variables a child process needs to inherit the opt-out decision.
    pub fn propagated_env(&self) -> Vec<(&'static str, String)> {
        vec![(SEND_ANON_USAGE_VAR, self.send_anon_usage.to_string())]
    }
}

/// Lenient boolean coercion: the usual spellings of true and false are
/// recognised, everything else is `false`.
pub fn to_bool(raw: &str) -> bool {
    parse_bool(raw).unwrap_or(false)
}

/// Strict boolean parse; `None` for anything that is not a known spelling.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Lenient integer coercion; anything unparsable is `0`.
pub fn to_int(raw: &str) -> i64 {
    raw.trim().parse().unwrap_or(0)
}
