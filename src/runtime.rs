//! Startup facade tying settings, logger and usage reporter together.
//!
//! ```text
//! Runtime::initialize()
//!     → RuntimeSettings::from_env()   (every signal read once)
//!     → logger::init(&settings)       (global subscriber, configured marker)
//!     → UsageReporter::from_settings  (opt-out + tier baked in)
//! ```
//!
//! The config snapshot is deliberately not cached here: every
//! [`Runtime::resolve_config`] call reads the live environment.

use serde::Serialize;
use tracing::debug;

use crate::config::{self, ConfigSnapshot};
use crate::logger;
use crate::settings::RuntimeSettings;
use crate::telemetry::{Delivery, UsageReporter};

pub struct Runtime {
    settings: RuntimeSettings,
    reporter: UsageReporter,
}

impl Runtime {
    /// Resolve settings from the environment, configure logging and build
    /// the HTTP-backed reporter. Run once, before spawning workers.
    pub fn initialize() -> Self {
        let settings = RuntimeSettings::from_env();
        logger::init(&settings);
        let reporter = UsageReporter::from_settings(&settings);
        Self::announce(settings, reporter)
    }

    /// Same as [`Runtime::initialize`] with explicit parts.
    pub fn from_parts(settings: RuntimeSettings, reporter: UsageReporter) -> Self {
        logger::init(&settings);
        Self::announce(settings, reporter)
    }

    fn announce(settings: RuntimeSettings, reporter: UsageReporter) -> Self {
        debug!(
            mode = ?settings.mode,
            verbosity = ?settings.verbosity,
            tier = ?settings.tier,
            send_anon_usage = settings.send_anon_usage,
            "runtime initialized"
        );
        Self { settings, reporter }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn reporter(&self) -> &UsageReporter {
        &self.reporter
    }

    pub fn resolve_config(&self) -> ConfigSnapshot {
        config::resolve()
    }

    /// Fire-and-forget; see [`UsageReporter::report_event`].
    pub fn report_event<E>(&self, event: &E) -> Delivery
    where
        E: Serialize + ?Sized,
    {
        self.reporter.report_event(event)
    }

    pub fn propagated_env(&self) -> Vec<(&'static str, String)> {
        self.settings.propagated_env()
    }
}
