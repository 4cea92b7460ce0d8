//! Runtime environment for sling.
//!
//! - **config** — allowlisted env-var snapshot with defaults and decoding.
//! - **settings** — logging / usage signals resolved once at startup.
//! - **logger** — tracing-subscriber setup per deployment mode.
//! - **telemetry** — best-effort anonymous usage events.
//! - **runtime** — startup facade over the above.

pub mod config;
pub mod error;
pub mod logger;
pub mod runtime;
pub mod settings;
pub mod telemetry;

pub use config::{ConfigSnapshot, resolve};
pub use error::AppError;
pub use runtime::Runtime;
pub use settings::{LoggingMode, RuntimeSettings, Tier, Verbosity};
pub use telemetry::{Delivery, UsageEvent, UsageReporter};
