//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after [`RuntimeSettings`] are resolved.
//! The installed subscriber is a registry with two reloadable layers, a
//! [`LevelFilter`] and the mode-specific formatting layer, so a second call
//! swaps both in place instead of failing: last write wins.
//!
//! | mode            | sinks                          | format                        |
//! |-----------------|--------------------------------|-------------------------------|
//! | task            | warn+ → stderr, rest → stdout  | console, full time, no colour |
//! | master / worker | stdout                         | JSON with `lvl` / `msg` keys  |
//! | default         | stderr                         | console, short time           |

use std::{
    fmt::{self as std_fmt, Debug},
    io,
    sync::{Mutex, OnceLock},
};

use chrono::Local;
use serde_json::{Map, Value};
use tracing::{
    Event, Level, Subscriber,
    field::{Field, Visit},
    level_filters::LevelFilter,
};
use tracing_subscriber::{
    Layer, Registry,
    fmt::{
        self, FmtContext, FormatEvent, FormatFields, MakeWriter,
        format::Writer,
        time::FormatTime,
        writer::MakeWriterExt,
    },
    layer::{Layered, SubscriberExt},
    registry::LookupSpan,
    reload,
};

use crate::error::AppError;
use crate::settings::{LoggingMode, RuntimeSettings};

pub const TIME_KEY: &str = "time";
pub const LEVEL_KEY: &str = "lvl";
pub const MESSAGE_KEY: &str = "msg";
pub const CALLER_KEY: &str = "caller";

const FULL_TIME: &str = "%Y-%m-%d %H:%M:%S";
const SHORT_TIME: &str = "%-I:%M%p";

pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

type Base = Layered<reload::Layer<LevelFilter, Registry>, Registry>;

/// Handles to the installed global subscriber. Its presence is the
/// process-wide "configured" marker.
struct Installed {
    level: reload::Handle<LevelFilter, Registry>,
    format: reload::Handle<BoxedLayer<Base>, Base>,
    mode: Mutex<LoggingMode>,
}

static INSTALLED: OnceLock<Installed> = OnceLock::new();

/// Configure global logging. Never fails: logging has to be up to report
/// anything else, so errors here are dropped.
pub fn init(settings: &RuntimeSettings) {
    let _ = try_init(settings);
}

/// Install the global subscriber, or reconfigure it if already installed.
pub fn try_init(settings: &RuntimeSettings) -> Result<(), AppError> {
    try_init_with(settings, io::stdout, io::stderr)
}

/// [`try_init`] against explicit standard-output and standard-error sinks.
pub fn try_init_with<O, E>(settings: &RuntimeSettings, out: O, err: E) -> Result<(), AppError>
where
    O: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = settings.verbosity.level_filter();
    let format = layer::<Base, _, _>(settings, out, err);

    if let Some(installed) = INSTALLED.get() {
        installed
            .level
            .reload(filter)
            .map_err(|e| AppError::Logger(format!("cannot reload level: {e}")))?;
        installed
            .format
            .reload(format)
            .map_err(|e| AppError::Logger(format!("cannot reload format: {e}")))?;
        if let Ok(mut mode) = installed.mode.lock() {
            *mode = settings.mode;
        }
        return Ok(());
    }

    let (level_layer, level) = reload::Layer::new(filter);
    let (format_layer, format) = reload::Layer::new(format);
    let subscriber = Registry::default().with(level_layer).with(format_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))?;

    let _ = INSTALLED.set(Installed {
        level,
        format,
        mode: Mutex::new(settings.mode),
    });
    Ok(())
}

/// `true` once [`init`] has installed the global subscriber.
pub fn is_configured() -> bool {
    INSTALLED.get().is_some()
}

/// Mode of the most recent successful initialisation.
pub fn active_mode() -> Option<LoggingMode> {
    INSTALLED.get()?.mode.lock().ok().map(|mode| *mode)
}

/// Build the formatting layer for `settings` against explicit sinks.
///
/// `out` and `err` are the standard-output and standard-error channels;
/// tests hand in capture buffers.
pub fn layer<S, O, E>(settings: &RuntimeSettings, out: O, err: E) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    O: for<'w> MakeWriter<'w> + Send + Sync + 'static,
    E: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let attribute = settings.caller_depth.is_some();

    match settings.mode {
        LoggingMode::Task => fmt::layer()
            .with_writer(err.with_max_level(Level::WARN).or_else(out))
            .with_ansi(false)
            .with_timer(ConsoleTime(FULL_TIME))
            .with_file(attribute)
            .with_line_number(attribute)
            .boxed(),
        LoggingMode::Master | LoggingMode::Worker => fmt::layer()
            .event_format(ShortKeyJson { attribute })
            .with_writer(out)
            .with_ansi(false)
            .boxed(),
        LoggingMode::Default => {
            let format = if settings.verbosity.is_debug_low() { FULL_TIME } else { SHORT_TIME };
            fmt::layer()
                .with_writer(err)
                .with_ansi(settings.color)
                .with_timer(ConsoleTime(format))
                .with_file(attribute)
                .with_line_number(attribute)
                .boxed()
        }
    }
}

// ── Console time ──────────────────────────────────────────────────────────────

/// Local wall-clock time in a `strftime` format.
#[derive(Debug, Clone, Copy)]
struct ConsoleTime(&'static str);

impl FormatTime for ConsoleTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std_fmt::Result {
        write!(w, "{}", Local::now().format(self.0))
    }
}

// ── Short-key JSON ────────────────────────────────────────────────────────────

/// One JSON object per line with `time`, `lvl`, `msg` and the event fields
/// flattened beside them. Span context is not recorded.
#[derive(Debug, Clone, Copy)]
struct ShortKeyJson {
    attribute: bool,
}

impl<S, N> FormatEvent<S, N> for ShortKeyJson
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        let mut record = Map::new();
        record.insert(TIME_KEY.into(), Value::String(Local::now().to_rfc3339()));
        record.insert(
            LEVEL_KEY.into(),
            Value::String(meta.level().to_string().to_lowercase()),
        );
        record.insert(
            MESSAGE_KEY.into(),
            Value::String(fields.message.unwrap_or_default()),
        );
        if self.attribute {
            if let (Some(file), Some(line)) = (meta.file(), meta.line()) {
                record.insert(CALLER_KEY.into(), Value::String(format!("{file}:{line}")));
            }
        }
        for (key, value) in fields.values {
            record.entry(key).or_insert(value);
        }

        let line = serde_json::to_string(&record).map_err(|_| std_fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    values: Map<String, Value>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.values.insert(field.name().to_owned(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        self.insert(field, Value::String(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, Value::String(value.to_owned()));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, Value::from(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, Value::from(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, Value::from(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, Value::from(value));
    }
}
