//! Global logger re-initialisation. Kept alone in its own test binary so no
//! other test races on the process-wide subscriber.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use sling_env::logger;
use sling_env::{LoggingMode, RuntimeSettings, Verbosity};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::MakeWriter;

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Buffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Buffer {
    type Writer = Buffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn second_init_wins() {
    assert!(!logger::is_configured());
    assert_eq!(logger::active_mode(), None);

    let first = RuntimeSettings {
        mode: LoggingMode::Worker,
        ..Default::default()
    };
    let (first_out, first_err) = (Buffer::default(), Buffer::default());
    logger::try_init_with(&first, first_out.clone(), first_err.clone()).unwrap();
    assert!(logger::is_configured());
    assert_eq!(logger::active_mode(), Some(LoggingMode::Worker));
    assert_eq!(LevelFilter::current(), LevelFilter::INFO);
    tracing::info!("first configuration");

    let record: Value = serde_json::from_str(first_out.contents().trim()).unwrap();
    assert_eq!(record["msg"], "first configuration");
    assert!(first_err.contents().is_empty());

    let second = RuntimeSettings {
        mode: LoggingMode::Task,
        verbosity: Verbosity::Trace,
        ..Default::default()
    };
    let (second_out, second_err) = (Buffer::default(), Buffer::default());
    logger::try_init_with(&second, second_out.clone(), second_err.clone()).unwrap();
    assert_eq!(logger::active_mode(), Some(LoggingMode::Task));
    assert_eq!(LevelFilter::current(), LevelFilter::TRACE);
    tracing::trace!("second configuration");
    tracing::warn!("second warning");

    // The old sinks are detached and the new format is console text.
    assert!(!first_out.contents().contains("second"));
    let out = second_out.contents();
    let line = out.lines().next().unwrap();
    assert!(line.contains("TRACE") && line.contains("second configuration"));
    assert!(serde_json::from_str::<Value>(line).is_err());
    assert!(second_err.contents().contains("second warning"));
    assert!(!out.contains("second warning"));

    // The plain entry points reload too and never fail once installed.
    logger::init(&second);
    assert!(logger::try_init(&first).is_ok());
    assert_eq!(logger::active_mode(), Some(LoggingMode::Worker));
}
