//! End-to-end scenarios over the public API. Nothing here touches the
//! process environment or the global subscriber: lookups and sinks are
//! injected.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use serde_json::{Value, json};
use sling_env::config::{self, CRED_JSON_BODY_ENC_VAR, CRED_JSON_BODY_VAR};
use sling_env::logger;
use sling_env::telemetry::{PRODUCTION_ENDPOINT, STAGING_ENDPOINT, Transport};
use sling_env::{AppError, Delivery, RuntimeSettings, UsageReporter};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layered, SubscriberExt};

fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[derive(Default)]
struct Recorder {
    urls: Mutex<Vec<String>>,
}

impl Transport for Recorder {
    fn post_json(&self, url: &str, _body: Vec<u8>) -> Result<u16, AppError> {
        self.urls.lock().unwrap().push(url.to_string());
        Ok(200)
    }
}

#[derive(Clone, Default)]
struct Sink(Arc<Mutex<Vec<u8>>>);

impl Sink {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Sink {
    type Writer = Sink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn empty_environment_snapshot() {
    let snap = config::resolve_from(lookup(&[]));
    assert_eq!(&snap["SLING_SAMPLE_SIZE"], "900");
    assert_eq!(&snap["SLING_CONCURENCY_LIMIT"], "10");
    assert_eq!(&snap["AWS_BUCKET"], "");
}

#[test]
fn encoded_credential_precedence_both_orders() {
    // Only the encoded form set: decoded into the plaintext slot.
    let snap = config::resolve_from(lookup(&[(CRED_JSON_BODY_ENC_VAR, "%7B%22a%22%3A1%7D")]));
    assert_eq!(&snap[CRED_JSON_BODY_VAR], r#"{"a":1}"#);

    // Both set: the decoded encoded form replaces the plaintext.
    let snap = config::resolve_from(lookup(&[
        (CRED_JSON_BODY_VAR, r#"{"plain":1}"#),
        (CRED_JSON_BODY_ENC_VAR, "%7B%22a%22%3A1%7D"),
    ]));
    assert_eq!(&snap[CRED_JSON_BODY_VAR], r#"{"a":1}"#);
}

#[test]
fn opt_out_sends_nothing() {
    let settings = RuntimeSettings::from_lookup(lookup(&[("SLING_SEND_ANON_USAGE", "false")]));
    let recorder = Arc::new(Recorder::default());
    let reporter = UsageReporter::with_transport(&settings, recorder.clone());

    let delivery = reporter.report_event(&json!({"x": 1}));

    assert_eq!(delivery, Delivery::OptedOut);
    assert!(recorder.urls.lock().unwrap().is_empty());
}

#[test]
fn tier_marker_picks_endpoint() {
    for (pairs, expected) in [
        (vec![("SLING_ENV", "STG")], STAGING_ENDPOINT),
        (vec![("SLING_ENV", "DEV")], PRODUCTION_ENDPOINT),
        (vec![], PRODUCTION_ENDPOINT),
    ] {
        let settings = RuntimeSettings::from_lookup(lookup(&pairs));
        let recorder = Arc::new(Recorder::default());
        let reporter = UsageReporter::with_transport(&settings, recorder.clone());
        let _ = reporter.report_event(&json!({"x": 1}));
        assert_eq!(recorder.urls.lock().unwrap().as_slice(), [expected.to_string()]);
    }
}

#[test]
fn worker_mode_logs_short_keys_to_stdout_only() {
    let settings = RuntimeSettings::from_lookup(lookup(&[("G_LOGGING", "WORKER")]));
    let out = Sink::default();
    let err = Sink::default();
    let subscriber = Registry::default()
        .with(settings.verbosity.level_filter())
        .with(logger::layer::<Layered<LevelFilter, Registry>, _, _>(
            &settings,
            out.clone(),
            err.clone(),
        ));

    tracing::subscriber::with_default(subscriber, || {
        tracing::info!("batch started");
        tracing::error!("batch failed");
    });

    assert!(err.text().is_empty());
    let records: Vec<Value> = out
        .text()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["lvl"], "info");
    assert_eq!(records[0]["msg"], "batch started");
    assert_eq!(records[1]["lvl"], "error");
}
