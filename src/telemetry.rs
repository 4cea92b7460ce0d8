//! Anonymous usage events.
//!
//! [`UsageReporter::report_event`] is fire-and-forget by design: it never
//! propagates a failure, and the [`Delivery`] it returns is informational.
//! Call sites are expected to drop it.
//!
//! The POST itself is synchronous and blocks for at most
//! [`REQUEST_TIMEOUT`]. Callers that cannot afford that dispatch the call
//! onto their own background thread; the blocking client must not be driven
//! from inside an async runtime worker.

use std::{sync::Arc, time::Duration};

use reqwest::{blocking::Client, header::CONTENT_TYPE};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::AppError;
use crate::settings::{RuntimeSettings, Tier};

pub const PRODUCTION_ENDPOINT: &str = "https://logapi.slingdata.io/log/event/prd";
pub const STAGING_ENDPOINT: &str = "https://logapi.slingdata.io/log/event/stg";
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Free-form event payload, sent verbatim.
pub type UsageEvent = Map<String, Value>;

/// Outbound leg of a usage event.
pub trait Transport: Send + Sync {
    /// POST `body` to `url` as `application/json`; returns the status code.
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, AppError>;
}

/// [`Transport`] over a blocking reqwest client with a fixed timeout.
///
/// `reqwest::blocking::Client` is an `Arc` internally, so sharing one
/// transport across threads is cheap.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, AppError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json(&self, url: &str, body: Vec<u8>) -> Result<u16, AppError> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()?;
        Ok(response.status().as_u16())
    }
}

/// What happened to one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Usage reporting is switched off; nothing was serialised or sent.
    OptedOut,
    /// The collector answered with a 2xx status.
    Sent { status: u16 },
    /// Serialisation, transport or the collector failed; the event is gone.
    Dropped,
}

/// Sends usage events to the collector for the configured tier.
///
/// Immutable after construction, so one reporter can be shared by
/// reference across worker threads.
pub struct UsageReporter {
    enabled: bool,
    endpoint: &'static str,
    debug_low: bool,
    transport: Option<Arc<dyn Transport>>,
}

impl UsageReporter {
    /// Reporter backed by [`HttpTransport`]. No client is built when the
    /// user opted out.
    pub fn from_settings(settings: &RuntimeSettings) -> Self {
        let transport = if settings.send_anon_usage {
            match HttpTransport::new() {
                Ok(http) => Some(Arc::new(http) as Arc<dyn Transport>),
                Err(e) => {
                    if settings.verbosity.is_debug_low() {
                        warn!(error = %e, "usage reporting unavailable");
                    }
                    None
                }
            }
        } else {
            None
        };
        Self::build(settings, transport)
    }

    /// Reporter over an explicit transport.
    pub fn with_transport(settings: &RuntimeSettings, transport: Arc<dyn Transport>) -> Self {
        Self::build(settings, Some(transport))
    }

    fn build(settings: &RuntimeSettings, transport: Option<Arc<dyn Transport>>) -> Self {
        Self {
            enabled: settings.send_anon_usage,
            endpoint: endpoint_for(settings.tier),
            debug_low: settings.verbosity.is_debug_low(),
            transport,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    /// Serialise `event` and POST it once. Failures are logged only at
    /// low-level debug verbosity and otherwise vanish.
    pub fn report_event<E>(&self, event: &E) -> Delivery
    where
        E: Serialize + ?Sized,
    {
        if !self.enabled {
            return Delivery::OptedOut;
        }

        let body = match serde_json::to_vec(event) {
            Ok(body) => body,
            Err(e) => {
                self.note(&AppError::from(e));
                return Delivery::Dropped;
            }
        };

        let Some(transport) = &self.transport else {
            return Delivery::Dropped;
        };

        let outcome = transport
            .post_json(self.endpoint, body)
            .and_then(|status| {
                if (200..300).contains(&status) {
                    Ok(status)
                } else {
                    Err(AppError::Status(status))
                }
            });

        match outcome {
            Ok(status) => Delivery::Sent { status },
            Err(e) => {
                self.note(&e);
                Delivery::Dropped
            }
        }
    }

    fn note(&self, error: &AppError) {
        if self.debug_low {
            warn!(error = %error, endpoint = self.endpoint, "usage event not delivered");
        }
    }
}

/// Exactly two collectors exist; only the staging marker selects the
/// staging one.
pub fn endpoint_for(tier: Tier) -> &'static str {
    match tier {
        Tier::Staging => STAGING_ENDPOINT,
        Tier::Production => PRODUCTION_ENDPOINT,
    }
}
