//! Environment-variable config snapshot.
//!
//! [`resolve`] reads a fixed allowlist of variables from the process
//! environment, applies the two numeric defaults and decodes the
//! URL-encoded GCP credential body. Anything outside [`ALLOWLIST`] is never
//! surfaced. Resolution is total: malformed optional input degrades, it
//! never fails.

use std::{collections::BTreeMap, env, fmt, ops::Index};

use percent_encoding::percent_decode_str;
use tracing::debug;

use crate::error::AppError;

pub const CONCURRENCY_LIMIT_VAR: &str = "SLING_CONCURENCY_LIMIT";
pub const SAMPLE_SIZE_VAR: &str = "SLING_SAMPLE_SIZE";
pub const CRED_JSON_BODY_VAR: &str = "GC_CRED_JSON_BODY";
pub const CRED_JSON_BODY_ENC_VAR: &str = "GC_CRED_JSON_BODY_ENC";

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10;
pub const DEFAULT_SAMPLE_SIZE: usize = 900;

/// Every variable the snapshot carries, in display order.
pub const ALLOWLIST: &[&str] = &[
    "SLING_PARALLEL",
    "AWS_BUCKET",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AWS_ENDPOINT",
    "AWS_REGION",
    "SLING_COMPRESSION",
    "SLING_FILE_ROW_LIMIT",
    SAMPLE_SIZE_VAR,
    "GC_BUCKET",
    "GC_CRED_FILE",
    "GSHEETS_CRED_FILE",
    CRED_JSON_BODY_VAR,
    CRED_JSON_BODY_ENC_VAR,
    "GC_CRED_API_KEY",
    "AZURE_ACCOUNT",
    "AZURE_KEY",
    "AZURE_CONTAINER",
    "AZURE_SAS_SVC_URL",
    "AZURE_CONN_STR",
    "SSH_TUNNEL",
    "SSH_PRIVATE_KEY",
    "SSH_PUBLIC_KEY",
    CONCURRENCY_LIMIT_VAR,
    // notifications
    "SLING_SMTP_HOST",
    "SLING_SMTP_PORT",
    "SLING_SMTP_USERNAME",
    "SLING_SMTP_PASSWORD",
    "SLING_SMTP_FROM_EMAIL",
    "SLING_SMTP_REPLY_EMAIL",
    // file transfer
    "SFTP_USER",
    "SFTP_PASSWORD",
    "SFTP_HOST",
    "SFTP_PORT",
    "SFTP_PRIVATE_KEY",
    "SFTP_URL",
    // http / sheets
    "HTTP_USER",
    "HTTP_PASSWORD",
    "GSHEET_CLIENT_JSON_BODY",
    "GSHEET_SHEET_NAME",
    "GSHEET_MODE",
    // api tokens
    "DIGITALOCEAN_ACCESS_TOKEN",
    "GITHUB_ACCESS_TOKEN",
    "SURVEYMONKEY_ACCESS_TOKEN",
    // usage reporting
    "SLING_SEND_ANON_USAGE",
    "SLING_HOME",
];

/// Name fragments that mark a variable as credential-bearing.
const SECRET_MARKERS: &[&str] = &[
    "KEY", "SECRET", "PASSWORD", "TOKEN", "CRED", "CONN_STR", "SAS", "JSON_BODY",
];

/// Immutable mapping from allowlisted name to value.
///
/// Every allowlisted name is present, possibly as `""`.
#[derive(Clone, PartialEq, Eq)]
pub struct ConfigSnapshot {
    values: BTreeMap<&'static str, String>,
}

impl ConfigSnapshot {
    /// `None` only for names outside the allowlist.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// `(name, value)` pairs in allowlist order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        ALLOWLIST
            .iter()
            .map(|name| (*name, self.values.get(name).map_or("", String::as_str)))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `SLING_CONCURENCY_LIMIT` as a number, falling back to the default
    /// when it does not parse.
    pub fn concurrency_limit(&self) -> usize {
        self.parse_or(CONCURRENCY_LIMIT_VAR, DEFAULT_CONCURRENCY_LIMIT)
    }

    /// `SLING_SAMPLE_SIZE` as a number, falling back to the default when it
    /// does not parse.
    pub fn sample_size(&self) -> usize {
        self.parse_or(SAMPLE_SIZE_VAR, DEFAULT_SAMPLE_SIZE)
    }

    fn parse_or(&self, name: &str, default: usize) -> usize {
        self.get(name)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}

/// Unknown names index to `""`, like a missing variable.
impl Index<&str> for ConfigSnapshot {
    type Output = str;

    fn index(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }
}

/// Credential values are masked so a snapshot can go into a log line.
impl fmt::Debug for ConfigSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(name, value)| {
                let shown = if is_secret(name) && !value.is_empty() { "***" } else { value };
                (name, shown)
            }))
            .finish()
    }
}

/// `true` for variables whose values must never be logged.
pub fn is_secret(name: &str) -> bool {
    SECRET_MARKERS.iter().any(|marker| name.contains(marker))
}

/// Resolve the snapshot from the process environment.
pub fn resolve() -> ConfigSnapshot {
    resolve_from(|name| env::var(name).ok())
}

/// Resolve against an explicit lookup.
/// Tests pass a map here instead of mutating env vars.
pub fn resolve_from<F>(lookup: F) -> ConfigSnapshot
where
    F: Fn(&str) -> Option<String>,
{
    let mut values: BTreeMap<&'static str, String> = ALLOWLIST
        .iter()
        .map(|name| (*name, lookup(name).unwrap_or_default()))
        .collect();

    default_if_empty(&mut values, CONCURRENCY_LIMIT_VAR, DEFAULT_CONCURRENCY_LIMIT);
    default_if_empty(&mut values, SAMPLE_SIZE_VAR, DEFAULT_SAMPLE_SIZE);

    let encoded = values.get(CRED_JSON_BODY_ENC_VAR).cloned().unwrap_or_default();
    if !encoded.is_empty() {
        match query_unescape(&encoded) {
            Ok(body) => {
                values.insert(CRED_JSON_BODY_VAR, body);
            }
            Err(e) => debug!(var = CRED_JSON_BODY_ENC_VAR, error = %e, "keeping plaintext credential body"),
        }
    }

    ConfigSnapshot { values }
}

fn default_if_empty(values: &mut BTreeMap<&'static str, String>, name: &'static str, default: usize) {
    if let Some(value) = values.get_mut(name) {
        if value.is_empty() {
            *value = default.to_string();
        }
    }
}

/// Decode a query-string escaped value: `+` is a space, `%XX` a byte.
///
/// Fails on a `%` not followed by two hex digits, or when the decoded bytes
/// are not UTF-8.
pub fn query_unescape(raw: &str) -> Result<String, AppError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let well_formed = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !well_formed {
                return Err(AppError::Decode(format!("invalid escape at byte {i}")));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| AppError::Decode(e.to_string()))
}
