//! Crate-wide error type.
//!
//! None of the public entry points hand this to callers: resolution,
//! logger setup and usage reporting all degrade instead of failing. The
//! fallible internals return it so the swallow happens in one visible place.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("logger error: {0}")]
    Logger(String),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(u16),
}
