// Error types for the collaborator boundaries.
//
// None of these reach the user: fetch failures are retried on the fixed
// backoff and store failures are logged and swallowed by the engine.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("team request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("team directory returned HTTP {status}")]
    Status { status: u16 },

    #[error("failed to decode team list: {message}")]
    Decode { message: String },

    #[error("no signed-in user")]
    NoSession,

    #[error("team directory unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("config I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config file {path} does not hold a JSON object")]
    NotAnObject { path: PathBuf },

    #[error("config store unavailable: {0}")]
    Unavailable(String),
}
