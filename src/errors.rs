//! Crate-wide error hierarchy for pr-reviewer.
//!
//! Goals:
//! - Single root `Error` for all public functions.
//! - Per-stage sub-enums so callers can tell a config problem from a model
//!   problem without string matching.
//! - No dynamic dispatch, ergonomic `?` via `From` impls.
//!
//! Most failures in this crate are *soft* by design (see the run loop):
//! they are logged, counted, and converted into per-file failure records
//! instead of aborting the run. The types below exist so those soft paths
//! still carry a precise reason.

use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type ReviewResult<T> = Result<T, Error>;

/// Root error type for the pr-reviewer crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Project configuration problems (unreadable/malformed record).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Model endpoint failure (timeout, HTTP status, transport).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Model response could not be interpreted (bad JSON, bad shape).
    #[error(transparent)]
    Interpret(#[from] InterpretError),

    /// Input validation errors (empty change set, bad paths, etc.).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Configuration record errors.
///
/// These are always recovered with the built-in default config; the enum
/// exists so the recovery site can log what actually went wrong.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed config record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Model endpoint errors.
#[derive(Debug, Error)]
pub enum ModelError {
    /// Request exceeded the configured bound.
    #[error("model call timed out")]
    Timeout,

    /// Non-success HTTP status from the endpoint.
    #[error("model endpoint status {0}")]
    HttpStatus(u16),

    /// Network/transport failure without status (DNS/connect/reset).
    #[error("network error: {0}")]
    Network(String),

    /// Endpoint did not use an http(s) scheme.
    #[error("invalid model endpoint: {0}")]
    InvalidEndpoint(String),

    /// Completion arrived with no usable choice/content.
    #[error("empty model response")]
    EmptyResponse,
}

/// Model-response interpretation errors (per-file soft failures).
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response violates expected schema: {0}")]
    Schema(String),
}

// ===== Conversions for `?` ergonomics =====

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ModelError::Timeout;
        }
        if let Some(status) = e.status() {
            return ModelError::HttpStatus(status.as_u16());
        }
        ModelError::Network(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Model(ModelError::from(e))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Interpret(InterpretError::Json(e))
    }
}
