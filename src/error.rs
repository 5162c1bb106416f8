//! The error taxonomy used throughout this crate.
//!
//! [`Error`] is a flat top-level enum so that bot drivers can match on a
//! single type; the variants mirror the layered taxonomy from the design
//! (core/programmer errors, parsing, filesystem, transport, and the
//! MediaWiki-specific [`WikiError`] family used by the wire layer's retry
//! policy).

use std::fmt;
use std::path::PathBuf;

/// The result type used across this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An internal invariant was violated. Never expected to be caught by callers.
    #[error("internal invariant violated: {0}")]
    Core(String),

    /// Programmer misuse, such as writing before logging in.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Some textual input (JSON, ISO-8601, wikicode, a `WriteToken`) could not be decoded.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("permission denied: {0}")]
    Permission(PathBuf),

    #[error("system error: {0}")]
    System(#[source] std::io::Error),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Http(#[from] HttpError),

    /// The disk-backed HTTP cache was asked for a request it never saw.
    #[error("request not present in offline cache")]
    PageNotInCache,

    #[error(transparent)]
    Wiki(#[from] WikiError),

    #[error(transparent)]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Prepend context to the error message, preserving the underlying kind
    /// where that is observable (the string form is always extended).
    pub fn context(self, what: impl fmt::Display) -> Self {
        match self {
            Error::Core(m) => Error::Core(format!("{what}: {m}")),
            Error::InvalidState(m) => Error::InvalidState(format!("{what}: {m}")),
            Error::Wiki(w) => Error::Wiki(w.context(what)),
            other => Error::Core(format!("{what}: {other}")),
        }
    }

    /// Whether this failure is one the wire layer's retry loop should retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Http(_) | Error::Json(_) | Error::Wiki(WikiError::LowLevel(_))
        )
    }
}

/// Errors raised while decoding some textual input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Transport-level network failures (DNS, connect, timeout).
#[derive(thiserror::Error, Debug)]
#[error("network error: {0}")]
pub struct NetworkError(pub String);

/// Transport-level HTTP failures, refined by status code family.
#[derive(thiserror::Error, Debug)]
pub enum HttpError {
    #[error("HTTP {0}: {1}")]
    Other(u16, String),
    #[error("HTTP 403 Forbidden: {0}")]
    Forbidden(String),
    #[error("HTTP 404 Not Found: {0}")]
    NotFound(String),
    #[error("HTTP server error {0}: {1}")]
    ServerError(u16, String),
}

impl HttpError {
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            403 => HttpError::Forbidden(body),
            404 => HttpError::NotFound(body),
            500..=599 => HttpError::ServerError(status, body),
            other => HttpError::Other(other, body),
        }
    }
}

/// The kind of a retryable low-level failure observed while issuing a wiki API request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowLevelKind {
    Network,
    Http,
    Json,
    ReadOnly,
    Unspecified,
}

impl fmt::Display for LowLevelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LowLevelKind::Network => "network",
            LowLevelKind::Http => "http",
            LowLevelKind::Json => "json",
            LowLevelKind::ReadOnly => "readonly",
            LowLevelKind::Unspecified => "unspecified",
        };
        f.write_str(s)
    }
}

/// Errors raised by the MediaWiki request/session layer (§7, `WikiError`).
#[derive(thiserror::Error, Debug)]
pub enum WikiError {
    /// A retryable failure: network/HTTP/JSON trouble, or the server being in read-only mode.
    #[error("retryable low-level error ({0})")]
    LowLevel(LowLevelKind),

    /// A MediaWiki API error that isn't otherwise classified into a typed variant.
    #[error("API error {code}: {info}")]
    Api { code: String, info: String },

    /// The response didn't have the shape this client expected (used by pager loop detection too).
    #[error("unexpected API response: {0}")]
    UnexpectedResponse(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("page already exists: {0}")]
    PageAlreadyExists(String),

    #[error("page not found: {0}")]
    PageNotFound(String),

    #[error("page is protected: {0}")]
    ProtectedPage(String),

    /// The emergency-stop predicate fired; all writes are suppressed.
    #[error("emergency stop: {0}")]
    EmergencyStop(String),

    #[error("edit conflict on {0}")]
    EditConflict(String),

    /// `{{nobots}}`/`{{bots}}` forbid this bot from editing the page.
    #[error("excluded by bot-exclusion rules: {0}")]
    BotExclusion(String),
}

impl WikiError {
    fn context(self, what: impl fmt::Display) -> WikiError {
        match self {
            WikiError::Api { code, info } => WikiError::Api {
                code,
                info: format!("{what}: {info}"),
            },
            WikiError::UnexpectedResponse(m) => {
                WikiError::UnexpectedResponse(format!("{what}: {m}"))
            }
            WikiError::InvalidParameter(m) => WikiError::InvalidParameter(format!("{what}: {m}")),
            WikiError::PageAlreadyExists(m) => {
                WikiError::PageAlreadyExists(format!("{what}: {m}"))
            }
            WikiError::PageNotFound(m) => WikiError::PageNotFound(format!("{what}: {m}")),
            WikiError::ProtectedPage(m) => WikiError::ProtectedPage(format!("{what}: {m}")),
            WikiError::EmergencyStop(m) => WikiError::EmergencyStop(format!("{what}: {m}")),
            WikiError::EditConflict(m) => WikiError::EditConflict(format!("{what}: {m}")),
            WikiError::BotExclusion(m) => WikiError::BotExclusion(format!("{what}: {m}")),
            other @ WikiError::LowLevel(_) => other,
        }
    }

    /// Whether `apiRequest`'s per-attempt classification should retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WikiError::LowLevel(_))
    }

    /// Classify a raw `(code, info)` pair from a MediaWiki `error` object into a typed variant.
    pub fn classify(code: &str, info: &str) -> WikiError {
        match code {
            "readonly" => WikiError::LowLevel(LowLevelKind::ReadOnly),
            "editconflict" => WikiError::EditConflict(info.to_owned()),
            "articleexists" => WikiError::PageAlreadyExists(info.to_owned()),
            "missingtitle" => WikiError::PageNotFound(info.to_owned()),
            "invalidtitle" => WikiError::InvalidParameter(info.to_owned()),
            c if c.contains("protected") => WikiError::ProtectedPage(info.to_owned()),
            _ => WikiError::Api {
                code: code.to_owned(),
                info: info.to_owned(),
            },
        }
    }
}
