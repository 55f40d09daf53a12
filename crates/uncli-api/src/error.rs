use std::fmt;
use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// A single failure talking to the controller or the key-value store.
///
/// `uncli-core` wraps these (via [`SessionError`]) into the errors the CLI
/// reports.
#[derive(Debug, Error)]
pub enum Error {
    // ── Session ─────────────────────────────────────────────────────
    /// `login()` was called on a session with no login strategy.
    #[error("uninitialized session")]
    Uninitialized,

    /// Login round trip failed; the cause is the next entry in the chain.
    #[error("authentication failed for user '{username}'")]
    Authentication { username: String },

    /// Controller answered outside the 2xx/3xx range. The body is kept
    /// so callers can still show what the controller said.
    #[error("controller returned HTTP {status}")]
    Status { status: StatusCode, body: String },

    /// Envelope decoded but `meta.rc` was not `"ok"`.
    #[error("controller rejected request: {message}")]
    Rejected { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Key-value store ─────────────────────────────────────────────
    /// Consul answered a KV request with an unexpected status.
    #[error("key-value store error: {message}")]
    Kv { message: String },
}

impl Error {
    /// HTTP status of a [`Status`](Self::Status) failure.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Response body carried by a [`Status`](Self::Status) failure.
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Returns `true` for failures that happened before any byte reached
    /// the controller (bad URL, refused connection, client setup).
    pub fn is_connect(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
            Self::InvalidUrl(_) | Self::Tls(_) => true,
            _ => false,
        }
    }
}

// ── Accumulated session failures ────────────────────────────────────

/// Every failure a [`Session`](crate::Session) has recorded, most recent first.
///
/// Once a session has failed it hands out clones of this value from every
/// call. `Display` prints each failure on its own line so the reported text
/// carries the whole history, not just the last step.
#[derive(Debug, Clone)]
pub struct SessionError {
    latest: Arc<Error>,
    earlier: Vec<Arc<Error>>,
}

impl SessionError {
    /// Record `error` in front of the existing chain.
    pub(crate) fn push(&mut self, error: Error) {
        let previous = std::mem::replace(&mut self.latest, Arc::new(error));
        self.earlier.insert(0, previous);
    }

    /// The most recent failure.
    pub fn latest(&self) -> &Error {
        &self.latest
    }

    /// The failure that first broke the session.
    pub fn original(&self) -> &Error {
        self.earlier.last().unwrap_or(&self.latest)
    }

    /// All failures, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &Error> {
        std::iter::once(self.latest.as_ref()).chain(self.earlier.iter().map(Arc::as_ref))
    }

    /// Body of the most recent HTTP status failure, if any.
    pub fn response_body(&self) -> Option<&str> {
        self.iter().find_map(Error::response_body)
    }
}

impl From<Error> for SessionError {
    fn from(error: Error) -> Self {
        Self {
            latest: Arc::new(error),
            earlier: Vec::new(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for SessionError {}
