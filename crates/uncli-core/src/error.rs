// ── Core error types ──
//
// Errors surfaced by the dispatcher and the KV sync adapter. Session
// failures pass through untouched so the accumulated history survives;
// store failures gain the operation and key they happened on.

use thiserror::Error;

use uncli_api::SessionError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The controller session failed (login, listing, or a device action).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A key-value store operation failed.
    #[error("cannot {operation} '{key}' in key-value store: {source}")]
    Store {
        operation: &'static str,
        key: String,
        #[source]
        source: uncli_api::Error,
    },

    /// Writing results to the console failed.
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),

    /// A device could not be encoded for JSON output.
    #[error("failed to encode device: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CoreError {
    pub(crate) fn store(operation: &'static str, key: &str, source: uncli_api::Error) -> Self {
        Self::Store {
            operation,
            key: key.to_owned(),
            source,
        }
    }

    /// Returns `true` if the key-value store could not be reached at all.
    pub fn is_store_unreachable(&self) -> bool {
        matches!(self, Self::Store { source, .. } if source.is_connect())
    }
}
