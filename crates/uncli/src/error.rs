//! CLI error types with miette diagnostics.
//!
//! Maps config, session and core failures into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use uncli_api::SessionError;
use uncli_config::ConfigError;
use uncli_core::CoreError;

/// Process exit codes. Usage errors (2) are produced by clap itself.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────
    #[error("invalid configuration")]
    #[diagnostic(
        code(uncli::config),
        help(
            "Check the config file (see: uncli config path) and the UNIFI_* \
             environment variables."
        )
    )]
    Config(#[source] ConfigError),

    // ── Controller ───────────────────────────────────────────────────
    #[error("could not set up a session for {endpoint}")]
    #[diagnostic(
        code(uncli::session),
        help("Check the endpoint URL and, if set, the ca_cert path.")
    )]
    SessionSetup {
        endpoint: String,
        #[source]
        source: uncli_api::Error,
    },

    #[error("login to {endpoint} failed")]
    #[diagnostic(
        code(uncli::auth_failed),
        help(
            "Verify the controller is reachable and the credentials are right.\n\
             Set UNIFI_USERNAME / UNIFI_PASSWORD, or store the password in the \
             system keyring under service 'uncli'.\n\
             Self-signed certificate? Try --insecure (-k)."
        )
    )]
    AuthFailed {
        endpoint: String,
        #[source]
        source: SessionError,
    },

    #[error("controller request failed")]
    #[diagnostic(code(uncli::controller))]
    Controller(#[source] SessionError),

    // ── Key-value store ──────────────────────────────────────────────
    #[error("invalid key-value store address '{address}'")]
    #[diagnostic(
        code(uncli::kv_setup),
        help("CONSUL_HTTP_ADDR takes host:port or a full http(s) URL.")
    )]
    KvSetup {
        address: String,
        #[source]
        source: uncli_api::Error,
    },

    #[error("could not reach the key-value store at {address}")]
    #[diagnostic(
        code(uncli::kv_unreachable),
        help("Set CONSUL_HTTP_ADDR (and CONSUL_HTTP_SSL for https) to the Consul agent.")
    )]
    KvUnreachable {
        address: String,
        #[source]
        source: CoreError,
    },

    #[error("key-value store request failed")]
    #[diagnostic(
        code(uncli::kv),
        help("A 403 usually means CONSUL_HTTP_TOKEN lacks key write permission.")
    )]
    Store(#[source] CoreError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to encode output: {0}")]
    #[diagnostic(code(uncli::json))]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl CliError {
    /// Map a core failure against the Consul agent at `address`.
    pub fn from_store(address: &str, err: CoreError) -> Self {
        match err {
            CoreError::Store { .. } if err.is_store_unreachable() => Self::KvUnreachable {
                address: address.to_owned(),
                source: err,
            },
            other => Self::from(other),
        }
    }

    /// Map this error to an exit code for process termination.
    ///
    /// A closed stdout (`uncli list | head`) is not a failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(err) if err.kind() == std::io::ErrorKind::BrokenPipe => exit_code::SUCCESS,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Session(source) => Self::Controller(source),
            CoreError::Output(source) => Self::Io(source),
            CoreError::Encode(source) => Self::Json(source),
            store @ CoreError::Store { .. } => Self::Store(store),
        }
    }
}
