// Controller session
//
// Cookie + CSRF session against a UniFi OS controller. The login endpoint
// sets a session cookie in the client's jar and (usually) an
// `x-csrf-token` header; both are replayed on every later request.
//
// A session is single-use in the failure sense: the first failure is
// recorded, later failures are chained in front of it, and from then on
// every call returns the accumulated error without touching the network.

use std::sync::Arc;
use std::time::Duration;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, ORIGIN};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use tracing::{debug, trace};
use url::Url;

use crate::device::{Device, Response};
use crate::error::{Error, SessionError};
use crate::transport::{DEFAULT_TIMEOUT, TlsMode, TransportConfig, USER_AGENT};

const CSRF_HEADER: &str = "x-csrf-token";
const LOGIN_PATH: &str = "/api/auth/login";
const NETWORK_PREFIX: &str = "/proxy/network";

// ── Configuration ───────────────────────────────────────────────────

/// Username/password pair for the controller's web login.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Everything needed to build a [`Session`].
///
/// Defaults: endpoint `http://unifi`, credentials `ubnt`/`ubnt`, site
/// `default`, 60 second timeout, `User-Agent: unifibot/2.0`, system TLS
/// roots. `credentials: None` builds a session that refuses to log in.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Controller base URL; also sent verbatim as the `Origin` header.
    pub endpoint: String,
    pub site: String,
    pub credentials: Option<Credentials>,
    pub timeout: Duration,
    pub user_agent: String,
    pub tls: TlsMode,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://unifi".into(),
            site: "default".into(),
            credentials: Some(Credentials::new("ubnt", "ubnt")),
            timeout: DEFAULT_TIMEOUT,
            user_agent: USER_AGENT.into(),
            tls: TlsMode::System,
        }
    }
}

impl SessionConfig {
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set credentials; this always selects the web-login strategy.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = site.into();
        self
    }
}

// ── Session state ───────────────────────────────────────────────────

/// Station-manager commands accepted by `cmd/stamgr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationCommand {
    Block,
    Unblock,
    Kick,
}

impl StationCommand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Block => "block-sta",
            Self::Unblock => "unblock-sta",
            Self::Kick => "kick-sta",
        }
    }
}

enum LoginStrategy {
    Unconfigured,
    WebLogin(Credentials),
    /// Logged in; holds the login response body handed back on repeat calls.
    Authenticated { response: String },
}

enum SessionState {
    Healthy,
    Failed(SessionError),
}

/// An authenticated conversation with one controller.
pub struct Session {
    http: reqwest::Client,
    base_url: Url,
    origin: String,
    site: String,
    csrf_token: Option<String>,
    cookie_jar: Arc<Jar>,
    login: LoginStrategy,
    state: SessionState,
}

impl Session {
    /// Build a session. No network I/O happens until the first call that
    /// needs the controller.
    pub fn new(config: SessionConfig) -> Result<Self, Error> {
        let origin = config.endpoint.trim_end_matches('/').to_owned();
        let base_url = Url::parse(&origin)?;

        let cookie_jar = Arc::new(Jar::default());
        let http = TransportConfig {
            tls: config.tls,
            timeout: config.timeout,
            user_agent: config.user_agent,
            cookie_jar: Some(Arc::clone(&cookie_jar)),
        }
        .build_client()?;

        let login = match config.credentials {
            Some(credentials) => LoginStrategy::WebLogin(credentials),
            None => LoginStrategy::Unconfigured,
        };

        Ok(Self {
            http,
            base_url,
            origin: config.endpoint,
            site: config.site,
            csrf_token: None,
            cookie_jar,
            login,
            state: SessionState::Healthy,
        })
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The current site identifier.
    pub fn site(&self) -> &str {
        &self.site
    }

    /// The most recently captured CSRF token.
    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.login, LoginStrategy::Authenticated { .. })
    }

    /// The recorded failures, if the session has failed.
    pub fn error(&self) -> Option<&SessionError> {
        match &self.state {
            SessionState::Healthy => None,
            SessionState::Failed(err) => Some(err),
        }
    }

    /// The `Cookie` header the jar would send to the controller.
    pub fn cookie_header(&self) -> Option<String> {
        let cookies = self.cookie_jar.cookies(&self.base_url)?;
        cookies.to_str().ok().map(String::from)
    }

    // ── Operations ──────────────────────────────────────────────────

    /// Authenticate with the controller.
    ///
    /// `POST /api/auth/login`. Only the first successful call talks to the
    /// controller; later calls return the cached login response body.
    pub async fn login(&mut self) -> Result<String, SessionError> {
        self.check()?;

        let credentials = match &self.login {
            LoginStrategy::Authenticated { response } => return Ok(response.clone()),
            LoginStrategy::WebLogin(credentials) => Some(credentials.clone()),
            LoginStrategy::Unconfigured => None,
        };
        let Some(credentials) = credentials else {
            return Err(self.fail(Error::Uninitialized));
        };

        let url = self.url(LOGIN_PATH)?;
        debug!(username = %credentials.username, "logging in at {}", url);

        let body = json!({
            "username": credentials.username,
            "password": credentials.password.expose_secret(),
            "strict": "true",
            "remember": "true",
        });

        match self.send(Method::POST, url, Some(&body)).await {
            Ok(response) => {
                debug!("login successful");
                self.login = LoginStrategy::Authenticated {
                    response: response.clone(),
                };
                Ok(response)
            }
            Err(_) => Err(self.fail(Error::Authentication {
                username: credentials.username,
            })),
        }
    }

    /// List every client the controller knows, oldest `last_seen` first.
    ///
    /// `GET /proxy/network/api/s/{site}/rest/user`
    pub async fn list_devices(&mut self) -> Result<Vec<Device>, SessionError> {
        self.login().await?;

        let url = self.site_url("rest/user")?;
        debug!("listing devices");
        let body = self.send(Method::GET, url, None).await?;

        let envelope: Response<Device> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                let preview: String = body.chars().take(200).collect();
                return Err(self.fail(Error::Deserialization {
                    message: format!("{e} (body preview: {preview:?})"),
                    body,
                }));
            }
        };

        if !envelope.meta.is_ok() {
            let message = envelope
                .meta
                .msg
                .unwrap_or_else(|| format!("rc={}", envelope.meta.rc));
            return Err(self.fail(Error::Rejected { message }));
        }

        let mut devices = envelope.data;
        devices.sort_by_key(|d| d.last_seen);
        debug!(count = devices.len(), "devices listed");
        Ok(devices)
    }

    /// Prevent a client from connecting. Returns the raw response body.
    pub async fn block(&mut self, mac: &str) -> Result<String, SessionError> {
        self.station(StationCommand::Block, mac).await
    }

    /// Re-admit a blocked client. Returns the raw response body.
    pub async fn unblock(&mut self, mac: &str) -> Result<String, SessionError> {
        self.station(StationCommand::Unblock, mac).await
    }

    /// Disconnect a connected client. Returns the raw response body.
    pub async fn kick(&mut self, mac: &str) -> Result<String, SessionError> {
        self.station(StationCommand::Kick, mac).await
    }

    /// `POST /proxy/network/api/s/{site}/cmd/stamgr` with `{"cmd", "mac"}`.
    pub async fn station(
        &mut self,
        command: StationCommand,
        mac: &str,
    ) -> Result<String, SessionError> {
        self.login().await?;

        let url = self.site_url("cmd/stamgr")?;
        debug!(mac, cmd = command.as_str(), "sending station command");

        let body = json!({
            "cmd": command.as_str(),
            "mac": mac,
        });
        self.send(Method::POST, url, Some(&body)).await
    }

    // ── URL builders ────────────────────────────────────────────────

    fn url(&mut self, path: &str) -> Result<Url, SessionError> {
        let full = format!("{}{path}", self.origin.trim_end_matches('/'));
        Url::parse(&full).map_err(|e| self.fail(Error::InvalidUrl(e)))
    }

    /// `{endpoint}/proxy/network/api/s/{site}/{path}`
    fn site_url(&mut self, path: &str) -> Result<Url, SessionError> {
        let full = format!("{NETWORK_PREFIX}/api/s/{}/{path}", self.site);
        self.url(&full)
    }

    // ── Request helpers ─────────────────────────────────────────────

    /// Issue one request and return the body.
    ///
    /// Any status outside `[200, 400)` is recorded as a failure; the body
    /// travels inside the resulting [`Error::Status`].
    async fn send(
        &mut self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> Result<String, SessionError> {
        self.check()?;
        debug!("{} {}", method, url);

        let mut builder = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .header(ACCEPT, "application/json")
            .header(ORIGIN, self.origin.as_str());

        if let Some(token) = self.csrf_token.as_deref() {
            builder = builder.header(CSRF_HEADER, token);
        }
        if let Some(body) = body {
            builder = builder.body(body.to_string());
        }

        let resp = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => return Err(self.fail(Error::Transport(e))),
        };

        self.update_csrf_from_response(resp.headers());

        let status = resp.status();
        let text = match resp.text().await {
            Ok(text) => text,
            Err(e) => return Err(self.fail(Error::Transport(e))),
        };

        if !is_acceptable(status) {
            return Err(self.fail(Error::Status { status, body: text }));
        }

        Ok(text)
    }

    fn update_csrf_from_response(&mut self, headers: &HeaderMap) {
        if let Some(token) = headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
        {
            trace!("CSRF token captured");
            self.csrf_token = Some(token.to_owned());
        }
    }

    // ── Failure bookkeeping ─────────────────────────────────────────

    fn check(&self) -> Result<(), SessionError> {
        match &self.state {
            SessionState::Healthy => Ok(()),
            SessionState::Failed(err) => Err(err.clone()),
        }
    }

    /// Record `error` and return the accumulated chain.
    fn fail(&mut self, error: Error) -> SessionError {
        let chained = match std::mem::replace(&mut self.state, SessionState::Healthy) {
            SessionState::Healthy => SessionError::from(error),
            SessionState::Failed(mut prior) => {
                prior.push(error);
                prior
            }
        };
        debug!(error = %chained.latest(), "session failed");
        self.state = SessionState::Failed(chained.clone());
        chained
    }
}

fn is_acceptable(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}
