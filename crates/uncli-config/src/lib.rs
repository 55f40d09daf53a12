//! Configuration for the uncli binary.
//!
//! Settings are layered with figment: built-in defaults, then the TOML
//! config file, then `UNIFI_*` / `CONSUL_HTTP_*` environment variables,
//! then command-line overrides. The password comes from that chain, the
//! system keyring, or the controller factory default, in that order.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use uncli_api::{ConsulConfig, Credentials, SessionConfig, TlsMode};

/// Keyring service name; the keyring user is the controller username.
pub const KEYRING_SERVICE: &str = "uncli";

/// Factory password of a fresh controller.
pub const DEFAULT_PASSWORD: &str = "ubnt";

const CONFIG_ENV: &str = "UNIFI_CONFIG";
const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Effective configuration after all layers are merged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// Controller base URL.
    pub endpoint: String,

    /// Web-login username. Empty disables login.
    pub username: String,

    /// Plaintext password (prefer the keyring or `UNIFI_PASSWORD`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Controller site name.
    pub site: String,

    /// Per-request timeout in seconds.
    pub timeout: u64,

    /// Accept any TLS certificate.
    pub insecure: bool,

    /// Extra CA certificate (PEM) to trust.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub consul: ConsulSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: "http://unifi".into(),
            username: "ubnt".into(),
            password: None,
            site: "default".into(),
            timeout: 60,
            insecure: false,
            ca_cert: None,
            consul: ConsulSettings::default(),
        }
    }
}

/// Where the key-value lists live.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConsulSettings {
    /// `host:port` or full URL of the Consul agent.
    pub address: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Talk HTTPS to a bare `host:port` address.
    pub ssl: bool,
}

impl Default for ConsulSettings {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8500".into(),
            token: None,
            ssl: false,
        }
    }
}

/// Command-line values that win over every other layer.
///
/// `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path: `UNIFI_CONFIG`, else the platform
/// config directory.
pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    ProjectDirs::from("", "", "uncli").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("uncli");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Environment variables holding free-form strings, and their config keys.
///
/// These bypass figment's value parsing so that a password such as
/// `0123` stays a string instead of becoming the integer 123.
const STRING_ENV: &[(&str, &str)] = &[
    ("UNIFI_ENDPOINT", "endpoint"),
    ("UNIFI_USERNAME", "username"),
    ("UNIFI_PASSWORD", "password"),
    ("UNIFI_SITE", "site"),
    ("CONSUL_HTTP_ADDR", "consul.address"),
    ("CONSUL_HTTP_TOKEN", "consul.token"),
];

/// The layered provider stack. A missing file contributes nothing.
pub fn figment(path: &Path, overrides: &Overrides) -> Figment {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("UNIFI_").ignore(&[
            "config", "endpoint", "username", "password", "site",
        ]))
        .merge(Env::raw().only(&["CONSUL_HTTP_SSL"]).map(|_| "consul.ssl".into()));

    STRING_ENV
        .iter()
        .filter_map(|&(var, key)| std::env::var(var).ok().map(|value| (key, value)))
        .fold(figment, |figment, (key, value)| {
            figment.merge(Serialized::default(key, value))
        })
        .merge(Serialized::defaults(overrides))
}

impl Settings {
    /// Load from `path` (or [`config_path`]) plus environment and overrides.
    pub fn load(path: Option<&Path>, overrides: &Overrides) -> Result<Self, ConfigError> {
        let path = path.map_or_else(config_path, Path::to_path_buf);
        debug!(path = %path.display(), exists = path.exists(), "loading configuration");
        Ok(figment(&path, overrides).extract()?)
    }

    /// Build the controller session configuration.
    pub fn session_config(&self) -> Result<SessionConfig, ConfigError> {
        let endpoint = self.endpoint.trim();
        let url = url::Url::parse(endpoint).map_err(|e| ConfigError::Validation {
            field: "endpoint".into(),
            reason: format!("'{endpoint}' is not a valid URL: {e}"),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Validation {
                field: "endpoint".into(),
                reason: format!("unsupported scheme '{}', expected http or https", url.scheme()),
            });
        }
        if self.timeout == 0 {
            return Err(ConfigError::Validation {
                field: "timeout".into(),
                reason: "must be at least one second".into(),
            });
        }

        let credentials = if self.username.is_empty() {
            None
        } else {
            Some(Credentials {
                username: self.username.clone(),
                password: resolve_password(&self.username, self.password.as_deref()),
            })
        };

        Ok(SessionConfig {
            endpoint: endpoint.to_owned(),
            site: self.site.clone(),
            credentials,
            timeout: Duration::from_secs(self.timeout),
            tls: self.tls_mode(),
            ..SessionConfig::default()
        })
    }

    /// Build the Consul client configuration.
    pub fn consul_config(&self) -> ConsulConfig {
        ConsulConfig {
            address: self.consul.address.clone(),
            tls: self.consul.ssl,
            token: self
                .consul
                .token
                .clone()
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
        }
    }

    pub fn tls_mode(&self) -> TlsMode {
        if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca_path) = self.ca_cert {
            TlsMode::CustomCa(ca_path.clone())
        } else {
            TlsMode::System
        }
    }

    /// Render as TOML with secrets masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mut shown = self.clone();
        if shown.password.is_some() {
            shown.password = Some(REDACTED.into());
        }
        if shown.consul.token.is_some() {
            shown.consul.token = Some(REDACTED.into());
        }
        Ok(toml::to_string_pretty(&shown)?)
    }
}

// ── Credential resolution ───────────────────────────────────────────

/// Explicit value, then the system keyring, then the factory default.
pub fn resolve_password(username: &str, explicit: Option<&str>) -> SecretString {
    // 1. Config file / UNIFI_PASSWORD
    if let Some(pw) = explicit.filter(|pw| !pw.is_empty()) {
        return SecretString::from(pw.to_owned());
    }

    // 2. Keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, username) {
        if let Ok(pw) = entry.get_password() {
            debug!(username, "password taken from system keyring");
            return SecretString::from(pw);
        }
    }

    // 3. Factory default
    SecretString::from(DEFAULT_PASSWORD.to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::io::Write;

    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    use super::*;

    fn layered(toml: &str, overrides: &Overrides) -> Settings {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::string(toml))
            .merge(Serialized::defaults(overrides))
            .extract()
            .unwrap()
    }

    #[test]
    fn defaults_match_a_factory_controller() {
        let settings = layered("", &Overrides::default());
        assert_eq!(settings, Settings::default());

        let session = settings.session_config().unwrap();
        assert_eq!(session.endpoint, "http://unifi");
        assert_eq!(session.site, "default");
        assert_eq!(session.timeout, Duration::from_secs(60));
        assert_eq!(session.tls, TlsMode::System);
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = layered(
            r#"
            endpoint = "https://10.0.0.1"
            site = "branch"
            timeout = 5

            [consul]
            address = "consul.lan:8500"
            token = "abc"
            "#,
            &Overrides::default(),
        );

        assert_eq!(settings.endpoint, "https://10.0.0.1");
        assert_eq!(settings.site, "branch");
        assert_eq!(settings.timeout, 5);
        assert_eq!(settings.username, "ubnt");
        assert_eq!(settings.consul.address, "consul.lan:8500");
        assert!(!settings.consul.ssl);
    }

    #[test]
    fn overrides_win_and_unset_overrides_do_not_clobber() {
        let overrides = Overrides {
            endpoint: Some("https://override".into()),
            insecure: Some(true),
            ..Overrides::default()
        };
        let settings = layered(
            "endpoint = \"https://file\"\nsite = \"lab\"\n",
            &overrides,
        );

        assert_eq!(settings.endpoint, "https://override");
        assert_eq!(settings.site, "lab");
        assert_eq!(settings.tls_mode(), TlsMode::DangerAcceptInvalid);
    }

    #[test]
    fn load_reads_the_given_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "username = \"admin\"\npassword = \"from-file\"").unwrap();

        let settings = Settings::load(Some(file.path()), &Overrides::default()).unwrap();
        assert_eq!(settings.username, "admin");

        let session = settings.session_config().unwrap();
        let creds = session.credentials.unwrap();
        assert_eq!(creds.username, "admin");
        assert_eq!(creds.password.expose_secret(), "from-file");
    }

    #[test]
    fn numeric_env_strings_stay_strings() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("UNIFI_USERNAME", "1001");
            jail.set_env("UNIFI_PASSWORD", "0123456");
            jail.set_env("UNIFI_SITE", "42");
            jail.set_env("UNIFI_TIMEOUT", "7");
            jail.set_env("CONSUL_HTTP_TOKEN", "987");
            jail.set_env("CONSUL_HTTP_SSL", "true");

            let path = jail.directory().join("absent.toml");
            let settings = Settings::load(Some(&path), &Overrides::default()).unwrap();
            assert_eq!(settings.username, "1001");
            assert_eq!(settings.password.as_deref(), Some("0123456"));
            assert_eq!(settings.site, "42");
            assert_eq!(settings.timeout, 7);
            assert_eq!(settings.consul.token.as_deref(), Some("987"));
            assert!(settings.consul.ssl);

            let creds = settings.session_config().unwrap().credentials.unwrap();
            assert_eq!(creds.username, "1001");
            assert_eq!(creds.password.expose_secret(), "0123456");
            Ok(())
        });
    }

    #[test]
    fn env_beats_file_and_overrides_beat_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("config.toml", "endpoint = \"https://file\"\nsite = \"lab\"\n")?;
            jail.set_env("UNIFI_ENDPOINT", "https://env");
            jail.set_env("UNIFI_SITE", "env-site");

            let path = jail.directory().join("config.toml");
            let overrides = Overrides {
                site: Some("flag-site".into()),
                ..Overrides::default()
            };
            let settings = Settings::load(Some(&path), &overrides).unwrap();
            assert_eq!(settings.endpoint, "https://env");
            assert_eq!(settings.site, "flag-site");
            Ok(())
        });
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timeout = \"soon\"").unwrap();

        let result = Settings::load(Some(file.path()), &Overrides::default());
        assert!(matches!(result, Err(ConfigError::Figment(_))));
    }

    #[test]
    fn invalid_endpoint_and_zero_timeout_are_rejected() {
        let bad_url = Settings {
            endpoint: "not a url".into(),
            ..Settings::default()
        };
        assert!(matches!(
            bad_url.session_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "endpoint"
        ));

        let bad_scheme = Settings {
            endpoint: "ftp://unifi".into(),
            ..Settings::default()
        };
        assert!(bad_scheme.session_config().is_err());

        let zero = Settings {
            timeout: 0,
            ..Settings::default()
        };
        assert!(matches!(
            zero.session_config(),
            Err(ConfigError::Validation { ref field, .. }) if field == "timeout"
        ));
    }

    #[test]
    fn empty_username_disables_login() {
        let settings = Settings {
            username: String::new(),
            ..Settings::default()
        };
        assert!(settings.session_config().unwrap().credentials.is_none());
    }

    #[test]
    fn ca_cert_selects_custom_roots_unless_insecure() {
        let mut settings = Settings {
            ca_cert: Some(PathBuf::from("/etc/unifi-ca.pem")),
            ..Settings::default()
        };
        assert_eq!(
            settings.tls_mode(),
            TlsMode::CustomCa(PathBuf::from("/etc/unifi-ca.pem"))
        );

        settings.insecure = true;
        assert_eq!(settings.tls_mode(), TlsMode::DangerAcceptInvalid);
    }

    #[test]
    fn consul_config_drops_empty_token() {
        let mut settings = Settings::default();
        settings.consul.token = Some(String::new());
        assert!(settings.consul_config().token.is_none());

        settings.consul.token = Some("t0k".into());
        settings.consul.ssl = true;
        let consul = settings.consul_config();
        assert_eq!(consul.token.unwrap().expose_secret(), "t0k");
        assert!(consul.tls);
    }

    #[test]
    fn explicit_password_wins() {
        let pw = resolve_password("admin", Some("hunter2"));
        assert_eq!(pw.expose_secret(), "hunter2");
    }

    #[test]
    fn redacted_toml_hides_secrets() {
        let mut settings = Settings {
            password: Some("hunter2".into()),
            ..Settings::default()
        };
        settings.consul.token = Some("t0k".into());

        let shown = settings.to_redacted_toml().unwrap();
        assert!(!shown.contains("hunter2"));
        assert!(!shown.contains("t0k"));
        assert!(shown.contains("endpoint = \"http://unifi\""));
    }
}
