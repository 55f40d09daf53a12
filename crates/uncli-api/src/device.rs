// Controller client records
//
// Models the `rest/user` listing: every client the controller has ever
// seen, wrapped in the standard `{ meta: { rc, msg }, data: [...] }`
// envelope. Fields are optional on the wire; missing or `null` values
// default to empty.

use std::fmt;

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Deserializer, Serialize};

// ── Response Envelope ────────────────────────────────────────────────

/// Standard controller response envelope.
#[derive(Debug, Deserialize)]
pub struct Response<T> {
    #[serde(default)]
    pub meta: Meta,
    #[serde(default)]
    pub data: Vec<T>,
}

/// Metadata from the envelope. `rc` == `"ok"` means success.
#[derive(Debug, Default, Deserialize)]
pub struct Meta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub rc: String,
    #[serde(default)]
    pub msg: Option<String>,
}

impl Meta {
    /// A missing `rc` is tolerated; only an explicit non-`ok` value fails.
    pub fn is_ok(&self) -> bool {
        self.rc.is_empty() || self.rc == "ok"
    }
}

// ── Device ───────────────────────────────────────────────────────────

/// A network client known to the controller, keyed by MAC address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "_id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub mac: String,
    #[serde(default)]
    pub site_id: Option<String>,
    #[serde(default)]
    pub oui: Option<String>,
    #[serde(default)]
    pub network_id: Option<String>,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub fixed_ip: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub usergroup_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Seconds since the Unix epoch.
    #[serde(default, deserialize_with = "null_as_default")]
    pub first_seen: i64,
    /// Seconds since the Unix epoch.
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_seen: i64,
    #[serde(default, rename = "dev_id_override", deserialize_with = "null_as_default")]
    pub device_id_override: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub fingerprint_override: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub blocked: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_guest: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_wired: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub noted: bool,
    #[serde(default, rename = "use_fixedip", deserialize_with = "null_as_default")]
    pub use_fixed_ip: bool,
}

impl Device {
    /// Friendly name: the first non-empty of name, hostname, fixed IP,
    /// IP, OUI and MAC.
    pub fn display_name(&self) -> &str {
        first_non_empty(&[
            self.name.as_deref(),
            self.hostname.as_deref(),
            self.fixed_ip.as_deref(),
            self.ip.as_deref(),
            self.oui.as_deref(),
            Some(self.mac.as_str()),
        ])
    }

    /// Fixed IP if one is assigned, otherwise the last known IP.
    pub fn address(&self) -> &str {
        first_non_empty(&[self.fixed_ip.as_deref(), self.ip.as_deref()])
    }

    /// `last_seen` rendered as RFC 3339 (UTC).
    pub fn last_seen_rfc3339(&self) -> String {
        DateTime::from_timestamp(self.last_seen, 0).map_or_else(
            || self.last_seen.to_string(),
            |t| t.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>20} {:<16} {:<20} ({}){}",
            self.mac,
            self.address(),
            self.display_name(),
            self.last_seen_rfc3339(),
            if self.blocked { " blocked" } else { "" },
        )
    }
}

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn first_non_empty<'a>(options: &[Option<&'a str>]) -> &'a str {
    options
        .iter()
        .flatten()
        .copied()
        .find(|s| !s.is_empty())
        .unwrap_or("")
}
