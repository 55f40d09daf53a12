// Consul KV client
//
// Minimal client for the Consul KV HTTP API, storing string lists as JSON
// arrays. Reads use `?raw` so the value comes back undecoded; a missing
// key is an empty list, not an error.

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

const TOKEN_HEADER: &str = "X-Consul-Token";

/// Where the Consul agent lives.
///
/// Defaults match the Consul CLI: `127.0.0.1:8500` over plain HTTP.
#[derive(Debug, Clone)]
pub struct ConsulConfig {
    /// `host:port`, or a full URL when it already carries a scheme.
    pub address: String,
    pub tls: bool,
    pub token: Option<SecretString>,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:8500".into(),
            tls: false,
            token: None,
        }
    }
}

impl ConsulConfig {
    /// Base URL of the agent's HTTP API.
    pub fn base_url(&self) -> Result<Url, Error> {
        let address = self.address.trim_end_matches('/');
        if address.contains("://") {
            return Ok(Url::parse(address)?);
        }
        let scheme = if self.tls { "https" } else { "http" };
        Ok(Url::parse(&format!("{scheme}://{address}"))?)
    }
}

/// String-list store on top of Consul KV.
pub struct ConsulKv {
    http: reqwest::Client,
    base_url: Url,
    token: Option<SecretString>,
}

impl ConsulKv {
    pub fn new(config: &ConsulConfig, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url: config.base_url()?,
            token: config.token.clone(),
        })
    }

    /// The agent base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/v1/kv/{key}`
    fn key_url(&self, key: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/v1/kv/{key}"))?)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.header(TOKEN_HEADER, token.expose_secret()),
            None => builder,
        }
    }

    /// Read the list stored at `key`.
    ///
    /// `GET /v1/kv/{key}?raw`
    pub async fn get(&self, key: &str) -> Result<Vec<String>, Error> {
        let mut url = self.key_url(key)?;
        url.set_query(Some("raw"));
        debug!(key, "reading key-value list");

        let resp = self.request(reqwest::Method::GET, url).send().await?;
        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(key, "key not present");
            return Ok(Vec::new());
        }
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Kv {
                message: format!("GET {key} returned HTTP {status}: {}", body.trim()),
            });
        }
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("value at '{key}' is not a JSON string list: {e}"),
            body,
        })
    }

    /// Replace the list stored at `key`.
    ///
    /// `PUT /v1/kv/{key}` with a JSON array body.
    pub async fn put(&self, key: &str, values: &[String]) -> Result<(), Error> {
        let url = self.key_url(key)?;
        debug!(key, count = values.len(), "writing key-value list");

        let resp = self
            .request(reqwest::Method::PUT, url)
            .json(values)
            .send()
            .await?;
        Self::expect_true(resp, "PUT", key).await
    }

    /// Remove `key`.
    ///
    /// `DELETE /v1/kv/{key}`
    pub async fn delete(&self, key: &str) -> Result<(), Error> {
        let url = self.key_url(key)?;
        debug!(key, "deleting key-value list");

        let resp = self.request(reqwest::Method::DELETE, url).send().await?;
        Self::expect_true(resp, "DELETE", key).await
    }

    /// Consul answers writes with a bare `true` / `false`.
    async fn expect_true(resp: reqwest::Response, verb: &str, key: &str) -> Result<(), Error> {
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(Error::Kv {
                message: format!("{verb} {key} returned HTTP {status}: {}", body.trim()),
            });
        }
        if body.trim() == "false" {
            return Err(Error::Kv {
                message: format!("{verb} {key} was not applied"),
            });
        }
        Ok(())
    }
}
