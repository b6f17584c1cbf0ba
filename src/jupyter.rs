//! Local Jupyter server API.
//!
//! Lists kernel sessions and terminals over HTTPS on loopback. The notebook
//! server uses a self-signed certificate, so verification is disabled, and
//! proxies are bypassed since the target is always local.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::Session;
use crate::domain::Terminal;
use crate::error::AutostopError;
use crate::error::Result;

/// Source of kernel and terminal activity.
#[async_trait]
pub trait KernelApi: Send + Sync {
    /// List live kernel sessions. An empty list means no sessions at all.
    async fn fetch_sessions(&self) -> Result<Vec<Session>>;

    /// List open terminals.
    async fn fetch_terminals(&self) -> Result<Vec<Terminal>>;
}

/// HTTP client for the Jupyter REST API.
#[derive(Debug, Clone)]
pub struct JupyterClient {
    base_url: String,
    http: reqwest::Client,
}

impl JupyterClient {
    /// Client for the notebook server on `https://localhost:{port}`.
    pub fn new(port: u16) -> Result<Self> {
        Self::with_base_url(format!("https://localhost:{port}"))
    }

    /// Client for an explicit base URL (scheme, host, port; no trailing slash).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .no_proxy()
            .build()
            .map_err(|e| AutostopError::transport(&base_url, e))?;

        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON array from `path`.
    async fn get_list<T: DeserializeOwned>(&self, path: &str, kind: &str) -> Result<Vec<T>> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| AutostopError::transport(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AutostopError::transport(&url, e))?;

        debug!("{} activity: {}", kind, body.trim());

        if !status.is_success() {
            return Err(AutostopError::transport(&url, format!("HTTP {status}")));
        }

        serde_json::from_str(&body)
            .map_err(|e| AutostopError::transport(&url, format!("malformed {kind} response: {e}")))
    }
}

#[async_trait]
impl KernelApi for JupyterClient {
    async fn fetch_sessions(&self) -> Result<Vec<Session>> {
        self.get_list("/api/sessions", "kernel").await
    }

    async fn fetch_terminals(&self) -> Result<Vec<Terminal>> {
        self.get_list("/api/terminals", "terminal").await
    }
}
