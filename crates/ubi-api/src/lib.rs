//! Typed Rust client for the Ubiquity Hosting cloud API.
//!
//! Covers the subset needed for managing docker hosts:
//! cloud VMs (create, get, start, stop, reboot, destroy) and SSH keys
//! (add, remove).

mod types;

pub use types::*;

pub const DEFAULT_BASE_URL: &str = "https://api.ubiquityhosting.com/v25";

const CLIENT_ID_HEADER: &str = "X-Ubi-Client-Id";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("ubiquity api request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ubiquity api {endpoint} returned {status}: {body}")]
    Api {
        endpoint: &'static str,
        status: reqwest::StatusCode,
        body: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Client for the Ubiquity Hosting REST API.
///
/// Every request is authenticated with the account's client id plus the API
/// username and token.
#[derive(Clone)]
pub struct UbiClient {
    client_id: i64,
    username: String,
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl std::fmt::Debug for UbiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UbiClient")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl UbiClient {
    pub fn new(client_id: i64, username: impl Into<String>, token: impl Into<String>) -> Self {
        Self::with_http(client_id, username, token, reqwest::Client::new())
    }

    /// Build a client on top of an existing connection pool.
    pub fn with_http(
        client_id: i64,
        username: impl Into<String>,
        token: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            client_id,
            username: username.into(),
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http,
        }
    }

    /// Point the client at a different API root (staging, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.token))
            .header(CLIENT_ID_HEADER, self.client_id.to_string())
    }

    async fn check(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    /// Like `check` but also treats 404 as success (for delete idempotency).
    async fn check_allow_404(resp: reqwest::Response, endpoint: &'static str) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Api { endpoint, status, body });
        }
        Ok(resp)
    }

    // ── Cloud VMs ────────────────────────────────────────────────────

    pub async fn create_vm(&self, req: &CreateVmRequest) -> Result<CreatedVm> {
        let resp = self
            .request(reqwest::Method::POST, "/cloud/vms")
            .json(req)
            .send()
            .await?;

        Self::check(resp, "create vm")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn get_vm(&self, service_id: i64) -> Result<Vm> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/cloud/vms/{service_id}"))
            .send()
            .await?;

        Self::check(resp, "get vm")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn start_vm(&self, service_id: i64) -> Result<()> {
        self.vm_action(service_id, "start", "start vm").await
    }

    /// Graceful shutdown. The API has no separate forced power-off.
    pub async fn stop_vm(&self, service_id: i64) -> Result<()> {
        self.vm_action(service_id, "stop", "stop vm").await
    }

    pub async fn reboot_vm(&self, service_id: i64) -> Result<()> {
        self.vm_action(service_id, "reboot", "reboot vm").await
    }

    async fn vm_action(&self, service_id: i64, action: &str, endpoint: &'static str) -> Result<()> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/cloud/vms/{service_id}/{action}"),
            )
            .send()
            .await?;

        Self::check(resp, endpoint).await?;
        Ok(())
    }

    pub async fn destroy_vm(&self, service_id: i64) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/cloud/vms/{service_id}"))
            .send()
            .await?;

        Self::check_allow_404(resp, "destroy vm").await?;
        Ok(())
    }

    // ── SSH keys ─────────────────────────────────────────────────────

    pub async fn add_key(&self, req: &AddKeyRequest) -> Result<CreatedKey> {
        let resp = self
            .request(reqwest::Method::POST, "/cloud/keys")
            .json(req)
            .send()
            .await?;

        Self::check(resp, "add key")
            .await?
            .json()
            .await
            .map_err(Error::from)
    }

    pub async fn remove_key(&self, key_id: i64) -> Result<()> {
        let resp = self
            .request(reqwest::Method::DELETE, &format!("/cloud/keys/{key_id}"))
            .send()
            .await?;

        Self::check_allow_404(resp, "remove key").await?;
        Ok(())
    }
}
