use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ubi_api::{AddKeyRequest, CreateVmRequest, UbiClient};

use crate::config::{ApiToken, DriverConfig};
use crate::{BoxError, Error};

/// Upper bound on a single API request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Account credentials passed to every client the driver builds.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: i64,
    pub username: String,
    pub token: ApiToken,
}

impl From<&DriverConfig> for Credentials {
    fn from(config: &DriverConfig) -> Self {
        Self {
            client_id: config.client_id,
            username: config.username.clone(),
            token: config.token.clone(),
        }
    }
}

/// Parameters for a new VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRequest {
    pub hostname: String,
    pub image_id: i64,
    pub flavor_id: i64,
    pub zone_id: i64,
    pub key_id: i64,
    /// Ask the provider not to run its default provisioning.
    pub skip_default_provisioning: bool,
}

/// What the driver needs to know about a running instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDetails {
    pub status: String,
    pub address: Option<String>,
}

/// Provider operations the driver depends on.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Returns the provider-assigned service id.
    async fn create_instance(&self, req: &InstanceRequest) -> Result<i64, BoxError>;

    async fn get_instance(&self, service_id: i64) -> Result<InstanceDetails, BoxError>;

    async fn start_instance(&self, service_id: i64) -> Result<(), BoxError>;

    async fn stop_instance(&self, service_id: i64) -> Result<(), BoxError>;

    async fn reboot_instance(&self, service_id: i64) -> Result<(), BoxError>;

    async fn destroy_instance(&self, service_id: i64) -> Result<(), BoxError>;

    /// Registers a public key and returns its id.
    async fn add_key(&self, name: &str, public_key: &str) -> Result<i64, BoxError>;

    async fn remove_key(&self, key_id: i64) -> Result<(), BoxError>;
}

/// Builds (or reuses) a provider client for a set of credentials.
pub trait ClientFactory: Send + Sync {
    fn build(&self, credentials: &Credentials) -> Arc<dyn ProviderClient>;
}

/// Production factory: a fresh [`UbiClient`] per call over one shared
/// connection pool.
#[derive(Clone)]
pub struct UbiClientFactory {
    http: reqwest::Client,
    base_url: String,
}

impl UbiClientFactory {
    pub fn new() -> crate::Result<Self> {
        Self::with_base_url(ubi_api::DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(Error::HttpClient)?;

        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }
}

impl ClientFactory for UbiClientFactory {
    fn build(&self, credentials: &Credentials) -> Arc<dyn ProviderClient> {
        let client = UbiClient::with_http(
            credentials.client_id,
            credentials.username.clone(),
            credentials.token.expose(),
            self.http.clone(),
        )
        .with_base_url(self.base_url.clone());

        Arc::new(client)
    }
}

#[async_trait]
impl ProviderClient for UbiClient {
    async fn create_instance(&self, req: &InstanceRequest) -> Result<i64, BoxError> {
        let created = self
            .create_vm(&CreateVmRequest {
                hostname: req.hostname.clone(),
                image_id: req.image_id,
                flavor_id: req.flavor_id,
                zone_id: req.zone_id,
                key_id: req.key_id,
                docker_machine: req.skip_default_provisioning,
            })
            .await?;
        Ok(created.service_id)
    }

    async fn get_instance(&self, service_id: i64) -> Result<InstanceDetails, BoxError> {
        let vm = self.get_vm(service_id).await?;
        Ok(InstanceDetails {
            status: vm.state,
            address: vm.main_ip_address,
        })
    }

    async fn start_instance(&self, service_id: i64) -> Result<(), BoxError> {
        Ok(self.start_vm(service_id).await?)
    }

    async fn stop_instance(&self, service_id: i64) -> Result<(), BoxError> {
        Ok(self.stop_vm(service_id).await?)
    }

    async fn reboot_instance(&self, service_id: i64) -> Result<(), BoxError> {
        Ok(self.reboot_vm(service_id).await?)
    }

    async fn destroy_instance(&self, service_id: i64) -> Result<(), BoxError> {
        Ok(self.destroy_vm(service_id).await?)
    }

    async fn add_key(&self, name: &str, public_key: &str) -> Result<i64, BoxError> {
        let key = UbiClient::add_key(
            self,
            &AddKeyRequest {
                key_name: name.to_string(),
                pub_key: public_key.to_string(),
            },
        )
        .await?;
        Ok(key.key_id)
    }

    async fn remove_key(&self, key_id: i64) -> Result<(), BoxError> {
        Ok(UbiClient::remove_key(self, key_id).await?)
    }
}
