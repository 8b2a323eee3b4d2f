use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, Credentials, InstanceRequest, ProviderClient};
use crate::config::{ApiToken, DriverConfig, DriverOptions};
use crate::types::{MachineState, RemoveReport, StepOutcome};
use crate::wait::{self, PollPolicy, WaitError};
use crate::{Error, Profile, Result, ssh};

pub const DEFAULT_SSH_USER: &str = "root";
pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DOCKER_PORT: u16 = 2376;

const SSH_KEY_FILE: &str = "id_ed25519";

/// Provider-assigned state, filled in as the machine is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub service_id: Option<i64>,
    pub ssh_key_id: Option<i64>,
    pub ip_address: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Everything the driver persists between invocations. The API token is
/// not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineRecord {
    pub name: String,
    pub profile: Profile,
    pub store_path: PathBuf,
    pub ssh_user: String,
    pub ssh_port: u16,
    pub config: DriverConfig,
    pub state: RuntimeState,
}

#[derive(Debug, Clone, Copy)]
enum PowerAction {
    Start,
    Stop,
    Reboot,
}

impl PowerAction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Reboot => "reboot",
        }
    }
}

/// Lifecycle driver for one Ubiquity cloud VM.
///
/// Operations are sequential; the host serializes calls against a given
/// machine.
pub struct Driver {
    record: MachineRecord,
    factory: Arc<dyn ClientFactory>,
    poll: PollPolicy,
}

impl Driver {
    /// Validate `opts` and build a driver for a machine that does not exist
    /// yet. No network calls are made.
    pub fn configure(
        profile: Profile,
        name: impl Into<String>,
        store_path: impl Into<PathBuf>,
        opts: &DriverOptions,
        factory: Arc<dyn ClientFactory>,
    ) -> Result<Self> {
        let config = DriverConfig::from_options(opts)?;
        let record = MachineRecord {
            name: name.into(),
            profile,
            store_path: store_path.into(),
            ssh_user: DEFAULT_SSH_USER.to_string(),
            ssh_port: DEFAULT_SSH_PORT,
            config,
            state: RuntimeState::default(),
        };

        Ok(Self::restore(record, factory))
    }

    /// Rebuild a driver from a persisted record. The token must be supplied
    /// again since records never contain it.
    pub fn restore(record: MachineRecord, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            record,
            factory,
            poll: PollPolicy::default(),
        }
    }

    pub fn with_token(mut self, token: ApiToken) -> Self {
        self.record.config.token = token;
        self
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn record(&self) -> &MachineRecord {
        &self.record
    }

    pub fn into_record(self) -> MachineRecord {
        self.record
    }

    // ── Identity ─────────────────────────────────────────────────────

    pub fn machine_name(&self) -> &str {
        &self.record.name
    }

    pub fn driver_name(&self) -> &'static str {
        self.record.profile.driver_name()
    }

    pub fn service_id(&self) -> Option<i64> {
        self.record.state.service_id
    }

    pub fn ssh_hostname(&self) -> Result<&str> {
        self.ip()
    }

    pub fn ssh_port(&self) -> u16 {
        self.record.ssh_port
    }

    pub fn ssh_username(&self) -> &str {
        &self.record.ssh_user
    }

    pub fn ssh_key_path(&self) -> PathBuf {
        self.record.store_path.join(SSH_KEY_FILE)
    }

    pub fn public_key_path(&self) -> PathBuf {
        ssh::public_key_path(&self.ssh_key_path())
    }

    pub fn store_path(&self) -> &Path {
        &self.record.store_path
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The instance address, or `AddressUnavailable` until one is known.
    pub fn ip(&self) -> Result<&str> {
        self.record
            .state
            .ip_address
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .ok_or(Error::AddressUnavailable)
    }

    /// Docker endpoint of the machine.
    pub fn url(&self) -> Result<String> {
        let ip = self.ip()?;
        Ok(format!("tcp://{ip}:{DOCKER_PORT}"))
    }

    /// Query the provider. A failed query is returned as `ProviderQuery`;
    /// see [`MachineState::from_query`].
    pub async fn state(&self) -> Result<MachineState> {
        let service_id = self.require_service_id()?;
        let details = self
            .client()
            .get_instance(service_id)
            .await
            .map_err(|source| Error::ProviderQuery { service_id, source })?;

        Ok(MachineState::from_status(&details.status))
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// No environment checks are needed before create.
    pub fn preflight_check(&self) -> Result<()> {
        Ok(())
    }

    pub async fn create(&mut self) -> Result<()> {
        self.create_with_cancel(&CancellationToken::new()).await
    }

    /// Create the SSH key and the VM, then wait for the VM's address.
    ///
    /// Cancellation is honoured between steps and during the wait; no
    /// provider resource is requested once `cancel` has fired. The service
    /// id is recorded as soon as the provider accepts the request, so a
    /// failed or cancelled wait can still be cleaned up with
    /// [`Driver::remove`].
    pub async fn create_with_cancel(&mut self, cancel: &CancellationToken) -> Result<()> {
        info!(machine = %self.record.name, "creating SSH key");
        let key_path = self.ssh_key_path();
        let key = ssh::ensure_key_pair(&key_path, &self.record.name)
            .map_err(|source| Error::KeyGeneration {
                path: key_path.clone(),
                source,
            })?;
        debug!(path = %key_path.display(), fingerprint = %key.fingerprint, "SSH key ready");

        let client = self.client();

        if cancel.is_cancelled() {
            return Err(Error::CreateCancelled);
        }
        let key_id = client
            .add_key(&self.record.name, &key.authorized_key)
            .await
            .map_err(Error::KeyRegistration)?;
        self.record.state.ssh_key_id = Some(key_id);
        debug!(key_id, "registered SSH key");

        if cancel.is_cancelled() {
            return Err(Error::CreateCancelled);
        }
        info!(machine = %self.record.name, "creating Ubiquity instance, please wait...");
        let config = &self.record.config;
        let service_id = client
            .create_instance(&InstanceRequest {
                hostname: self.record.name.clone(),
                image_id: config.image_id,
                flavor_id: config.flavor_id,
                zone_id: config.zone_id,
                key_id,
                skip_default_provisioning: true,
            })
            .await
            .map_err(Error::InstanceCreation)?;
        self.record.state.service_id = Some(service_id);
        debug!(service_id, "instance accepted");

        let provider = &*client;
        let ready = wait::wait_for_address(&self.poll, cancel, move || provider.get_instance(service_id))
            .await
            .map_err(|e| match e {
                WaitError::TimedOut { attempts, elapsed } => Error::ProvisioningTimeout {
                    service_id,
                    attempts,
                    elapsed,
                },
                WaitError::Cancelled { .. } => Error::Cancelled { service_id },
            })?;

        info!(ip = %ready.address, "initializing instance");
        debug!(service_id, ip = %ready.address, attempts = ready.attempts, "created instance");
        self.record.state.ip_address = Some(ready.address);
        self.record.state.created_at = Some(Utc::now());

        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.power(PowerAction::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.power(PowerAction::Stop).await
    }

    pub async fn restart(&self) -> Result<()> {
        self.power(PowerAction::Reboot).await
    }

    /// Same provider call as [`Driver::stop`]: the API has no forced
    /// power-off.
    pub async fn kill(&self) -> Result<()> {
        debug!("kill issues a regular stop");
        self.power(PowerAction::Stop).await
    }

    /// Best-effort teardown: delete the SSH key, then destroy the instance.
    ///
    /// Both steps always run. Failures are logged and reported in the
    /// returned [`RemoveReport`] rather than returned as an error. Ids are
    /// cleared once their step succeeds, so calling this again only retries
    /// what failed.
    pub async fn remove(&mut self) -> RemoveReport {
        let client = self.client();

        let ssh_key = match self.record.state.ssh_key_id {
            None => StepOutcome::Skipped,
            Some(key_id) => match client.remove_key(key_id).await {
                Ok(()) => {
                    debug!(key_id, "removed SSH key");
                    self.record.state.ssh_key_id = None;
                    StepOutcome::Removed
                }
                Err(e) => {
                    warn!(key_id, error = %e, "remove: failed to delete SSH key");
                    StepOutcome::Failed(e.to_string())
                }
            },
        };

        let instance = match self.record.state.service_id {
            None => StepOutcome::Skipped,
            Some(service_id) => match client.destroy_instance(service_id).await {
                Ok(()) => {
                    debug!(service_id, "destroyed instance");
                    self.record.state.service_id = None;
                    self.record.state.ip_address = None;
                    StepOutcome::Removed
                }
                Err(e) => {
                    warn!(service_id, error = %e, "remove: failed to destroy instance");
                    StepOutcome::Failed(e.to_string())
                }
            },
        };

        RemoveReport { ssh_key, instance }
    }

    async fn power(&self, action: PowerAction) -> Result<()> {
        let service_id = self.require_service_id()?;
        let client = self.client();
        let result = match action {
            PowerAction::Start => client.start_instance(service_id).await,
            PowerAction::Stop => client.stop_instance(service_id).await,
            PowerAction::Reboot => client.reboot_instance(service_id).await,
        };

        result.map_err(|source| Error::ProviderAction {
            action: action.as_str(),
            service_id,
            source,
        })
    }

    fn require_service_id(&self) -> Result<i64> {
        self.record.state.service_id.ok_or(Error::NotCreated)
    }

    fn client(&self) -> Arc<dyn ProviderClient> {
        self.factory.build(&Credentials::from(&self.record.config))
    }
}
