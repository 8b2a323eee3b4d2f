//! Docker host driver for Ubiquity Hosting cloud VMs.
//!
//! [`Driver`] maps the generic machine lifecycle (create, start, stop,
//! restart, kill, remove, state and address queries) onto the provider API.
//! Provider access goes through the [`ProviderClient`] trait so the driver
//! can be exercised against fakes.

pub mod client;
pub mod config;
pub mod driver;
pub mod ssh;
pub mod types;
pub mod wait;

#[cfg(test)]
mod fake;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use client::{ClientFactory, Credentials, InstanceDetails, InstanceRequest, ProviderClient, UbiClientFactory};
pub use config::{ApiToken, DriverConfig, DriverOptions, Flag, CREATE_FLAGS};
pub use driver::{Driver, MachineRecord};
pub use types::{MachineState, RemoveReport, StepOutcome};
pub use wait::PollPolicy;

/// Boxed error returned by provider clients.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid --{flag}: {message}")]
    Configuration { flag: &'static str, message: String },

    #[error("failed to generate SSH key at {}: {source}", path.display())]
    KeyGeneration {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to register SSH key: {0}")]
    KeyRegistration(#[source] BoxError),

    #[error("failed to create instance: {0}")]
    InstanceCreation(#[source] BoxError),

    #[error("failed to query instance {service_id}: {source}")]
    ProviderQuery {
        service_id: i64,
        #[source]
        source: BoxError,
    },

    #[error("failed to {action} instance {service_id}: {source}")]
    ProviderAction {
        action: &'static str,
        service_id: i64,
        #[source]
        source: BoxError,
    },

    #[error("IP address is not set")]
    AddressUnavailable,

    #[error("machine has not been created")]
    NotCreated,

    #[error("instance {service_id} reported no address after {attempts} attempts ({elapsed:?})")]
    ProvisioningTimeout {
        service_id: i64,
        attempts: u32,
        elapsed: Duration,
    },

    #[error("creation of instance {service_id} was cancelled")]
    Cancelled { service_id: i64 },

    #[error("create was cancelled before an instance was requested")]
    CreateCancelled,

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("unknown driver profile: {0}")]
    UnknownProfile(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// The names this driver has historically been published under.
///
/// Both profiles talk to the same API with the same flags; they differ in
/// the driver name presented to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Ubiquity,
    UbiquityHosting,
}

impl Profile {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ubiquity => "ubiquity",
            Self::UbiquityHosting => "ubiquityhosting",
        }
    }

    /// Name reported to the host CLI.
    pub fn driver_name(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ubiquity" => Ok(Self::Ubiquity),
            "ubiquityhosting" => Ok(Self::UbiquityHosting),
            other => Err(Error::UnknownProfile(other.to_string())),
        }
    }
}
