use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const DEFAULT_ZONE_ID: i64 = 7;
pub const DEFAULT_FLAVOR_ID: i64 = 1;
pub const DEFAULT_IMAGE_ID: i64 = 18;

pub const FLAG_CLIENT_ID: &str = "ubiquity-client-id";
pub const FLAG_API_USERNAME: &str = "ubiquity-api-username";
pub const FLAG_API_TOKEN: &str = "ubiquity-api-token";
pub const FLAG_ZONE_ID: &str = "ubiquity-zone-id";
pub const FLAG_FLAVOR_ID: &str = "ubiquity-flavor-id";
pub const FLAG_IMAGE_ID: &str = "ubiquity-image-id";

/// A create-time option the driver registers with the host CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flag {
    pub name: &'static str,
    pub env_var: &'static str,
    pub usage: &'static str,
    pub default: Option<&'static str>,
}

pub const CREATE_FLAGS: [Flag; 6] = [
    Flag {
        name: FLAG_CLIENT_ID,
        env_var: "UBIQUITY_CLIENT_ID",
        usage: "Ubiquity client ID for account authentication",
        default: None,
    },
    Flag {
        name: FLAG_API_USERNAME,
        env_var: "UBIQUITY_API_USERNAME",
        usage: "Ubiquity username for API authentication",
        default: None,
    },
    Flag {
        name: FLAG_API_TOKEN,
        env_var: "UBIQUITY_API_TOKEN",
        usage: "Ubiquity API token for authentication",
        default: None,
    },
    Flag {
        name: FLAG_ZONE_ID,
        env_var: "UBIQUITY_ZONE_ID",
        usage: "Ubiquity zone location for VM creation",
        default: Some("7"),
    },
    Flag {
        name: FLAG_FLAVOR_ID,
        env_var: "UBIQUITY_FLAVOR_ID",
        usage: "Ubiquity VM size details for VM creation",
        default: Some("1"),
    },
    Flag {
        name: FLAG_IMAGE_ID,
        env_var: "UBIQUITY_IMAGE_ID",
        usage: "Ubiquity VM image for VM creation",
        default: Some("18"),
    },
];

/// API token. Never printed and never serialized.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(***)")
    }
}

impl fmt::Display for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Raw, unvalidated option values as they arrive from flags or the
/// environment.
#[derive(Clone, Default)]
pub struct DriverOptions {
    pub client_id: Option<String>,
    pub api_username: Option<String>,
    pub api_token: Option<String>,
    pub zone_id: Option<String>,
    pub flavor_id: Option<String>,
    pub image_id: Option<String>,
}

impl fmt::Debug for DriverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverOptions")
            .field("client_id", &self.client_id)
            .field("api_username", &self.api_username)
            .field("api_token", &self.api_token.as_ref().map(|_| "***"))
            .field("zone_id", &self.zone_id)
            .field("flavor_id", &self.flavor_id)
            .field("image_id", &self.image_id)
            .finish()
    }
}

impl DriverOptions {
    /// Read options from env vars (`UBIQUITY_CLIENT_ID`, `UBIQUITY_API_USERNAME`,
    /// `UBIQUITY_API_TOKEN`, `UBIQUITY_ZONE_ID`, `UBIQUITY_FLAVOR_ID`,
    /// `UBIQUITY_IMAGE_ID`), loading `.env` first if present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read options through an arbitrary env-var lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let [client_id, api_username, api_token, zone_id, flavor_id, image_id] =
            CREATE_FLAGS.map(|flag| lookup(flag.env_var));

        Self {
            client_id,
            api_username,
            api_token,
            zone_id,
            flavor_id,
            image_id,
        }
    }
}

/// Validated driver configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    pub client_id: i64,
    pub username: String,
    #[serde(skip)]
    pub token: ApiToken,
    pub zone_id: i64,
    pub flavor_id: i64,
    pub image_id: i64,
}

impl DriverConfig {
    pub fn from_options(opts: &DriverOptions) -> Result<Self> {
        let client_id = match present(&opts.client_id) {
            None => return Err(missing(FLAG_CLIENT_ID)),
            Some(raw) => parse_id(FLAG_CLIENT_ID, raw)?,
        };
        if client_id <= 0 {
            return Err(Error::Configuration {
                flag: FLAG_CLIENT_ID,
                message: format!("must be a positive integer, got {client_id}"),
            });
        }

        let username = present(&opts.api_username)
            .ok_or_else(|| missing(FLAG_API_USERNAME))?
            .to_string();
        let token = present(&opts.api_token)
            .map(ApiToken::new)
            .ok_or_else(|| missing(FLAG_API_TOKEN))?;

        Ok(Self {
            client_id,
            username,
            token,
            zone_id: optional_id(FLAG_ZONE_ID, &opts.zone_id, DEFAULT_ZONE_ID)?,
            flavor_id: optional_id(FLAG_FLAVOR_ID, &opts.flavor_id, DEFAULT_FLAVOR_ID)?,
            image_id: optional_id(FLAG_IMAGE_ID, &opts.image_id, DEFAULT_IMAGE_ID)?,
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn missing(flag: &'static str) -> Error {
    Error::Configuration {
        flag,
        message: "required option is not set".into(),
    }
}

fn parse_id(flag: &'static str, raw: &str) -> Result<i64> {
    raw.parse::<i64>().map_err(|_| Error::Configuration {
        flag,
        message: format!("expected an integer, got {raw:?}"),
    })
}

fn optional_id(flag: &'static str, value: &Option<String>, default: i64) -> Result<i64> {
    present(value).map_or(Ok(default), |raw| parse_id(flag, raw))
}
