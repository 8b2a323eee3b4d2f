use serde::{Deserialize, Serialize};

// ── Cloud VM types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct CreateVmRequest {
    pub hostname: String,
    pub image_id: i64,
    pub flavor_id: i64,
    pub zone_id: i64,
    pub key_id: i64,
    /// Tells the provider to skip its own post-install provisioning so the
    /// injected key is the only way in.
    pub docker_machine: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedVm {
    pub service_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vm {
    pub service_id: i64,
    #[serde(default)]
    pub hostname: Option<String>,
    /// Provider status string, e.g. `online` or `offline`.
    pub state: String,
    #[serde(default)]
    pub main_ip_address: Option<String>,
}

// ── SSH key types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AddKeyRequest {
    pub key_name: String,
    pub pub_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedKey {
    pub key_id: i64,
}
