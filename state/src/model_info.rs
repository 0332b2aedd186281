//! The Juju model the unit runs in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Substrate of the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    /// Kubernetes (sidecar charms).
    #[default]
    Kubernetes,
    /// Machines.
    Lxd,
}

/// Credentials of the cloud a trusted charm may inspect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCredential {
    /// Authentication type, e.g. `userpass`.
    pub auth_type: String,
    /// Credential attributes.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Redacted attribute names.
    #[serde(default)]
    pub redacted: Vec<String>,
}

/// What `credential-get` returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudSpec {
    /// Cloud type, e.g. `lxd`.
    #[serde(rename = "type")]
    pub cloud_type: String,
    /// Cloud name.
    #[serde(default = "default_cloud_name")]
    pub name: String,
    /// Region.
    #[serde(default)]
    pub region: Option<String>,
    /// API endpoint.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Identity endpoint.
    #[serde(default)]
    pub identity_endpoint: Option<String>,
    /// Storage endpoint.
    #[serde(default)]
    pub storage_endpoint: Option<String>,
    /// Credential.
    #[serde(default)]
    pub credential: Option<CloudCredential>,
    /// CA certificates.
    #[serde(default)]
    pub ca_certificates: Vec<String>,
    /// Whether TLS verification is skipped.
    #[serde(default)]
    pub skip_tls_verify: bool,
    /// Whether this is a controller cloud.
    #[serde(default)]
    pub is_controller_cloud: bool,
}

fn default_cloud_name() -> String {
    "localhost".to_string()
}

impl CloudSpec {
    /// A cloud spec of `cloud_type` with defaults elsewhere.
    pub fn new(cloud_type: impl Into<String>) -> Self {
        Self {
            cloud_type: cloud_type.into(),
            name: default_cloud_name(),
            region: None,
            endpoint: None,
            identity_endpoint: None,
            storage_endpoint: None,
            credential: None,
            ca_certificates: Vec::new(),
            skip_tls_verify: false,
            is_controller_cloud: false,
        }
    }
}

/// Model name, uuid, substrate and cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// Model name.
    #[serde(default = "default_model_name")]
    pub name: String,
    /// Model uuid.
    #[serde(default = "default_model_uuid")]
    pub uuid: String,
    /// Substrate.
    #[serde(rename = "type", default)]
    pub model_type: ModelType,
    /// Cloud spec, machine models only.
    #[serde(default)]
    pub cloud_spec: Option<CloudSpec>,
}

fn default_model_name() -> String {
    "test-model".to_string()
}

fn default_model_uuid() -> String {
    "00000000-0000-4000-8000-000000000000".to_string()
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            uuid: default_model_uuid(),
            model_type: ModelType::Kubernetes,
            cloud_spec: None,
        }
    }
}
