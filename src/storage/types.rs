use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level config file. Stored as config.json with 0600 perms since it holds tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access_token: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub refresh_token: String,
    #[serde(skip_serializing_if = "ServiceConfigMap::is_empty")]
    pub services: ServiceConfigMap,
    /// API gateway URL. Either a full URL or one of the aliases
    /// `production`, `staging` and `integration`.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub auth_url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub client_id: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub insecure: bool,
    /// Replaces the default scopes entirely when non-empty.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    /// Unix timestamp of the last successful save.
    #[serde(skip_serializing_if = "is_zero")]
    pub last_updated: i64,
}

impl Config {
    pub fn is_logged_in(&self) -> bool {
        !self.access_token.is_empty() || !self.refresh_token.is_empty()
    }
}

/// Per-service selections, shared by the config file and every saved context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfigMap {
    #[serde(rename = "serviceregistry", skip_serializing_if = "Option::is_none")]
    pub service_registry: Option<ServiceRegistryConfig>,
}

impl ServiceConfigMap {
    pub fn is_empty(&self) -> bool {
        self.service_registry.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServiceRegistryConfig {
    pub instance_id: String,
    pub name: String,
}

/// Named contexts and the pointer to the active one. Stored as contexts.json.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceContext {
    pub current_context: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub contexts: BTreeMap<String, ServiceConfigMap>,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
