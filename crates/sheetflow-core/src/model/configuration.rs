use crate::error::{ConfigError, Result};
use serde::Serialize;
use std::collections::HashMap;

pub const KEY_SUBSCRIPTION: &str = "Subscription";
pub const KEY_SUBSCRIPTION_SLUG: &str = "Subscription slug";
pub const KEY_STATE_RESOURCE_GROUP: &str = "Pulumi Resource Group";
pub const KEY_STATE_STORAGE_ACCOUNT: &str = "Pulumi Storage Account";
pub const KEY_STATE_CONTAINER: &str = "Pulumi Container";
pub const KEY_STATE_LOCATION: &str = "Pulumi Location";

const DEFAULT_STATE_CONTAINER: &str = "pulumi";
const DEFAULT_STATE_LOCATION: &str = "uksouth";

/// Settings from the `Configuration` worksheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    /// Subscription display name, matched exactly
    pub subscription: String,
    /// Short lower-case name stamped into every deployment row
    pub subscription_slug: String,
    pub state: StateBackend,
}

/// Where Pulumi keeps its state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateBackend {
    pub resource_group: String,
    pub storage_account: String,
    pub container: String,
    pub location: String,
}

impl Configuration {
    /// Build from the worksheet's key/value pairs. Later keys win.
    pub fn from_key_values(pairs: &[(String, String)]) -> Result<Self> {
        let map: HashMap<&str, &str> = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();

        Ok(Self {
            subscription: required(&map, KEY_SUBSCRIPTION)?.to_string(),
            subscription_slug: required(&map, KEY_SUBSCRIPTION_SLUG)?.to_lowercase(),
            state: StateBackend {
                resource_group: required(&map, KEY_STATE_RESOURCE_GROUP)?.to_lowercase(),
                storage_account: required(&map, KEY_STATE_STORAGE_ACCOUNT)?.to_lowercase(),
                container: optional(&map, KEY_STATE_CONTAINER, DEFAULT_STATE_CONTAINER),
                location: optional(&map, KEY_STATE_LOCATION, DEFAULT_STATE_LOCATION),
            },
        })
    }
}

fn required<'a>(map: &HashMap<&str, &'a str>, key: &str) -> Result<&'a str> {
    map.get(key)
        .copied()
        .ok_or_else(|| ConfigError::MissingSetting(key.to_string()))
}

fn optional(map: &HashMap<&str, &str>, key: &str, default: &str) -> String {
    map.get(key).copied().unwrap_or(default).to_lowercase()
}
