// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// An external resource access can be requested on (a dataset, a
/// dashboard, an IAM role). Discovery and sync happen outside this core;
/// here it is the attribute tree conditions and approver expressions
/// evaluate against.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Resource {
    pub id: String,
    pub provider_type: String,
    pub provider_urn: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub urn: String,
    #[serde(default)]
    pub name: String,
    /// Loosely-typed attributes (e.g. `is_pii`, `owner`, `tier`)
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub is_deleted: bool,
}

impl Resource {
    /// Serialize to the value tree condition fields resolve against.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
