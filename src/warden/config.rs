// SPDX-License-Identifier: MIT

//! Bootstrap configuration
//!
//! One YAML file wires the whole service: where policy files live, which
//! policies govern which resources, the providers to register, seed
//! resources, and the static identity directory.

use crate::warden::appeal::PolicyBinding;
use crate::warden::domain::Resource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    pub provider_type: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Directory of policy YAML files loaded at startup
    #[serde(default)]
    pub policies_dir: Option<String>,
    #[serde(default)]
    pub bindings: Vec<PolicyBinding>,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    /// account id -> attribute tree for approver-expression resolution
    #[serde(default)]
    pub identities: HashMap<String, Value>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content = fs::read_to_string(&path)
            .map_err(|e| format!("{}: {e}", path.as_ref().display()))?;
        serde_yaml::from_str(&content).map_err(|e| e.to_string())
    }
}
