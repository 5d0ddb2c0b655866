// SPDX-License-Identifier: MIT

//! Policy service: versioned snapshots and YAML file loading
//!
//! Policies are append-only. Creating a policy with an existing id writes
//! version `latest + 1`; appeals keep pointing at the version they were
//! created against.

use crate::warden::clock::Clock;
use crate::warden::domain::Policy;
use crate::warden::errors::PolicyError;
use crate::warden::store::PolicyStore;
use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// On-disk policy definition. Version and timestamps are assigned by the
/// service, never read from the file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyFile {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<crate::warden::domain::Step>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl PolicyFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PolicyError> {
        let content = fs::read_to_string(&path)
            .map_err(|e| PolicyError::InvalidFile(format!("{}: {e}", path.as_ref().display())))?;
        Self::parse_yaml(&content)
    }

    pub fn parse_yaml(content: &str) -> Result<Self, PolicyError> {
        serde_yaml::from_str(content).map_err(|e| PolicyError::InvalidFile(e.to_string()))
    }

    fn into_policy(self, version: u32, now: DateTime<Utc>) -> Policy {
        Policy {
            id: self.id,
            version,
            description: self.description,
            steps: self.steps,
            labels: self.labels,
            created_at: now,
            updated_at: now,
        }
    }
}

pub struct PolicyService {
    store: Arc<dyn PolicyStore>,
    clock: Arc<dyn Clock>,
}

impl PolicyService {
    pub fn new(store: Arc<dyn PolicyStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Validate and persist a definition as a new version.
    pub async fn create(&self, file: PolicyFile) -> Result<Policy, PolicyError> {
        let version = match self.store.get_latest(&file.id).await? {
            Some(latest) => latest.version + 1,
            None => 1,
        };
        let policy = file.into_policy(version, self.clock.now());
        policy.validate()?;
        self.store.create(policy.clone()).await?;
        info!("created policy {} version {}", policy.id, policy.version);
        Ok(policy)
    }

    pub async fn get(&self, id: &str, version: u32) -> Result<Policy, PolicyError> {
        self.store
            .get(id, version)
            .await?
            .ok_or(PolicyError::NotFound {
                id: id.to_string(),
                version,
            })
    }

    pub async fn get_latest(&self, id: &str) -> Result<Policy, PolicyError> {
        self.store
            .get_latest(id)
            .await?
            .ok_or(PolicyError::NotFound {
                id: id.to_string(),
                version: 0,
            })
    }

    pub async fn list(&self) -> Result<Vec<Policy>, PolicyError> {
        self.store.list().await
    }

    /// Load every `.yaml`/`.yml` file in a directory as a policy.
    pub async fn load_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<Policy>, PolicyError> {
        let entries = fs::read_dir(&dir)
            .map_err(|e| PolicyError::InvalidFile(format!("{}: {e}", dir.as_ref().display())))?;
        let mut loaded = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| PolicyError::InvalidFile(e.to_string()))?;
            let path = entry.path();
            let is_yaml = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }
            let file = PolicyFile::load(&path)?;
            loaded.push(self.create(file).await?);
        }
        Ok(loaded)
    }
}
