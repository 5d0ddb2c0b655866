// SPDX-License-Identifier: MIT

//! Persistence traits and in-memory implementations
//!
//! Services only know the traits; the in-memory stores back the server
//! and the test suites.

use crate::warden::domain::{Appeal, AppealStatus, Policy, Resource};
use crate::warden::errors::{AppealError, PolicyError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Criteria for listing appeals. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct AppealFilter {
    pub statuses: Vec<AppealStatus>,
    pub account_id: Option<String>,
    pub resource_id: Option<String>,
    pub role: Option<String>,
    /// Only appeals whose expiration date is set and earlier than this
    pub expiration_before: Option<DateTime<Utc>>,
}

impl AppealFilter {
    fn matches(&self, appeal: &Appeal) -> bool {
        if !self.statuses.is_empty() && !self.statuses.contains(&appeal.status) {
            return false;
        }
        if let Some(account_id) = &self.account_id {
            if &appeal.account_id != account_id {
                return false;
            }
        }
        if let Some(resource_id) = &self.resource_id {
            if &appeal.resource_id != resource_id {
                return false;
            }
        }
        if let Some(role) = &self.role {
            if &appeal.role != role {
                return false;
            }
        }
        if let Some(before) = &self.expiration_before {
            match appeal.options.expiration_date {
                Some(expiry) if expiry < *before => {}
                _ => return false,
            }
        }
        true
    }
}

#[async_trait]
pub trait AppealStore: Send + Sync {
    async fn bulk_insert(&self, appeals: Vec<Appeal>) -> Result<(), AppealError>;
    async fn find(&self, filter: &AppealFilter) -> Result<Vec<Appeal>, AppealError>;
    async fn get_by_id(&self, id: &str) -> Result<Option<Appeal>, AppealError>;
    async fn update(&self, appeal: &Appeal) -> Result<(), AppealError>;
}

#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// Insert a new `(id, version)` snapshot. Existing versions are never
    /// replaced.
    async fn create(&self, policy: Policy) -> Result<(), PolicyError>;
    async fn get(&self, id: &str, version: u32) -> Result<Option<Policy>, PolicyError>;
    async fn get_latest(&self, id: &str) -> Result<Option<Policy>, PolicyError>;
    async fn list(&self) -> Result<Vec<Policy>, PolicyError>;
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_by_id(&self, id: &str) -> Result<Option<Resource>, AppealError>;
    async fn upsert(&self, resource: Resource) -> Result<(), AppealError>;
}

#[derive(Clone, Default)]
pub struct InMemoryAppealStore {
    appeals: Arc<RwLock<HashMap<String, Appeal>>>,
}

impl InMemoryAppealStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppealStore for InMemoryAppealStore {
    async fn bulk_insert(&self, new: Vec<Appeal>) -> Result<(), AppealError> {
        let mut appeals = self.appeals.write().await;
        for appeal in new {
            appeals.insert(appeal.id.clone(), appeal);
        }
        Ok(())
    }

    async fn find(&self, filter: &AppealFilter) -> Result<Vec<Appeal>, AppealError> {
        let appeals = self.appeals.read().await;
        let mut found: Vec<Appeal> = appeals
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Appeal>, AppealError> {
        let appeals = self.appeals.read().await;
        Ok(appeals.get(id).cloned())
    }

    async fn update(&self, appeal: &Appeal) -> Result<(), AppealError> {
        let mut appeals = self.appeals.write().await;
        if !appeals.contains_key(&appeal.id) {
            return Err(AppealError::AppealNotFound(appeal.id.clone()));
        }
        appeals.insert(appeal.id.clone(), appeal.clone());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryPolicyStore {
    // id -> version -> policy
    policies: Arc<RwLock<HashMap<String, HashMap<u32, Policy>>>>,
}

impl InMemoryPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyStore for InMemoryPolicyStore {
    async fn create(&self, policy: Policy) -> Result<(), PolicyError> {
        let mut policies = self.policies.write().await;
        policies
            .entry(policy.id.clone())
            .or_default()
            .insert(policy.version, policy);
        Ok(())
    }

    async fn get(&self, id: &str, version: u32) -> Result<Option<Policy>, PolicyError> {
        let policies = self.policies.read().await;
        Ok(policies.get(id).and_then(|v| v.get(&version)).cloned())
    }

    async fn get_latest(&self, id: &str) -> Result<Option<Policy>, PolicyError> {
        let policies = self.policies.read().await;
        Ok(policies
            .get(id)
            .and_then(|v| v.values().max_by_key(|p| p.version))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<Policy>, PolicyError> {
        let policies = self.policies.read().await;
        let mut all: Vec<Policy> = policies
            .values()
            .flat_map(|versions| versions.values().cloned())
            .collect();
        all.sort_by(|a, b| a.id.cmp(&b.id).then(a.version.cmp(&b.version)));
        Ok(all)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryResourceStore {
    resources: Arc<RwLock<HashMap<String, Resource>>>,
}

impl InMemoryResourceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResourceStore for InMemoryResourceStore {
    async fn get_by_id(&self, id: &str) -> Result<Option<Resource>, AppealError> {
        let resources = self.resources.read().await;
        Ok(resources.get(id).cloned())
    }

    async fn upsert(&self, resource: Resource) -> Result<(), AppealError> {
        let mut resources = self.resources.write().await;
        resources.insert(resource.id.clone(), resource);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::warden::domain::AppealOptions;
    use chrono::Duration;

    fn appeal(id: &str, status: AppealStatus) -> Appeal {
        Appeal {
            id: id.to_string(),
            resource_id: "r-1".to_string(),
            policy_id: "p".to_string(),
            policy_version: 1,
            status,
            account_id: "dev@example.com".to_string(),
            account_type: "user".to_string(),
            created_by: "dev@example.com".to_string(),
            creator: None,
            role: "viewer".to_string(),
            options: AppealOptions::default(),
            details: None,
            labels: HashMap::new(),
            revoked_by: None,
            revoked_at: None,
            revoke_reason: None,
            resource: None,
            approvals: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = InMemoryAppealStore::new();
        store
            .bulk_insert(vec![appeal("a-1", AppealStatus::Pending)])
            .await
            .unwrap();

        let found = store.get_by_id("a-1").await.unwrap();
        assert!(found.is_some());
        assert!(store.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_requires_existing() {
        let store = InMemoryAppealStore::new();
        let a = appeal("a-1", AppealStatus::Pending);
        assert!(store.update(&a).await.is_err());

        store.bulk_insert(vec![a.clone()]).await.unwrap();
        let mut a = a;
        a.status = AppealStatus::Canceled;
        store.update(&a).await.unwrap();
        let found = store.get_by_id("a-1").await.unwrap().unwrap();
        assert_eq!(found.status, AppealStatus::Canceled);
    }

    #[tokio::test]
    async fn test_find_by_status_and_expiry() {
        let store = InMemoryAppealStore::new();
        let now = Utc::now();

        let mut expired = appeal("a-1", AppealStatus::Active);
        expired.options.expiration_date = Some(now - Duration::hours(1));
        let mut live = appeal("a-2", AppealStatus::Active);
        live.options.expiration_date = Some(now + Duration::hours(1));
        let open_ended = appeal("a-3", AppealStatus::Active);
        let pending = appeal("a-4", AppealStatus::Pending);

        store
            .bulk_insert(vec![expired, live, open_ended, pending])
            .await
            .unwrap();

        let filter = AppealFilter {
            statuses: vec![AppealStatus::Active],
            expiration_before: Some(now),
            ..Default::default()
        };
        let found = store.find(&filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a-1");
    }

    #[tokio::test]
    async fn test_policy_versions() {
        let store = InMemoryPolicyStore::new();
        let mut p1 = crate::warden::domain::Policy {
            id: "p".to_string(),
            version: 1,
            description: String::new(),
            steps: vec![],
            labels: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.create(p1.clone()).await.unwrap();
        p1.version = 2;
        p1.description = "second".to_string();
        store.create(p1).await.unwrap();

        let latest = store.get_latest("p").await.unwrap().unwrap();
        assert_eq!(latest.version, 2);
        let first = store.get("p", 1).await.unwrap().unwrap();
        assert_eq!(first.description, "");
        assert!(store.get_latest("ghost").await.unwrap().is_none());
    }
}
