// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Resolves creator attributes (manager, team, and similar) at appeal
/// creation so approver expressions can reference `$appeal.creator.*`.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Attribute tree for an account id, or `None` when the directory has
    /// no record for it.
    async fn get_user(&self, account_id: &str) -> Result<Option<Value>, String>;
}

/// Directory backed by a static map, loaded from bootstrap config.
#[derive(Clone, Default)]
pub struct StaticIdentity {
    users: Arc<RwLock<HashMap<String, Value>>>,
}

impl StaticIdentity {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, account_id: impl Into<String>, attributes: Value) {
        let mut users = self.users.write().await;
        users.insert(account_id.into(), attributes);
    }
}

#[async_trait]
impl IdentityClient for StaticIdentity {
    async fn get_user(&self, account_id: &str) -> Result<Option<Value>, String> {
        let users = self.users.read().await;
        Ok(users.get(account_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_lookup() {
        let identity = StaticIdentity::new();
        identity
            .insert("dev@example.com", json!({"manager": "lead@example.com"}))
            .await;

        let user = identity.get_user("dev@example.com").await.unwrap().unwrap();
        assert_eq!(user["manager"], json!("lead@example.com"));
        assert!(identity.get_user("ghost@example.com").await.unwrap().is_none());
    }
}
