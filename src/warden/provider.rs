// SPDX-License-Identifier: MIT

//! Provider capability: granting and revoking access on external systems
//!
//! The engine never talks to a provider directly; it goes through the
//! registry keyed by provider type. `HttpProvider` covers providers that
//! expose a plain webhook-style grant API.

use crate::warden::domain::{Appeal, Resource};
use crate::warden::errors::ProviderError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider type this implementation serves, e.g. `bigquery`
    fn provider_type(&self) -> &str;

    async fn grant_access(&self, appeal: &Appeal, resource: &Resource)
        -> Result<(), ProviderError>;

    async fn revoke_access(
        &self,
        appeal: &Appeal,
        resource: &Resource,
    ) -> Result<(), ProviderError>;
}

#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<HashMap<String, Arc<dyn Provider>>>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, provider: Arc<dyn Provider>) {
        let mut providers = self.providers.write().await;
        providers.insert(provider.provider_type().to_string(), provider);
    }

    pub async fn get(&self, provider_type: &str) -> Option<Arc<dyn Provider>> {
        let providers = self.providers.read().await;
        providers.get(provider_type).cloned()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Grants and revokes access by POSTing to a provider-hosted endpoint.
pub struct HttpProvider {
    provider_type: String,
    base_url: url::Url,
    client: Client,
}

impl HttpProvider {
    pub fn new(provider_type: impl Into<String>, base_url: &str) -> Result<Self, ProviderError> {
        let base_url = url::Url::parse(base_url)
            .map_err(|e| ProviderError::InvalidConfig(format!("base_url: {e}")))?;
        Ok(Self {
            provider_type: provider_type.into(),
            base_url,
            client: Client::new(),
        })
    }

    async fn post(&self, action: &str, appeal: &Appeal, resource: &Resource)
        -> Result<(), ProviderError> {
        let url = self
            .base_url
            .join(action)
            .map_err(|e| ProviderError::InvalidConfig(format!("endpoint: {e}")))?;

        let body = json!({
            "account_id": appeal.account_id,
            "account_type": appeal.account_type,
            "role": appeal.role,
            "resource_urn": resource.urn,
            "resource_type": resource.resource_type,
        });

        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request(&self.provider_type, e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::request(
                &self.provider_type,
                format!("{action} returned {status}: {text}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn provider_type(&self) -> &str {
        &self.provider_type
    }

    async fn grant_access(
        &self,
        appeal: &Appeal,
        resource: &Resource,
    ) -> Result<(), ProviderError> {
        self.post("grants", appeal, resource).await
    }

    async fn revoke_access(
        &self,
        appeal: &Appeal,
        resource: &Resource,
    ) -> Result<(), ProviderError> {
        self.post("revocations", appeal, resource).await
    }
}
