// SPDX-License-Identifier: MIT

//! Appeal service: creation and the action processor
//!
//! All mutating operations on one appeal are serialized through a
//! per-appeal lock; the advancement walk assumes a consistent snapshot of
//! all approvals. Operations across different appeals run in parallel.

use crate::engine::expr::evaluate_str;
use crate::warden::approval::advance;
use crate::warden::audit::AuditLogger;
use crate::warden::clock::Clock;
use crate::warden::domain::{
    parse_duration, Appeal, AppealAction, AppealOptions, AppealStatus, Approval, ApprovalAction,
    ApprovalStatus, Policy, Resource, Step, DEFAULT_ACCOUNT_TYPE, SYSTEM_ACTOR,
};
use crate::warden::errors::AppealError;
use crate::warden::identity::IdentityClient;
use crate::warden::notifier::{AppealEvent, Notifier};
use crate::warden::provider::ProviderRegistry;
use crate::warden::store::{AppealFilter, AppealStore, PolicyStore, ResourceStore};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Maps resources of a provider to the policy governing their appeals.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PolicyBinding {
    pub provider_type: String,
    pub provider_urn: String,
    pub resource_type: String,
    pub policy_id: String,
    /// Pin a specific version; unset means latest at appeal creation
    #[serde(default)]
    pub policy_version: Option<u32>,
}

/// Caller input for creating an appeal.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAppeal {
    pub resource_id: String,
    pub account_id: String,
    #[serde(default)]
    pub account_type: Option<String>,
    pub created_by: String,
    pub role: String,
    #[serde(default)]
    pub options: AppealOptions,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

pub struct AppealService {
    appeals: Arc<dyn AppealStore>,
    policies: Arc<dyn PolicyStore>,
    resources: Arc<dyn ResourceStore>,
    providers: ProviderRegistry,
    identity: Arc<dyn IdentityClient>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditLogger>,
    clock: Arc<dyn Clock>,
    bindings: Vec<PolicyBinding>,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl AppealService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        appeals: Arc<dyn AppealStore>,
        policies: Arc<dyn PolicyStore>,
        resources: Arc<dyn ResourceStore>,
        providers: ProviderRegistry,
        identity: Arc<dyn IdentityClient>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditLogger>,
        clock: Arc<dyn Clock>,
        bindings: Vec<PolicyBinding>,
    ) -> Self {
        Self {
            appeals,
            policies,
            resources,
            providers,
            identity,
            notifier,
            audit,
            clock,
            bindings,
            locks: RwLock::new(HashMap::new()),
        }
    }

    async fn lock_for(&self, appeal_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(appeal_id) {
                return lock.clone();
            }
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(appeal_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn get(&self, id: &str) -> Result<Appeal, AppealError> {
        self.appeals
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppealError::AppealNotFound(id.to_string()))
    }

    pub async fn find(&self, filter: &AppealFilter) -> Result<Vec<Appeal>, AppealError> {
        self.appeals.find(filter).await
    }

    /// Build an appeal against the policy bound to its resource, resolve
    /// approvers, run one advancement pass, and persist atomically.
    pub async fn create(&self, input: NewAppeal) -> Result<Appeal, AppealError> {
        let account_type = input
            .account_type
            .clone()
            .unwrap_or_else(|| DEFAULT_ACCOUNT_TYPE.to_string());
        if account_type == DEFAULT_ACCOUNT_TYPE && input.account_id != input.created_by {
            return Err(AppealError::CannotCreateForOtherUser);
        }
        if let Some(duration) = &input.options.duration {
            parse_duration(duration)?;
        }

        let resource = self
            .resources
            .get_by_id(&input.resource_id)
            .await?
            .ok_or_else(|| AppealError::ResourceNotFound(input.resource_id.clone()))?;
        if resource.is_deleted {
            return Err(AppealError::ResourceIsDeleted(resource.id.clone()));
        }

        let duplicates = self
            .appeals
            .find(&AppealFilter {
                statuses: vec![AppealStatus::Pending, AppealStatus::Active],
                account_id: Some(input.account_id.clone()),
                resource_id: Some(input.resource_id.clone()),
                role: Some(input.role.clone()),
                ..Default::default()
            })
            .await?;
        if !duplicates.is_empty() {
            return Err(AppealError::AppealDuplicate);
        }

        let binding = self
            .bindings
            .iter()
            .find(|b| {
                b.provider_type == resource.provider_type
                    && b.provider_urn == resource.provider_urn
                    && b.resource_type == resource.resource_type
            })
            .ok_or_else(|| AppealError::PolicyBindingNotFound(resource.resource_type.clone()))?;
        let policy = match binding.policy_version {
            Some(version) => self.policies.get(&binding.policy_id, version).await?,
            None => self.policies.get_latest(&binding.policy_id).await?,
        }
        .ok_or(crate::warden::errors::PolicyError::NotFound {
            id: binding.policy_id.clone(),
            version: binding.policy_version.unwrap_or(0),
        })?;

        let creator = self
            .identity
            .get_user(&input.created_by)
            .await
            .map_err(AppealError::Identity)?;

        let now = self.clock.now();
        let mut appeal = Appeal {
            id: Uuid::new_v4().to_string(),
            resource_id: resource.id.clone(),
            policy_id: policy.id.clone(),
            policy_version: policy.version,
            status: AppealStatus::Pending,
            account_id: input.account_id,
            account_type,
            created_by: input.created_by,
            creator,
            role: input.role,
            options: input.options,
            details: input.details,
            labels: input.labels,
            revoked_by: None,
            revoked_at: None,
            revoke_reason: None,
            resource: Some(resource.clone()),
            approvals: vec![],
            created_at: now,
            updated_at: now,
        };
        appeal.approvals = self.build_approvals(&policy, &appeal, now)?;

        advance(&policy, &mut appeal, now)?;
        if appeal.status != AppealStatus::Rejected && appeal.all_approvals_settled() {
            self.grant_and_activate(&mut appeal, &resource, now).await?;
        }

        self.appeals.bulk_insert(vec![appeal.clone()]).await?;

        self.record_audit("appeal.create", &appeal.created_by, &appeal)
            .await;
        let event = match appeal.status {
            AppealStatus::Active => AppealEvent::Approved,
            AppealStatus::Rejected => AppealEvent::Rejected,
            _ => AppealEvent::Created,
        };
        self.notify(event, &appeal).await;
        info!(
            "created appeal {} for {} on {} ({})",
            appeal.id,
            appeal.account_id,
            appeal.resource_id,
            serde_json::to_string(&appeal.status).unwrap_or_default()
        );
        Ok(appeal)
    }

    fn build_approvals(
        &self,
        policy: &Policy,
        appeal: &Appeal,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Approval>, AppealError> {
        let appeal_value = appeal.to_value();
        policy
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| {
                let approvers = self.resolve_approvers(step, &appeal_value)?;
                Ok(Approval {
                    id: Uuid::new_v4().to_string(),
                    name: step.name.clone(),
                    index,
                    appeal_id: appeal.id.clone(),
                    status: ApprovalStatus::Pending,
                    actor: None,
                    approvers,
                    policy_id: policy.id.clone(),
                    policy_version: policy.version,
                    created_at: now,
                    updated_at: now,
                })
            })
            .collect()
    }

    /// Resolve a step's approver entries at creation time. Plain strings
    /// are literal identities; `$`-expressions are evaluated against the
    /// appeal context and must yield a string or a list of strings.
    fn resolve_approvers(
        &self,
        step: &Step,
        appeal_value: &Value,
    ) -> Result<Vec<String>, AppealError> {
        let mut params = serde_json::Map::new();
        params.insert("appeal".to_string(), appeal_value.clone());

        let mut resolved = Vec::new();
        for entry in &step.approvers {
            if !entry.contains('$') {
                resolved.push(entry.clone());
                continue;
            }
            match evaluate_str(entry, &params)? {
                Value::String(s) => resolved.push(s),
                Value::Array(items) => {
                    for item in items {
                        match item {
                            Value::String(s) => resolved.push(s),
                            _ => return Err(AppealError::ApproverInvalidType),
                        }
                    }
                }
                _ => return Err(AppealError::ApproverInvalidType),
            }
        }
        Ok(resolved)
    }

    /// Approve or reject one named pending approval, then advance.
    pub async fn make_action(&self, action: ApprovalAction) -> Result<Appeal, AppealError> {
        let decision: AppealAction = action.action.parse()?;
        let lock = self.lock_for(&action.appeal_id).await;
        let _guard = lock.lock().await;

        let mut appeal = self.get(&action.appeal_id).await?;
        require_pending(&appeal)?;

        let index = appeal
            .approvals
            .iter()
            .position(|a| a.name == action.approval_name)
            .ok_or_else(|| AppealError::ApprovalNameNotFound(action.approval_name.clone()))?;

        match appeal.approvals[index].status {
            ApprovalStatus::Pending => {}
            ApprovalStatus::Approved => return Err(AppealError::ApprovalStatusApproved),
            ApprovalStatus::Rejected => return Err(AppealError::ApprovalStatusRejected),
            ApprovalStatus::Skipped => return Err(AppealError::ApprovalStatusSkipped),
        }
        for earlier in &appeal.approvals[..index] {
            match earlier.status {
                ApprovalStatus::Approved | ApprovalStatus::Skipped => {}
                ApprovalStatus::Pending => return Err(AppealError::ApprovalDependencyIsPending),
                ApprovalStatus::Rejected => return Err(AppealError::AppealStatusRejected),
            }
        }
        if !appeal.approvals[index]
            .approvers
            .iter()
            .any(|a| a == &action.actor)
        {
            return Err(AppealError::ActionForbidden);
        }

        let now = self.clock.now();
        match decision {
            AppealAction::Approve => {
                appeal.approvals[index].approve(now);
                appeal.approvals[index].actor = Some(action.actor.clone());

                let policy = self
                    .policies
                    .get(&appeal.policy_id, appeal.policy_version)
                    .await?
                    .ok_or(crate::warden::errors::PolicyError::NotFound {
                        id: appeal.policy_id.clone(),
                        version: appeal.policy_version,
                    })?;
                advance(&policy, &mut appeal, now)?;

                if appeal.status != AppealStatus::Rejected && appeal.all_approvals_settled() {
                    let resource = self.resource_of(&appeal).await?;
                    self.grant_and_activate(&mut appeal, &resource, now).await?;
                }
            }
            AppealAction::Reject => {
                appeal.approvals[index].reject(now);
                appeal.approvals[index].actor = Some(action.actor.clone());
                appeal.reject(now);
            }
        }

        self.appeals.update(&appeal).await?;

        self.record_audit("appeal.action", &action.actor, &appeal)
            .await;
        let event = match appeal.status {
            AppealStatus::Active => AppealEvent::Approved,
            AppealStatus::Rejected => AppealEvent::Rejected,
            _ => AppealEvent::AwaitingApproval,
        };
        self.notify(event, &appeal).await;
        Ok(appeal)
    }

    /// Withdraw a pending appeal.
    pub async fn cancel(&self, id: &str, actor: &str) -> Result<Appeal, AppealError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut appeal = self.get(id).await?;
        require_pending(&appeal)?;

        appeal.cancel(self.clock.now());
        self.appeals.update(&appeal).await?;

        self.record_audit("appeal.cancel", actor, &appeal).await;
        self.notify(AppealEvent::Canceled, &appeal).await;
        Ok(appeal)
    }

    /// Remove active access. The provider revoke runs first; the appeal is
    /// only marked terminated once access is actually gone upstream.
    pub async fn revoke(
        &self,
        id: &str,
        actor: &str,
        reason: &str,
    ) -> Result<Appeal, AppealError> {
        let lock = self.lock_for(id).await;
        let _guard = lock.lock().await;

        let mut appeal = self.get(id).await?;
        match appeal.status {
            AppealStatus::Active => {}
            AppealStatus::Pending => return Err(AppealError::AppealStatusPending),
            AppealStatus::Canceled => return Err(AppealError::AppealStatusCanceled),
            AppealStatus::Rejected => return Err(AppealError::AppealStatusRejected),
            AppealStatus::Terminated => return Err(AppealError::AppealStatusTerminated),
        }
        if !self.may_revoke(&appeal, actor) {
            return Err(AppealError::RevokeForbidden);
        }

        let resource = self.resource_of(&appeal).await?;
        let provider = self
            .providers
            .get(&resource.provider_type)
            .await
            .ok_or_else(|| {
                AppealError::PolicyBindingNotFound(resource.provider_type.clone())
            })?;
        provider.revoke_access(&appeal, &resource).await?;

        appeal.terminate(actor, reason, self.clock.now());
        self.appeals.update(&appeal).await?;

        self.record_audit("appeal.revoke", actor, &appeal).await;
        self.notify(AppealEvent::Revoked, &appeal).await;
        info!("revoked appeal {} by {}", appeal.id, actor);
        Ok(appeal)
    }

    /// System jobs, the appeal creator and any listed approver may revoke.
    fn may_revoke(&self, appeal: &Appeal, actor: &str) -> bool {
        actor == SYSTEM_ACTOR
            || actor == appeal.created_by
            || appeal
                .approvals
                .iter()
                .any(|a| a.approvers.iter().any(|ap| ap == actor))
    }

    async fn resource_of(&self, appeal: &Appeal) -> Result<Resource, AppealError> {
        if let Some(resource) = &appeal.resource {
            return Ok(resource.clone());
        }
        self.resources
            .get_by_id(&appeal.resource_id)
            .await?
            .ok_or_else(|| AppealError::ResourceNotFound(appeal.resource_id.clone()))
    }

    async fn grant_and_activate(
        &self,
        appeal: &mut Appeal,
        resource: &Resource,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppealError> {
        let provider = self
            .providers
            .get(&resource.provider_type)
            .await
            .ok_or_else(|| {
                AppealError::PolicyBindingNotFound(resource.provider_type.clone())
            })?;
        provider.grant_access(appeal, resource).await?;
        appeal.activate(now)?;
        Ok(())
    }

    async fn record_audit(&self, action: &str, actor: &str, appeal: &Appeal) {
        let data = json!({
            "appeal_id": appeal.id,
            "status": appeal.status,
            "resource_id": appeal.resource_id,
            "role": appeal.role,
        });
        if let Err(e) = self.audit.record(action, actor, data).await {
            warn!("audit record failed for appeal {}: {e}", appeal.id);
        }
    }

    async fn notify(&self, event: AppealEvent, appeal: &Appeal) {
        if let Err(e) = self.notifier.notify(event, appeal).await {
            warn!("notification failed for appeal {}: {e}", appeal.id);
        }
    }
}

fn require_pending(appeal: &Appeal) -> Result<(), AppealError> {
    match appeal.status {
        AppealStatus::Pending => Ok(()),
        AppealStatus::Canceled => Err(AppealError::AppealStatusCanceled),
        AppealStatus::Active => Err(AppealError::AppealStatusApproved),
        AppealStatus::Rejected => Err(AppealError::AppealStatusRejected),
        AppealStatus::Terminated => Err(AppealError::AppealStatusTerminated),
    }
}
