// SPDX-License-Identifier: MIT

//! Appeal entity and its lifecycle states
//!
//! An appeal is a request for time-bounded access to a resource under a
//! role. Its approval chain is pinned to one policy version at creation
//! and never migrates.

use crate::warden::domain::approval::Approval;
use crate::warden::domain::resource::Resource;
use crate::warden::errors::AppealError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Lifecycle state of an appeal. Canceled, rejected and terminated are
/// terminal; active only ends through revocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    Pending,
    Canceled,
    Active,
    Rejected,
    Terminated,
}

impl AppealStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Rejected | Self::Terminated)
    }
}

/// Decision an approver can take on a pending approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppealAction {
    Approve,
    Reject,
}

impl FromStr for AppealAction {
    type Err = AppealError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "approve" => Ok(Self::Approve),
            "reject" => Ok(Self::Reject),
            _ => Err(AppealError::ActionInvalidValue),
        }
    }
}

/// A request by an actor to decide one named approval of an appeal.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApprovalAction {
    pub appeal_id: String,
    pub approval_name: String,
    pub actor: String,
    pub action: String,
}

/// Caller-supplied access window. An explicit expiration date wins over a
/// duration; a duration is resolved against activation time.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppealOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// A request for access to a resource under a role.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Appeal {
    pub id: String,
    pub resource_id: String,
    pub policy_id: String,
    pub policy_version: u32,
    pub status: AppealStatus,
    /// Principal the access is granted to
    pub account_id: String,
    #[serde(default)]
    pub account_type: String,
    /// Identity that filed the appeal
    pub created_by: String,
    /// Creator attributes resolved at creation, available to approver
    /// expressions as `$appeal.creator.*`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<Value>,
    pub role: String,
    #[serde(default)]
    pub options: AppealOptions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
    #[serde(default)]
    pub approvals: Vec<Approval>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appeal {
    /// Transition to active and resolve the expiration window. Explicit
    /// expiration dates are kept as-is; durations count from `now`.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Result<(), AppealError> {
        self.status = AppealStatus::Active;
        if self.options.expiration_date.is_none() {
            if let Some(duration) = &self.options.duration {
                let d = parse_duration(duration)?;
                self.options.expiration_date = Some(now + d);
            }
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn reject(&mut self, now: DateTime<Utc>) {
        self.status = AppealStatus::Rejected;
        self.updated_at = now;
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = AppealStatus::Canceled;
        self.updated_at = now;
    }

    pub fn terminate(&mut self, by: &str, reason: &str, now: DateTime<Utc>) {
        self.status = AppealStatus::Terminated;
        self.revoked_by = Some(by.to_string());
        self.revoked_at = Some(now);
        self.revoke_reason = Some(reason.to_string());
        self.updated_at = now;
    }

    /// Every approval has reached approved or skipped.
    pub fn all_approvals_settled(&self) -> bool {
        self.approvals
            .iter()
            .all(|a| a.status.is_settled_positively())
    }

    pub fn approval_by_name(&self, name: &str) -> Option<&Approval> {
        self.approvals.iter().find(|a| a.name == name)
    }

    /// Serialize to the value tree approver expressions resolve against,
    /// rooted at `$appeal`.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Parse an access duration like `"30m"`, `"24h"` or `"7d"`.
pub fn parse_duration(input: &str) -> Result<Duration, AppealError> {
    let input = input.trim();
    let invalid = || AppealError::InvalidDuration(input.to_string());
    if input.len() < 2 {
        return Err(invalid());
    }
    let (amount, unit) = input.split_at(input.len() - 1);
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    if amount <= 0 {
        return Err(invalid());
    }
    match unit {
        "m" => Ok(Duration::minutes(amount)),
        "h" => Ok(Duration::hours(amount)),
        "d" => Ok(Duration::days(amount)),
        _ => Err(invalid()),
    }
}
