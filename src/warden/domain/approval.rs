// SPDX-License-Identifier: MIT

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Decision state of one policy step for a given appeal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Skipped,
}

impl ApprovalStatus {
    /// Settled approvals let the chain continue past them.
    pub fn is_settled_positively(&self) -> bool {
        matches!(self, Self::Approved | Self::Skipped)
    }
}

/// The decision record for one step of an appeal's pinned policy.
///
/// `index` mirrors the step's position in `Policy.steps` at creation time;
/// the pairing is permanent.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Approval {
    pub id: String,
    /// Mirrors the originating step name
    pub name: String,
    pub index: usize,
    pub appeal_id: String,
    pub status: ApprovalStatus,
    /// Identity that made the decision; unset until decided
    pub actor: Option<String>,
    /// Resolved identities allowed to decide this step; empty for
    /// automatic steps
    #[serde(default)]
    pub approvers: Vec<String>,
    pub policy_id: String,
    pub policy_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Approval {
    /// A step is manual iff it has resolved approvers; manual steps are
    /// never auto-decided by conditions.
    pub fn is_manual(&self) -> bool {
        !self.approvers.is_empty()
    }

    pub fn approve(&mut self, now: DateTime<Utc>) {
        self.status = ApprovalStatus::Approved;
        self.updated_at = now;
    }

    pub fn reject(&mut self, now: DateTime<Utc>) {
        self.status = ApprovalStatus::Rejected;
        self.updated_at = now;
    }

    pub fn skip(&mut self, now: DateTime<Utc>) {
        self.status = ApprovalStatus::Skipped;
        self.updated_at = now;
    }
}
