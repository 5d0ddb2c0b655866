// SPDX-License-Identifier: MIT

//! Domain entities: policies, appeals, approvals, resources

pub mod appeal;
pub mod approval;
pub mod policy;
pub mod resource;

pub use appeal::{parse_duration, Appeal, AppealAction, AppealOptions, AppealStatus, ApprovalAction};
pub use approval::{Approval, ApprovalStatus};
pub use policy::{Condition, MatchCondition, Policy, Step};
pub use resource::Resource;

/// Actor identity used by scheduled jobs.
pub const SYSTEM_ACTOR: &str = "system";

/// Account type for individual users; appeals of this type can only be
/// created by the account owner.
pub const DEFAULT_ACCOUNT_TYPE: &str = "user";
