// SPDX-License-Identifier: MIT

//! Approval advancement
//!
//! Walks an appeal's approvals strictly in step order and settles as many
//! automatic steps as the current state allows. Approvals are decided in
//! sequence: the walk stops at the first step it cannot settle, so a later
//! step is never auto-approved while an earlier gate is outstanding.
//! Re-running after any single approval change is idempotent; it re-walks
//! from the start and pushes the frontier forward.
//!
//! Mutates the appeal in place and never persists; persistence is the
//! caller's responsibility.

use crate::warden::domain::{Appeal, ApprovalStatus, Policy};
use crate::warden::errors::AppealError;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// What the walk decided about one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepOutcome {
    /// Approved or skipped; the walk continues to the next index
    Settled,
    /// Awaiting a human action or left pending behind a fresh skip; the
    /// walk stops here
    Blocked,
}

pub fn advance(
    policy: &Policy,
    appeal: &mut Appeal,
    now: DateTime<Utc>,
) -> Result<(), AppealError> {
    let resource = appeal
        .resource
        .as_ref()
        .map(|r| r.to_value())
        .unwrap_or(Value::Null);

    for i in 0..appeal.approvals.len() {
        let outcome = advance_step(policy, appeal, i, &resource, now)?;
        match outcome {
            StepOutcome::Settled => continue,
            StepOutcome::Blocked => break,
        }
    }
    Ok(())
}

fn advance_step(
    policy: &Policy,
    appeal: &mut Appeal,
    index: usize,
    resource: &Value,
    now: DateTime<Utc>,
) -> Result<StepOutcome, AppealError> {
    match appeal.approvals[index].status {
        // A rejection is terminal for the whole chain
        ApprovalStatus::Rejected => return Ok(StepOutcome::Blocked),
        ApprovalStatus::Approved | ApprovalStatus::Skipped => return Ok(StepOutcome::Settled),
        ApprovalStatus::Pending => {}
    }

    if appeal.approvals[index].is_manual() {
        return Ok(StepOutcome::Blocked);
    }

    let step_name = appeal.approvals[index].name.clone();
    let step = policy
        .steps
        .iter()
        .find(|s| s.name == step_name)
        .ok_or_else(|| AppealError::DependencyStepNotFound(step_name.clone()))?;

    // A skipped dependency skips this step too, without evaluating its
    // conditions. Later steps are left untouched until the next pass.
    for dep in &step.dependencies {
        let dep_approval = appeal
            .approval_by_name(dep)
            .ok_or_else(|| AppealError::DependencyStepNotFound(dep.clone()))?;
        if dep_approval.status == ApprovalStatus::Skipped {
            appeal.approvals[index].skip(now);
            return Ok(StepOutcome::Blocked);
        }
    }

    if step.conditions.is_empty() {
        return Err(AppealError::ConditionNotFound(step_name));
    }

    // Conditions are evaluated in order and each outcome overwrites the
    // previous one; only the last condition decides the step.
    let mut passed = false;
    for condition in &step.conditions {
        passed = condition.is_match(resource)?;
    }

    if passed {
        appeal.approvals[index].approve(now);
        Ok(StepOutcome::Settled)
    } else if step.allow_failed {
        appeal.approvals[index].skip(now);
        Ok(StepOutcome::Settled)
    } else {
        appeal.approvals[index].reject(now);
        appeal.reject(now);
        Ok(StepOutcome::Blocked)
    }
}
