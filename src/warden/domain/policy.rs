// SPDX-License-Identifier: MIT

//! Approval policy model
//!
//! A policy is an immutable, versioned ordered list of steps. Each step is
//! either automatic (condition-driven) or manual (approver-driven); steps
//! may depend on earlier steps by name.

use crate::engine::expr::values_equal;
use crate::engine::lookup;
use crate::warden::errors::PolicyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Prefix condition fields must carry; conditions only see the resource
/// attribute tree.
pub const RESOURCE_NAMESPACE: &str = "$resource";

/// Expected value for a condition, compared by structural equality after
/// JSON normalization.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MatchCondition {
    pub eq: Value,
}

/// A single requirement evaluated against the appeal's resource.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Condition {
    /// Attribute path into the resource namespace,
    /// e.g. `$resource.details.is_pii`
    pub field: String,
    #[serde(rename = "match")]
    pub matcher: MatchCondition,
}

impl Condition {
    /// Evaluate against a resource value tree.
    ///
    /// The field must reference the resource namespace; anything else is a
    /// policy configuration error, not a falsy result.
    pub fn is_match(&self, resource: &Value) -> Result<bool, PolicyError> {
        let prefix = format!("{}.", RESOURCE_NAMESPACE);
        let Some(path) = self.field.strip_prefix(&prefix) else {
            return Err(PolicyError::InvalidConditionField(self.field.clone()));
        };
        let actual = lookup::lookup(resource, path)
            .map_err(|_| PolicyError::ConditionFieldNotFound(self.field.clone()))?;
        Ok(values_equal(&actual, &self.matcher.eq))
    }
}

/// An individual gate within an approval chain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Step {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Automatic steps: requirements on the resource
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// When a condition fails, skip the step instead of rejecting the appeal
    #[serde(default)]
    pub allow_failed: bool,
    /// Names of steps that must settle before this one; a skipped
    /// dependency skips this step too
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Manual steps: email literals or `$`-expressions resolved at appeal
    /// creation, e.g. `$appeal.resource.details.owner`
    #[serde(default)]
    pub approvers: Vec<String>,
}

/// An immutable policy snapshot. `(id, version)` is the primary key; edits
/// always create version `latest + 1`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Policy {
    pub id: String,
    pub version: u32,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Policy {
    pub fn step_index(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.name == name)
    }

    /// Structural validation: non-empty id and steps, unique step names,
    /// dependencies reference existing steps without cycles, and every
    /// step carries either conditions or approvers.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.id.is_empty() {
            return Err(PolicyError::EmptyId);
        }
        if self.steps.is_empty() {
            return Err(PolicyError::EmptySteps);
        }

        let mut names = HashSet::new();
        for step in &self.steps {
            if !names.insert(step.name.as_str()) {
                return Err(PolicyError::DuplicateStepName(step.name.clone()));
            }
            if step.conditions.is_empty() && step.approvers.is_empty() {
                return Err(PolicyError::StepWithoutRule(step.name.clone()));
            }
        }

        let by_name: HashMap<&str, &Step> =
            self.steps.iter().map(|s| (s.name.as_str(), s)).collect();
        for step in &self.steps {
            for dep in &step.dependencies {
                if !by_name.contains_key(dep.as_str()) {
                    return Err(PolicyError::UnknownDependency {
                        step: step.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        self.check_cycles(&by_name)?;
        Ok(())
    }

    fn check_cycles(&self, by_name: &HashMap<&str, &Step>) -> Result<(), PolicyError> {
        let mut visited: HashSet<&str> = HashSet::new();
        for step in &self.steps {
            if visited.contains(step.name.as_str()) {
                continue;
            }
            let mut trail: Vec<&str> = Vec::new();
            visit(step.name.as_str(), by_name, &mut visited, &mut trail)?;
        }
        return Ok(());

        fn visit<'a>(
            name: &'a str,
            by_name: &HashMap<&'a str, &'a Step>,
            visited: &mut HashSet<&'a str>,
            trail: &mut Vec<&'a str>,
        ) -> Result<(), PolicyError> {
            if trail.contains(&name) {
                let mut cycle: Vec<String> = trail.iter().map(|s| s.to_string()).collect();
                cycle.push(name.to_string());
                return Err(PolicyError::DependencyCycle(cycle));
            }
            if visited.contains(name) {
                return Ok(());
            }
            trail.push(name);
            if let Some(step) = by_name.get(name) {
                for dep in &step.dependencies {
                    visit(dep.as_str(), by_name, visited, trail)?;
                }
            }
            trail.pop();
            visited.insert(name);
            Ok(())
        }
    }
}
