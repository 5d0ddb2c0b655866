// SPDX-License-Identifier: MIT

//! Error taxonomy for the appeal engine
//!
//! Errors fall into kinds the transport layer maps onto responses:
//! validation and status errors are the caller's mistake, authorization
//! errors are distinguishable so they can map to forbidden, not-found is
//! its own kind, configuration errors mean the policy itself is broken,
//! and downstream errors are the only retryable category.

use crate::engine::expr::EvalError;
use thiserror::Error;

/// How an error should be classified by callers and transports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Status,
    Authorization,
    NotFound,
    Configuration,
    Downstream,
}

/// Errors raised by policy definitions and their evaluation.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("invalid condition field: {0}")]
    InvalidConditionField(String),

    #[error("condition field not found on resource: {0}")]
    ConditionFieldNotFound(String),

    #[error("policy id is required")]
    EmptyId,

    #[error("policy must define at least one step")]
    EmptySteps,

    #[error("duplicate step name: {0}")]
    DuplicateStepName(String),

    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    #[error("dependency cycle detected: {0:?}")]
    DependencyCycle(Vec<String>),

    #[error("step '{0}' must define conditions or approvers")]
    StepWithoutRule(String),

    #[error("policy not found: {id} version {version}")]
    NotFound { id: String, version: u32 },

    #[error("invalid policy file: {0}")]
    InvalidFile(String),
}

/// Errors raised by provider capability implementations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("access already granted")]
    AlreadyGranted,

    #[error("grant not found at provider")]
    GrantNotFound,

    #[error("provider '{provider}' request failed: {message}")]
    Request { provider: String, message: String },

    #[error("invalid provider config: {0}")]
    InvalidConfig(String),
}

impl ProviderError {
    pub fn request(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            provider: provider.into(),
            message: message.into(),
        }
    }
}

/// Top-level error type for appeal operations.
#[derive(Debug, Error)]
pub enum AppealError {
    // --- validation ---
    #[error("invalid action value")]
    ActionInvalidValue,

    #[error("an appeal for the same account, resource and role is already pending")]
    AppealDuplicate,

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("creating an appeal for another individual user is not allowed")]
    CannotCreateForOtherUser,

    #[error("invalid approver type, expected an email string or a list of strings")]
    ApproverInvalidType,

    // --- status ---
    #[error("appeal already canceled")]
    AppealStatusCanceled,

    #[error("appeal already approved")]
    AppealStatusApproved,

    #[error("appeal already rejected")]
    AppealStatusRejected,

    #[error("appeal already terminated")]
    AppealStatusTerminated,

    #[error("appeal is still pending")]
    AppealStatusPending,

    #[error("approval already approved")]
    ApprovalStatusApproved,

    #[error("approval already rejected")]
    ApprovalStatusRejected,

    #[error("approval already skipped")]
    ApprovalStatusSkipped,

    #[error("approval dependency is pending")]
    ApprovalDependencyIsPending,

    // --- authorization ---
    #[error("action forbidden: actor is not an authorized approver")]
    ActionForbidden,

    #[error("revoke forbidden: actor is not allowed to revoke this appeal")]
    RevokeForbidden,

    // --- not found ---
    #[error("appeal not found: {0}")]
    AppealNotFound(String),

    #[error("approval name not found: {0}")]
    ApprovalNameNotFound(String),

    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    #[error("resource is deleted: {0}")]
    ResourceIsDeleted(String),

    #[error("no policy binding for resource type '{0}'")]
    PolicyBindingNotFound(String),

    // --- configuration ---
    #[error("unable to resolve approval step dependency: {0}")]
    DependencyStepNotFound(String),

    #[error("unable to resolve designated condition for step '{0}'")]
    ConditionNotFound(String),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    // --- downstream ---
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("identity error: {0}")]
    Identity(String),

    #[error("store error: {0}")]
    Store(String),
}

impl AppealError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ActionInvalidValue
            | Self::AppealDuplicate
            | Self::InvalidDuration(_)
            | Self::CannotCreateForOtherUser
            | Self::ApproverInvalidType => ErrorKind::Validation,

            Self::AppealStatusCanceled
            | Self::AppealStatusApproved
            | Self::AppealStatusRejected
            | Self::AppealStatusTerminated
            | Self::AppealStatusPending
            | Self::ApprovalStatusApproved
            | Self::ApprovalStatusRejected
            | Self::ApprovalStatusSkipped
            | Self::ApprovalDependencyIsPending => ErrorKind::Status,

            Self::ActionForbidden | Self::RevokeForbidden => ErrorKind::Authorization,

            Self::AppealNotFound(_)
            | Self::ApprovalNameNotFound(_)
            | Self::ResourceNotFound(_)
            | Self::ResourceIsDeleted(_)
            | Self::PolicyBindingNotFound(_) => ErrorKind::NotFound,

            Self::DependencyStepNotFound(_)
            | Self::ConditionNotFound(_)
            | Self::Eval(_) => ErrorKind::Configuration,

            Self::Policy(PolicyError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Policy(_) => ErrorKind::Configuration,

            Self::Provider(_) | Self::Identity(_) | Self::Store(_) => ErrorKind::Downstream,
        }
    }
}
