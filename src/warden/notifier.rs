// SPDX-License-Identifier: MIT

use crate::warden::domain::Appeal;
use async_trait::async_trait;
use log::info;

/// Lifecycle event worth telling humans about. Notification failures are
/// logged by callers and never fail the triggering operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppealEvent {
    Created,
    AwaitingApproval,
    Approved,
    Rejected,
    Canceled,
    Revoked,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: AppealEvent, appeal: &Appeal) -> Result<(), String>;
}

/// Default notifier: emits structured log lines only.
#[derive(Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, event: AppealEvent, appeal: &Appeal) -> Result<(), String> {
        info!(
            "appeal event: {:?} appeal_id={} account_id={} resource_id={} role={}",
            event, appeal.id, appeal.account_id, appeal.resource_id, appeal.role
        );
        Ok(())
    }
}
