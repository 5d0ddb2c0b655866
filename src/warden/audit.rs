// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use log::info;
use serde_json::Value;

/// Records who did what to which appeal. Audit failures are logged by
/// callers and never fail the audited operation.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(&self, action: &str, actor: &str, data: Value) -> Result<(), String>;
}

/// Default audit sink: structured log lines.
#[derive(Clone, Copy, Default)]
pub struct LogAudit;

#[async_trait]
impl AuditLogger for LogAudit {
    async fn record(&self, action: &str, actor: &str, data: Value) -> Result<(), String> {
        info!("audit: action={action} actor={actor} data={data}");
        Ok(())
    }
}
