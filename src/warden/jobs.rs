// SPDX-License-Identifier: MIT

//! Scheduled jobs
//!
//! The expiration sweep revokes active appeals whose access window has
//! passed. It is idempotent and does no retries of its own; the next
//! scheduled run picks up whatever failed.

use crate::warden::appeal::AppealService;
use crate::warden::clock::Clock;
use crate::warden::domain::{AppealStatus, SYSTEM_ACTOR};
use crate::warden::errors::AppealError;
use crate::warden::store::AppealFilter;
use log::{error, info};
use serde::Serialize;
use std::sync::Arc;

const EXPIRATION_REASON: &str = "access duration expired";

/// Outcome of one sweep run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

/// Revoke every active appeal whose expiration date is in the past.
///
/// Appeals are processed independently; one failure is logged and never
/// aborts the rest of the batch.
pub async fn revoke_expired_appeals(
    service: &AppealService,
    clock: &Arc<dyn Clock>,
) -> Result<SweepSummary, AppealError> {
    let expired = service
        .find(&AppealFilter {
            statuses: vec![AppealStatus::Active],
            expiration_before: Some(clock.now()),
            ..Default::default()
        })
        .await?;

    let mut summary = SweepSummary::default();
    for appeal in expired {
        match service
            .revoke(&appeal.id, SYSTEM_ACTOR, EXPIRATION_REASON)
            .await
        {
            Ok(_) => summary.succeeded.push(appeal.id),
            Err(e) => {
                error!("expiration sweep failed to revoke appeal {}: {e}", appeal.id);
                summary.failed.push(appeal.id);
            }
        }
    }
    info!(
        "expiration sweep done: {} revoked, {} failed",
        summary.succeeded.len(),
        summary.failed.len()
    );
    Ok(summary)
}
