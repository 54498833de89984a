//! Reminder sweep for leads nobody has touched in a while.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{lookback, JobError};
use crate::clock::Clock;
use crate::workflows::enquiries::domain::{Enquiry, EnquiryId, EnquiryStatus};
use crate::workflows::enquiries::repository::{EnquiryRepository, FundDirectory};
use crate::workflows::enquiries::resolver::ManagerResolver;
use crate::workflows::notifications::templates::{FundContext, NotificationPayload};
use crate::workflows::notifications::{DispatchResult, NotificationDispatcher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleLeadError {
    pub enquiry_id: EnquiryId,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StaleScanSummary {
    pub leads_processed: usize,
    /// Leads for which at least one manager was reminded.
    pub reminders_sent: usize,
    pub notifications_sent: usize,
    pub errors: Vec<StaleLeadError>,
}

pub struct StaleLeadScanner<R> {
    repository: Arc<R>,
    resolver: Arc<ManagerResolver>,
    funds: Arc<dyn FundDirectory>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
}

impl<R> StaleLeadScanner<R>
where
    R: EnquiryRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        resolver: Arc<ManagerResolver>,
        funds: Arc<dyn FundDirectory>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            resolver,
            funds,
            dispatcher,
            clock,
        }
    }

    /// Remind managers about open or contacted leads idle for more than `days_threshold`
    /// days. Only an out-of-range threshold or the candidate query can fail the scan.
    pub async fn scan(&self, days_threshold: i64) -> Result<StaleScanSummary, JobError> {
        let now = self.clock.now();
        let cutoff = lookback(now, "days_threshold", days_threshold.max(0))?;
        let candidates = self
            .repository
            .find_stale(&EnquiryStatus::active(), cutoff)?;

        let mut summary = StaleScanSummary::default();
        for enquiry in candidates {
            summary.leads_processed += 1;
            let enquiry_id = enquiry.id.clone();
            let reason = match self.remind(enquiry, now).await {
                Ok(result) => {
                    if result.sent > 0 {
                        summary.reminders_sent += 1;
                        summary.notifications_sent += result.sent;
                    }
                    if result.all_succeeded() {
                        continue;
                    }
                    format!(
                        "dispatch failed for {} of {}",
                        result.failed,
                        result.attempted()
                    )
                }
                Err(reason) => reason,
            };
            tracing::warn!(%enquiry_id, %reason, "stale lead reminder failed");
            summary.errors.push(StaleLeadError { enquiry_id, reason });
        }

        tracing::info!(
            days_threshold,
            leads = summary.leads_processed,
            reminders = summary.reminders_sent,
            errors = summary.errors.len(),
            "stale lead scan finished"
        );
        Ok(summary)
    }

    async fn remind(&self, enquiry: Enquiry, now: DateTime<Utc>) -> Result<DispatchResult, String> {
        let managers = self
            .resolver
            .resolve(&enquiry.fund_id)
            .map_err(|err| format!("lookup failed: {err}"))?;
        if managers.is_empty() {
            return Err("no active managers".to_string());
        }

        let fund = FundContext::lookup(self.funds.as_ref(), &enquiry.fund_id);
        let days_since_update = enquiry.days_since_update(now);
        Ok(self
            .dispatcher
            .send(
                &NotificationPayload::StaleReminder {
                    enquiry,
                    fund,
                    days_since_update,
                },
                &managers,
            )
            .await)
    }
}
