//! Weekly per-fund lead metrics and the digest notification built from them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{lookback, JobError};
use crate::clock::Clock;
use crate::workflows::enquiries::domain::{Enquiry, EnquiryStatus, FundId, Recipient};
use crate::workflows::enquiries::repository::{EnquiryRepository, FundDirectory, RepositoryError};
use crate::workflows::notifications::log::NotificationLogRepository;
use crate::workflows::notifications::templates::{EmailType, NotificationPayload};
use crate::workflows::notifications::{DispatchResult, NotificationDispatcher};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DigestTotals {
    pub new_leads: usize,
    pub open_leads: usize,
    pub contacted_leads: usize,
    pub won_leads: usize,
    pub closed_lost_leads: usize,
    pub conversion_rate: f64,
}

impl DigestTotals {
    fn record(&mut self, status: EnquiryStatus) {
        self.new_leads += 1;
        match status {
            EnquiryStatus::Open => self.open_leads += 1,
            EnquiryStatus::Contacted => self.contacted_leads += 1,
            EnquiryStatus::Won => self.won_leads += 1,
            EnquiryStatus::ClosedLost => self.closed_lost_leads += 1,
        }
        self.conversion_rate = conversion_rate(self.won_leads, self.closed_lost_leads);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FundDigest {
    pub fund_id: FundId,
    pub fund_name: String,
    pub new_leads: usize,
    pub open_leads: usize,
    pub contacted_leads: usize,
    pub won_leads: usize,
    pub closed_lost_leads: usize,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DigestReport {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Funds with at least one enquiry in the window, busiest first.
    pub funds: Vec<FundDigest>,
    pub totals: DigestTotals,
    /// Distinct status-change notifications dispatched inside the window.
    pub status_changes: usize,
}

impl DigestReport {
    /// Group `enquiries` by fund. `fund_name` supplies display names; funds it cannot
    /// name fall back to their id.
    pub fn build(
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        enquiries: &[Enquiry],
        status_changes: usize,
        mut fund_name: impl FnMut(&FundId) -> Option<String>,
    ) -> Self {
        let mut totals = DigestTotals::default();
        let mut per_fund: BTreeMap<&FundId, DigestTotals> = BTreeMap::new();

        for enquiry in enquiries {
            totals.record(enquiry.status);
            per_fund
                .entry(&enquiry.fund_id)
                .or_default()
                .record(enquiry.status);
        }

        let mut funds: Vec<FundDigest> = per_fund
            .into_iter()
            .map(|(fund_id, counts)| FundDigest {
                fund_name: fund_name(fund_id).unwrap_or_else(|| fund_id.0.clone()),
                fund_id: fund_id.clone(),
                new_leads: counts.new_leads,
                open_leads: counts.open_leads,
                contacted_leads: counts.contacted_leads,
                won_leads: counts.won_leads,
                closed_lost_leads: counts.closed_lost_leads,
                conversion_rate: counts.conversion_rate,
            })
            .collect();
        funds.sort_by(|left, right| {
            right
                .new_leads
                .cmp(&left.new_leads)
                .then_with(|| left.fund_name.cmp(&right.fund_name))
        });

        Self {
            window_start,
            window_end,
            funds,
            totals,
            status_changes,
        }
    }
}

/// `won / (won + closed_lost)`, or zero when nothing has resolved.
pub fn conversion_rate(won: usize, closed_lost: usize) -> f64 {
    let resolved = won + closed_lost;
    if resolved == 0 {
        0.0
    } else {
        won as f64 / resolved as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DigestSummary {
    pub report: DigestReport,
    pub dispatch: DispatchResult,
}

pub struct WeeklyDigestAggregator<R> {
    repository: Arc<R>,
    funds: Arc<dyn FundDirectory>,
    log: Arc<dyn NotificationLogRepository>,
    dispatcher: Arc<NotificationDispatcher>,
    clock: Arc<dyn Clock>,
    recipient: Recipient,
}

impl<R> WeeklyDigestAggregator<R>
where
    R: EnquiryRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        funds: Arc<dyn FundDirectory>,
        log: Arc<dyn NotificationLogRepository>,
        dispatcher: Arc<NotificationDispatcher>,
        clock: Arc<dyn Clock>,
        recipient: Recipient,
    ) -> Self {
        Self {
            repository,
            funds,
            log,
            dispatcher,
            clock,
            recipient,
        }
    }

    /// Aggregate the trailing `window_days` (minimum one) and mail the digest.
    pub async fn run(&self, window_days: i64) -> Result<DigestSummary, JobError> {
        let window_end = self.clock.now();
        let window_start = lookback(window_end, "window_days", window_days.max(1))?;

        let enquiries = self
            .repository
            .find_created_between(window_start, window_end)?;
        let status_changes = self.count_status_changes(window_start, window_end)?;

        let report = DigestReport::build(
            window_start,
            window_end,
            &enquiries,
            status_changes,
            |fund_id| match self.funds.fund(fund_id) {
                Ok(record) => record.map(|fund| fund.name),
                Err(err) => {
                    tracing::warn!(%fund_id, error = %err, "fund lookup failed; using id");
                    None
                }
            },
        );

        tracing::info!(
            window_days,
            funds = report.funds.len(),
            new_leads = report.totals.new_leads,
            status_changes,
            "weekly digest aggregated"
        );

        let dispatch = self
            .dispatcher
            .send(
                &NotificationPayload::WeeklyDigest {
                    report: report.clone(),
                },
                std::slice::from_ref(&self.recipient),
            )
            .await;

        Ok(DigestSummary { report, dispatch })
    }

    fn count_status_changes(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let dispatches: BTreeSet<_> = self
            .log
            .list_since(start)?
            .into_iter()
            .filter(|row| row.email_type == EmailType::StatusChange && row.sent_at < end)
            .map(|row| row.dispatch_id)
            .collect();
        Ok(dispatches.len())
    }
}
