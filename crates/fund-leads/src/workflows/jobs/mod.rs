//! Scheduled sweeps triggered by an external cron: stale-lead reminders and the weekly
//! digest. Both call the dispatcher directly and report what they did.

use chrono::{DateTime, Duration, Utc};

use crate::workflows::enquiries::repository::RepositoryError;

pub mod digest;
pub mod stale;


pub use digest::{
    conversion_rate, DigestReport, DigestSummary, DigestTotals, FundDigest,
    WeeklyDigestAggregator,
};
pub use stale::{StaleLeadError, StaleLeadScanner, StaleScanSummary};

/// Longest lookback either job accepts.
pub const MAX_WINDOW_DAYS: i64 = 3650;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("{field} must be at most {max} days, got {days}", max = MAX_WINDOW_DAYS)]
    InvalidWindow { field: &'static str, days: i64 },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// `now - days`, rejecting lookbacks longer than [`MAX_WINDOW_DAYS`].
pub(crate) fn lookback(
    now: DateTime<Utc>,
    field: &'static str,
    days: i64,
) -> Result<DateTime<Utc>, JobError> {
    let invalid = || JobError::InvalidWindow { field, days };
    if days > MAX_WINDOW_DAYS {
        return Err(invalid());
    }
    Duration::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .ok_or_else(invalid)
}
