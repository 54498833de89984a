//! Shared fakes and fixtures for workflow unit tests.

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::clock::FixedClock;
use crate::workflows::enquiries::domain::{
    AssignmentStatus, CompanyProfile, ContactDetails, Enquiry, EnquiryId, EnquiryStatus,
    EnquirySubmission, FundId, FundRecord, ManagerAssignment, ProfileId,
};
use crate::workflows::enquiries::repository::RepositoryError;
use crate::workflows::enquiries::resolver::ManagerResolver;
use crate::workflows::memory::{InMemoryDirectory, InMemoryNotificationLog};
use crate::workflows::notifications::log::{NotificationLog, NotificationLogRepository};
use crate::workflows::notifications::provider::{
    EmailProvider, OutboundEmail, ProviderError, ProviderReceipt,
};
use crate::workflows::notifications::templates::BasicTemplateRenderer;
use crate::workflows::notifications::{DispatchSettings, NotificationDispatcher};

pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap()
}

pub(crate) fn clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(now()))
}

/// Provider that records every message and fails for configured addresses.
#[derive(Default, Clone)]
pub(crate) struct RecordingProvider {
    sent: Arc<Mutex<Vec<OutboundEmail>>>,
    fail_for: Arc<HashSet<String>>,
    delay: Option<Duration>,
}

impl RecordingProvider {
    pub(crate) fn failing_for(emails: &[&str]) -> Self {
        Self {
            fail_for: Arc::new(emails.iter().map(|email| email.to_string()).collect()),
            ..Self::default()
        }
    }

    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub(crate) fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().expect("provider mutex poisoned").clone()
    }

    pub(crate) fn sent_to(&self) -> Vec<String> {
        let mut to: Vec<String> = self.sent().into_iter().map(|email| email.to).collect();
        to.sort();
        to
    }
}

#[async_trait]
impl EmailProvider for RecordingProvider {
    async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_for.contains(&email.to) {
            return Err(ProviderError::Transport("mailbox unavailable".to_string()));
        }
        let message_id = format!("msg-{}", email.to);
        self.sent
            .lock()
            .expect("provider mutex poisoned")
            .push(email);
        Ok(ProviderReceipt { message_id })
    }
}

pub(crate) struct FailingLog;

impl NotificationLogRepository for FailingLog {
    fn append(&self, _row: NotificationLog) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("log store offline".to_string()))
    }

    fn list_since(&self, _since: DateTime<Utc>) -> Result<Vec<NotificationLog>, RepositoryError> {
        Err(RepositoryError::Unavailable("log store offline".to_string()))
    }

    fn for_enquiry(&self, _id: &EnquiryId) -> Result<Vec<NotificationLog>, RepositoryError> {
        Err(RepositoryError::Unavailable("log store offline".to_string()))
    }
}

pub(crate) fn dispatcher(
    provider: RecordingProvider,
    log: Arc<dyn NotificationLogRepository>,
    clock: Arc<FixedClock>,
    settings: DispatchSettings,
) -> Arc<NotificationDispatcher> {
    Arc::new(NotificationDispatcher::new(
        Arc::new(provider),
        Arc::new(BasicTemplateRenderer),
        log,
        clock,
        settings,
    ))
}

/// Dispatcher over a recording provider and an in-memory log with default settings.
pub(crate) fn recording_dispatcher(
    clock: Arc<FixedClock>,
) -> (Arc<NotificationDispatcher>, RecordingProvider, InMemoryNotificationLog) {
    let provider = RecordingProvider::default();
    let log = InMemoryNotificationLog::default();
    let dispatcher = dispatcher(
        provider.clone(),
        Arc::new(log.clone()),
        clock,
        DispatchSettings::default(),
    );
    (dispatcher, provider, log)
}

pub(crate) fn fund_a() -> FundId {
    FundId("fund-atlas".to_string())
}

pub(crate) fn fund_b() -> FundId {
    FundId("fund-birch".to_string())
}

/// Two funds, each owned by a company with its own managers:
/// Atlas has two active managers (plus a pending one), Birch has none active.
pub(crate) fn directory() -> InMemoryDirectory {
    let directory = InMemoryDirectory::default();
    directory.insert_fund(FundRecord {
        id: fund_a(),
        name: "Atlas Income".to_string(),
        manager_name: Some("Atlas Capital".to_string()),
    });
    directory.insert_fund(FundRecord {
        id: fund_b(),
        name: "Birch Growth".to_string(),
        manager_name: Some("Birch Partners".to_string()),
    });
    directory.insert_profile(CompanyProfile {
        id: ProfileId("profile-atlas".to_string()),
        company_name: "Atlas Capital Management".to_string(),
        manager_name: None,
    });
    directory.insert_profile(CompanyProfile {
        id: ProfileId("profile-birch".to_string()),
        company_name: "Birch Partners LLP".to_string(),
        manager_name: None,
    });
    for (profile, user, email, status) in [
        ("profile-atlas", "u-1", "dana@atlas.example", AssignmentStatus::Active),
        ("profile-atlas", "u-2", "lee@atlas.example", AssignmentStatus::Active),
        ("profile-atlas", "u-3", "new@atlas.example", AssignmentStatus::Pending),
        ("profile-birch", "u-4", "old@birch.example", AssignmentStatus::Revoked),
    ] {
        directory.insert_assignment(assignment(profile, user, email, status));
    }
    directory
}

pub(crate) fn assignment(
    profile: &str,
    user_id: &str,
    email: &str,
    status: AssignmentStatus,
) -> ManagerAssignment {
    ManagerAssignment {
        profile_id: ProfileId(profile.to_string()),
        user_id: user_id.to_string(),
        email: email.to_string(),
        first_name: None,
        last_name: None,
        status,
    }
}

pub(crate) fn resolver(directory: &InMemoryDirectory) -> Arc<ManagerResolver> {
    let shared = Arc::new(directory.clone());
    Arc::new(ManagerResolver::new(shared.clone(), shared.clone(), shared))
}

pub(crate) fn submission(email: &str) -> EnquirySubmission {
    EnquirySubmission {
        fund_id: fund_a().0,
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: email.to_string(),
        phone: Some("+44 20 7946 0000".to_string()),
        investment_range: "250k-1m".to_string(),
        interest_areas: vec!["infrastructure".to_string(), "credit".to_string()],
        message: "Please send the latest factsheet.".to_string(),
    }
}

/// Stored enquiry with explicit timestamps for job fixtures.
pub(crate) fn enquiry(
    id: &str,
    fund: &FundId,
    status: EnquiryStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Enquiry {
    Enquiry {
        id: EnquiryId(id.to_string()),
        fund_id: fund.clone(),
        contact: ContactDetails {
            first_name: "Grace".to_string(),
            last_name: "Hopper".to_string(),
            email: format!("{id}@investors.example"),
            phone: None,
        },
        investment_range: "50k-250k".to_string(),
        interest_areas: BTreeSet::from(["equity".to_string()]),
        message: "Interested in the next close.".to_string(),
        status,
        created_at,
        updated_at,
    }
}
