use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::clock::{Clock, FixedClock};
use crate::config::LeadConfig;
use crate::workflows::enquiries::domain::{Enquiry, EnquiryId, EnquiryStatus, Recipient};
use crate::workflows::enquiries::rate_limit::{RateLimitPolicy, RateLimiter};
use crate::workflows::enquiries::repository::{EnquiryRepository, RepositoryError};
use crate::workflows::enquiries::service::EnquiryService;
use crate::workflows::memory::{InMemoryDirectory, InMemoryEnquiryRepository, InMemoryNotificationLog};
use crate::workflows::notifications::{DispatchSettings, NotificationWorker, WorkerStats};
use crate::workflows::testing::*;

pub(super) const ADMIN: &str = "leads-admin@fundleads.local";

pub(super) struct Harness<R> {
    pub(super) service: Arc<EnquiryService<R>>,
    pub(super) repository: Arc<R>,
    pub(super) directory: InMemoryDirectory,
    pub(super) provider: RecordingProvider,
    pub(super) log: InMemoryNotificationLog,
    pub(super) clock: Arc<FixedClock>,
    worker: NotificationWorker,
}

impl<R> Harness<R>
where
    R: EnquiryRepository + 'static,
{
    /// Drop the service so the queue closes, then wait for queued notifications.
    pub(super) async fn settle(self) -> Settled<R> {
        let Harness {
            service,
            repository,
            provider,
            log,
            worker,
            ..
        } = self;
        drop(service);
        let stats = worker.shutdown().await;
        Settled {
            repository,
            provider,
            log,
            stats,
        }
    }
}

pub(super) struct Settled<R> {
    pub(super) repository: Arc<R>,
    pub(super) provider: RecordingProvider,
    pub(super) log: InMemoryNotificationLog,
    pub(super) stats: WorkerStats,
}

pub(super) fn policy() -> RateLimitPolicy {
    RateLimitPolicy::try_from(&LeadConfig::default()).expect("default window fits")
}

pub(super) fn build_service_with<R>(repository: Arc<R>) -> Harness<R>
where
    R: EnquiryRepository + 'static,
{
    build_harness(repository, RecordingProvider::default(), 16)
}

/// Harness over a caller-supplied provider and notification queue capacity.
pub(super) fn build_harness<R>(
    repository: Arc<R>,
    provider: RecordingProvider,
    queue_capacity: usize,
) -> Harness<R>
where
    R: EnquiryRepository + 'static,
{
    let clock = clock();
    let directory = directory();
    let log = InMemoryNotificationLog::default();
    let dispatcher = dispatcher(
        provider.clone(),
        Arc::new(log.clone()),
        clock.clone(),
        DispatchSettings::default(),
    );
    let (queue, worker) = NotificationWorker::spawn(dispatcher, queue_capacity);
    let service = EnquiryService::new(
        repository.clone(),
        resolver(&directory),
        Arc::new(directory.clone()),
        RateLimiter::in_memory(clock.clone(), policy()),
        queue,
        clock.clone(),
        Recipient::from_email(ADMIN),
    );

    Harness {
        service: Arc::new(service),
        repository,
        directory,
        provider,
        log,
        clock,
        worker,
    }
}

pub(super) fn build_service() -> Harness<InMemoryEnquiryRepository> {
    build_service_with(Arc::new(InMemoryEnquiryRepository::default()))
}

/// Seed an enquiry created two days before the harness clock.
pub(super) fn stored(
    harness: &Harness<InMemoryEnquiryRepository>,
    status: EnquiryStatus,
) -> Enquiry {
    let created = harness.clock.now() - Duration::days(2);
    let record = enquiry("enq-fixture", &fund_a(), status, created, created);
    harness.repository.seed(record.clone());
    record
}

pub(super) struct UnavailableRepository;

impl EnquiryRepository for UnavailableRepository {
    fn create(&self, _enquiry: Enquiry) -> Result<Enquiry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &EnquiryId) -> Result<Option<Enquiry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update_status(
        &self,
        _id: &EnquiryId,
        _expected: EnquiryStatus,
        _next: EnquiryStatus,
        _at: DateTime<Utc>,
    ) -> Result<Enquiry, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn count_by_email_since(
        &self,
        _email: &str,
        _since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_stale(
        &self,
        _statuses: &[EnquiryStatus],
        _before: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_created_between(
        &self,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// Wraps the in-memory store and lets a competing writer move the enquiry to
/// `competing` just before the first status update lands.
pub(super) struct RacingRepository {
    pub(super) inner: InMemoryEnquiryRepository,
    competing: std::sync::Mutex<Option<EnquiryStatus>>,
}

impl RacingRepository {
    pub(super) fn new(inner: InMemoryEnquiryRepository, competing: EnquiryStatus) -> Self {
        Self {
            inner,
            competing: std::sync::Mutex::new(Some(competing)),
        }
    }
}

impl EnquiryRepository for RacingRepository {
    fn create(&self, enquiry: Enquiry) -> Result<Enquiry, RepositoryError> {
        self.inner.create(enquiry)
    }

    fn fetch(&self, id: &EnquiryId) -> Result<Option<Enquiry>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn update_status(
        &self,
        id: &EnquiryId,
        expected: EnquiryStatus,
        next: EnquiryStatus,
        at: DateTime<Utc>,
    ) -> Result<Enquiry, RepositoryError> {
        let competing = self.competing.lock().expect("race mutex poisoned").take();
        if let Some(status) = competing {
            self.inner.update_status(id, expected, status, at)?;
        }
        self.inner.update_status(id, expected, next, at)
    }

    fn count_by_email_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        self.inner.count_by_email_since(email, since)
    }

    fn find_stale(
        &self,
        statuses: &[EnquiryStatus],
        before: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>, RepositoryError> {
        self.inner.find_stale(statuses, before)
    }

    fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>, RepositoryError> {
        self.inner.find_created_between(start, end)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
