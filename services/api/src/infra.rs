use fund_leads::clock::{Clock, SystemClock};
use fund_leads::config::{AppConfig, LeadConfig};
use fund_leads::error::AppError;
use fund_leads::workflows::enquiries::{
    EnquiryService, ManagerResolver, RateLimitPolicy, RateLimiter, Recipient,
};
use fund_leads::workflows::jobs::{StaleLeadScanner, WeeklyDigestAggregator};
use fund_leads::workflows::memory::{
    InMemoryDirectory, InMemoryEnquiryRepository, InMemoryNotificationLog, SeedData,
};
use fund_leads::workflows::notifications::{
    BasicTemplateRenderer, DispatchSettings, EmailProvider, LettreEmailProvider,
    NotificationDispatcher, NotificationQueue,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) jobs: Arc<LeadJobs>,
}

/// Scheduled sweeps plus the defaults used when a trigger omits its window.
pub(crate) struct LeadJobs {
    pub(crate) stale: StaleLeadScanner<InMemoryEnquiryRepository>,
    pub(crate) digest: WeeklyDigestAggregator<InMemoryEnquiryRepository>,
    pub(crate) stale_after_days: i64,
    pub(crate) digest_window_days: i64,
}

/// Stores and the dispatcher shared by the HTTP service and the job commands.
pub(crate) struct Runtime {
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) repository: Arc<InMemoryEnquiryRepository>,
    pub(crate) directory: Arc<InMemoryDirectory>,
    pub(crate) log: Arc<InMemoryNotificationLog>,
    pub(crate) resolver: Arc<ManagerResolver>,
    pub(crate) dispatcher: Arc<NotificationDispatcher>,
}

impl Runtime {
    pub(crate) fn build(config: &AppConfig, fixtures: Option<&Path>) -> Result<Self, AppError> {
        let provider: Arc<dyn EmailProvider> = Arc::new(LettreEmailProvider::new(&config.email)?);
        Self::with_provider(&config.leads, provider, Arc::new(SystemClock), fixtures)
    }

    pub(crate) fn with_provider(
        leads: &LeadConfig,
        provider: Arc<dyn EmailProvider>,
        clock: Arc<dyn Clock>,
        fixtures: Option<&Path>,
    ) -> Result<Self, AppError> {
        let repository = Arc::new(InMemoryEnquiryRepository::default());
        let directory = Arc::new(InMemoryDirectory::default());
        if let Some(path) = fixtures {
            load_fixtures(path)?.apply(&repository, &directory);
        }

        let log = Arc::new(InMemoryNotificationLog::default());
        let resolver = Arc::new(ManagerResolver::new(
            directory.clone(),
            directory.clone(),
            directory.clone(),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            provider,
            Arc::new(BasicTemplateRenderer),
            log.clone(),
            clock.clone(),
            DispatchSettings::from(leads),
        ));

        Ok(Self {
            clock,
            repository,
            directory,
            log,
            resolver,
            dispatcher,
        })
    }

    pub(crate) fn enquiry_service(
        &self,
        leads: &LeadConfig,
        queue: NotificationQueue,
    ) -> Result<EnquiryService<InMemoryEnquiryRepository>, AppError> {
        let policy = RateLimitPolicy::try_from(leads)?;
        Ok(EnquiryService::new(
            self.repository.clone(),
            self.resolver.clone(),
            self.directory.clone(),
            RateLimiter::in_memory(self.clock.clone(), policy),
            queue,
            self.clock.clone(),
            Recipient::from_email(&leads.admin_email),
        ))
    }

    pub(crate) fn jobs(&self, leads: &LeadConfig) -> LeadJobs {
        LeadJobs {
            stale: StaleLeadScanner::new(
                self.repository.clone(),
                self.resolver.clone(),
                self.directory.clone(),
                self.dispatcher.clone(),
                self.clock.clone(),
            ),
            digest: WeeklyDigestAggregator::new(
                self.repository.clone(),
                self.directory.clone(),
                self.log.clone(),
                self.dispatcher.clone(),
                self.clock.clone(),
                Recipient::from_email(&leads.digest_recipient),
            ),
            stale_after_days: leads.stale_after_days,
            digest_window_days: leads.digest_window_days,
        }
    }
}

pub(crate) fn load_fixtures(path: &Path) -> Result<SeedData, AppError> {
    let raw = std::fs::read_to_string(path)?;
    let seed = serde_json::from_str(&raw)?;
    Ok(seed)
}
