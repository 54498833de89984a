//! End-to-end lead lifecycle through the public API: intake over HTTP, manager fan-out,
//! a status change, the stale-lead sweep and the weekly digest.

mod common {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    use fund_leads::clock::FixedClock;
    use fund_leads::config::LeadConfig;
    use fund_leads::workflows::enquiries::{
        AssignmentStatus, CompanyProfile, FundId, FundRecord, ManagerAssignment, ManagerResolver,
        ProfileId,
    };
    use fund_leads::workflows::memory::{
        InMemoryDirectory, InMemoryEnquiryRepository, InMemoryNotificationLog,
    };
    use fund_leads::workflows::notifications::{
        BasicTemplateRenderer, DispatchSettings, EmailProvider, NotificationDispatcher,
        OutboundEmail, ProviderError, ProviderReceipt,
    };

    pub(super) const MANAGER: &str = "pm@harbor.example";
    pub(super) const INVESTOR: &str = "ada@investors.example";

    pub(super) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
    }

    #[derive(Default, Clone)]
    pub(super) struct Outbox {
        sent: Arc<Mutex<Vec<String>>>,
    }

    impl Outbox {
        pub(super) fn recipients(&self) -> Vec<String> {
            self.sent.lock().expect("outbox mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl EmailProvider for Outbox {
        async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError> {
            let mut sent = self.sent.lock().expect("outbox mutex poisoned");
            sent.push(email.to.clone());
            Ok(ProviderReceipt {
                message_id: format!("msg-{}", sent.len()),
            })
        }
    }

    pub(super) struct World {
        pub(super) config: LeadConfig,
        pub(super) clock: Arc<FixedClock>,
        pub(super) repository: Arc<InMemoryEnquiryRepository>,
        pub(super) directory: Arc<InMemoryDirectory>,
        pub(super) log: Arc<InMemoryNotificationLog>,
        pub(super) resolver: Arc<ManagerResolver>,
        pub(super) dispatcher: Arc<NotificationDispatcher>,
        pub(super) outbox: Outbox,
    }

    pub(super) fn fund_id() -> FundId {
        FundId("fund-harbor".to_string())
    }

    pub(super) fn world() -> World {
        let config = LeadConfig::default();
        let clock = Arc::new(FixedClock::new(start()));
        let repository = Arc::new(InMemoryEnquiryRepository::default());
        let directory = Arc::new(InMemoryDirectory::default());
        directory.insert_fund(FundRecord {
            id: fund_id(),
            name: "Harbor Credit".to_string(),
            manager_name: Some("Harbor".to_string()),
        });
        directory.insert_profile(CompanyProfile {
            id: ProfileId("profile-harbor".to_string()),
            company_name: "Harbor Asset Management".to_string(),
            manager_name: None,
        });
        directory.insert_assignment(ManagerAssignment {
            profile_id: ProfileId("profile-harbor".to_string()),
            user_id: "user-pm".to_string(),
            email: MANAGER.to_string(),
            first_name: Some("Pat".to_string()),
            last_name: Some("Moss".to_string()),
            status: AssignmentStatus::Active,
        });

        let log = Arc::new(InMemoryNotificationLog::default());
        let resolver = Arc::new(ManagerResolver::new(
            directory.clone(),
            directory.clone(),
            directory.clone(),
        ));
        let outbox = Outbox::default();
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(outbox.clone()),
            Arc::new(BasicTemplateRenderer),
            log.clone(),
            clock.clone(),
            DispatchSettings::from(&config),
        ));

        World {
            config,
            clock,
            repository,
            directory,
            log,
            resolver,
            dispatcher,
            outbox,
        }
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use chrono::Duration;
use serde_json::{json, Value};
use tower::ServiceExt;

use fund_leads::workflows::enquiries::{
    enquiry_router, EnquiryId, EnquiryService, EnquiryStatus, RateLimitPolicy, RateLimiter,
    Recipient,
};
use fund_leads::workflows::jobs::{StaleLeadScanner, WeeklyDigestAggregator};
use fund_leads::workflows::notifications::{EmailType, NotificationWorker};

use common::*;

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

#[tokio::test]
async fn lead_flows_from_intake_to_weekly_digest() {
    let world = world();
    let (queue, worker) = NotificationWorker::spawn(world.dispatcher.clone(), 16);
    let service = Arc::new(EnquiryService::new(
        world.repository.clone(),
        world.resolver.clone(),
        world.directory.clone(),
        RateLimiter::in_memory(
            world.clock.clone(),
            RateLimitPolicy::try_from(&world.config).expect("valid policy"),
        ),
        queue,
        world.clock.clone(),
        Recipient::from_email(&world.config.admin_email),
    ));
    let router = enquiry_router(service);

    let response = router
        .clone()
        .oneshot(post(
            "/api/v1/enquiries",
            json!({
                "fund_id": "fund-harbor",
                "first_name": "Ada",
                "last_name": "Lovelace",
                "email": INVESTOR,
                "investment_range": "250k-1m",
                "interest_areas": ["private credit"],
                "message": "Is the fund open to new commitments?"
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json(response).await;
    assert_eq!(payload["status"], json!("open"));
    let enquiry_id = payload["enquiry_id"]
        .as_str()
        .expect("enquiry id")
        .to_string();

    let response = router
        .clone()
        .oneshot(post(
            "/api/v1/enquiries/status",
            json!({
                "enquiry_id": enquiry_id,
                "new_status": "contacted",
                "actor": "pm@harbor.example"
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_json(response).await["changed"], json!(true));

    drop(router);
    let stats = worker.shutdown().await;
    assert_eq!(stats.jobs, 3);
    assert_eq!(stats.failed, 0);

    let mut delivered = world.outbox.recipients();
    delivered.sort();
    assert_eq!(
        delivered,
        vec![
            INVESTOR.to_string(),
            world.config.admin_email.clone(),
            MANAGER.to_string(),
        ]
    );

    world.clock.advance(Duration::days(8));

    let scanner = StaleLeadScanner::new(
        world.repository.clone(),
        world.resolver.clone(),
        world.directory.clone(),
        world.dispatcher.clone(),
        world.clock.clone(),
    );
    let stale = scanner
        .scan(world.config.stale_after_days)
        .await
        .expect("scan runs");
    assert_eq!(stale.leads_processed, 1);
    assert_eq!(stale.reminders_sent, 1);
    assert!(stale.errors.is_empty());

    let aggregator = WeeklyDigestAggregator::new(
        world.repository.clone(),
        world.directory.clone(),
        world.log.clone(),
        world.dispatcher.clone(),
        world.clock.clone(),
        Recipient::from_email(&world.config.digest_recipient),
    );
    let digest = aggregator.run(14).await.expect("digest runs");
    assert_eq!(digest.report.totals.new_leads, 1);
    assert_eq!(digest.report.totals.contacted_leads, 1);
    assert_eq!(digest.report.status_changes, 1);
    assert_eq!(digest.report.funds[0].fund_name, "Harbor Credit");
    assert_eq!(digest.dispatch.sent, 1);

    let rows = world.log.rows();
    let types_for = |email_type: EmailType| {
        rows.iter()
            .filter(|row| row.email_type == email_type)
            .count()
    };
    assert_eq!(types_for(EmailType::NewEnquiry), 1);
    assert_eq!(types_for(EmailType::EnquiryConfirmation), 1);
    assert_eq!(types_for(EmailType::StatusChange), 1);
    assert_eq!(types_for(EmailType::StaleReminder), 1);
    assert_eq!(types_for(EmailType::WeeklyDigest), 1);
    assert!(rows.iter().all(|row| row.succeeded()));

    let stored = world
        .repository
        .all()
        .into_iter()
        .find(|enquiry| enquiry.id == EnquiryId(enquiry_id.clone()))
        .expect("enquiry persisted");
    assert_eq!(stored.status, EnquiryStatus::Contacted);
}

#[tokio::test]
async fn fourth_enquiry_from_one_address_is_throttled() {
    let world = world();
    let (queue, worker) = NotificationWorker::spawn(world.dispatcher.clone(), 16);
    let service = Arc::new(EnquiryService::new(
        world.repository.clone(),
        world.resolver.clone(),
        world.directory.clone(),
        RateLimiter::in_memory(
            world.clock.clone(),
            RateLimitPolicy::try_from(&world.config).expect("valid policy"),
        ),
        queue,
        world.clock.clone(),
        Recipient::from_email(&world.config.admin_email),
    ));
    let router = enquiry_router(service);
    let body = json!({
        "fund_id": "fund-harbor",
        "first_name": "Ada",
        "last_name": "Lovelace",
        "email": INVESTOR,
        "investment_range": "250k-1m",
        "message": "Following up"
    });

    for _ in 0..world.config.rate_limit_max {
        let response = router
            .clone()
            .oneshot(post("/api/v1/enquiries", body.clone()))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(post("/api/v1/enquiries", body))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    drop(router);
    worker.shutdown().await;
    assert_eq!(
        world.repository.all().len(),
        world.config.rate_limit_max as usize
    );
}
