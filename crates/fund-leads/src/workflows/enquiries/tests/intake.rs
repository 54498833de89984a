use super::common::*;
use chrono::Duration;

use crate::workflows::enquiries::domain::{EnquiryId, EnquiryStatus};
use crate::workflows::enquiries::repository::RepositoryError;
use crate::workflows::enquiries::service::EnquiryServiceError;
use crate::workflows::enquiries::validation::ValidationError;
use crate::workflows::memory::InMemoryEnquiryRepository;
use crate::workflows::notifications::templates::EmailType;
use crate::workflows::testing::*;

#[tokio::test]
async fn submit_persists_open_enquiry_and_round_trips() {
    let harness = build_service();

    let enquiry = harness
        .service
        .submit(submission("ada@investors.example"))
        .await
        .expect("submission succeeds");

    assert_eq!(enquiry.status, EnquiryStatus::Open);
    assert_eq!(enquiry.created_at, now());
    assert_eq!(enquiry.updated_at, enquiry.created_at);
    assert_eq!(enquiry.contact.full_name(), "Ada Lovelace");
    assert!(enquiry.interest_areas.contains("credit"));

    let fetched = harness.service.get(&enquiry.id).expect("stored");
    assert_eq!(fetched, enquiry);
}

#[tokio::test]
async fn stored_contact_and_message_match_the_submitted_payload() {
    let harness = build_service();
    let mut payload = submission("ada@investors.example");
    payload.message = "  Two questions:\n1. fees\n2. lock-up  ".to_string();
    payload.last_name = "Lovelace ".to_string();

    let enquiry = harness
        .service
        .submit(payload.clone())
        .await
        .expect("submission succeeds");
    let fetched = harness.service.get(&enquiry.id).expect("stored");

    assert_eq!(fetched.message, payload.message);
    assert_eq!(fetched.investment_range, payload.investment_range);
    assert_eq!(fetched.contact.first_name, payload.first_name);
    assert_eq!(fetched.contact.last_name, payload.last_name);
    assert_eq!(fetched.contact.email, payload.email);
    assert_eq!(fetched.contact.phone, payload.phone);
}

#[tokio::test]
async fn submit_does_not_wait_on_a_saturated_notification_queue() {
    let harness = build_harness(
        std::sync::Arc::new(InMemoryEnquiryRepository::default()),
        RecordingProvider::slow(std::time::Duration::from_millis(400)),
        1,
    );

    let submitted = tokio::time::timeout(std::time::Duration::from_millis(200), async {
        for email in [
            "ada@investors.example",
            "grace@investors.example",
            "katherine@investors.example",
        ] {
            harness
                .service
                .submit(submission(email))
                .await
                .expect("submission succeeds");
        }
    })
    .await;

    assert!(submitted.is_ok(), "submit waited on email delivery");
    assert_eq!(harness.repository.all().len(), 3);

    let settled = harness.settle().await;
    assert!(settled.stats.jobs < 6, "full queue should shed jobs");
    assert_eq!(settled.log.rows().len(), settled.stats.sent + settled.stats.failed);
}

#[tokio::test]
async fn submit_notifies_managers_and_confirms_to_submitter() {
    let harness = build_service();
    let enquiry = harness
        .service
        .submit(submission("Ada@Investors.example"))
        .await
        .expect("submission succeeds");

    let settled = harness.settle().await;

    assert_eq!(settled.stats.jobs, 2);
    assert_eq!(
        settled.provider.sent_to(),
        vec![
            "ada@investors.example",
            "dana@atlas.example",
            "lee@atlas.example"
        ]
    );

    let rows = settled.log.rows();
    assert_eq!(rows.len(), 3);
    let managers: Vec<&str> = rows
        .iter()
        .filter(|row| row.email_type == EmailType::NewEnquiry)
        .map(|row| row.recipient_email.as_str())
        .collect();
    assert_eq!(managers.len(), 2);
    assert!(!managers.contains(&"new@atlas.example"));
    assert!(rows
        .iter()
        .all(|row| row.enquiry_id.as_ref() == Some(&enquiry.id)));
    assert_eq!(
        rows.iter()
            .filter(|row| row.email_type == EmailType::EnquiryConfirmation)
            .count(),
        1
    );
}

#[tokio::test]
async fn fund_without_active_managers_only_gets_confirmation() {
    let harness = build_service();
    let mut payload = submission("ada@investors.example");
    payload.fund_id = fund_b().0;

    harness
        .service
        .submit(payload)
        .await
        .expect("submission succeeds");
    let settled = harness.settle().await;

    assert_eq!(settled.provider.sent_to(), vec!["ada@investors.example"]);
    assert_eq!(settled.log.rows()[0].email_type, EmailType::EnquiryConfirmation);
}

#[tokio::test]
async fn fourth_submission_in_window_is_rate_limited() {
    let harness = build_service();

    for email in [
        "ada@investors.example",
        "ADA@investors.example",
        " ada@investors.example ",
    ] {
        harness
            .service
            .submit(submission(email))
            .await
            .expect("within limit");
    }

    let err = harness
        .service
        .submit(submission("ada@investors.example"))
        .await
        .expect_err("fourth submission throttled");
    assert!(matches!(
        err,
        EnquiryServiceError::RateLimited { retry_after } if retry_after == Duration::hours(24)
    ));
    assert_eq!(harness.repository.all().len(), 3);

    harness.clock.advance(Duration::hours(24));
    harness
        .service
        .submit(submission("ada@investors.example"))
        .await
        .expect("new window accepts submissions");
    assert_eq!(harness.repository.all().len(), 4);
}

#[tokio::test]
async fn rate_limit_is_per_email() {
    let harness = build_service();
    for _ in 0..3 {
        harness
            .service
            .submit(submission("ada@investors.example"))
            .await
            .expect("within limit");
    }

    harness
        .service
        .submit(submission("grace@investors.example"))
        .await
        .expect("other submitters unaffected");
}

#[tokio::test]
async fn invalid_submission_persists_nothing() {
    let harness = build_service();
    let err = harness
        .service
        .submit(submission("not-an-email"))
        .await
        .expect_err("validation fails");

    assert!(matches!(
        err,
        EnquiryServiceError::Validation(ValidationError::InvalidEmail(_))
    ));
    assert!(harness.repository.all().is_empty());

    let settled = harness.settle().await;
    assert_eq!(settled.stats.jobs, 0);
    assert!(settled.log.rows().is_empty());
}

#[tokio::test]
async fn persistence_failure_surfaces_and_sends_nothing() {
    let harness = build_service_with(std::sync::Arc::new(UnavailableRepository));

    let err = harness
        .service
        .submit(submission("ada@investors.example"))
        .await
        .expect_err("create fails");

    assert!(matches!(err, EnquiryServiceError::Repository(_)));
    let settled = harness.settle().await;
    assert!(settled.provider.sent().is_empty());
}

#[tokio::test]
async fn missing_required_field_is_reported_by_name() {
    let harness = build_service();
    let mut payload = submission("ada@investors.example");
    payload.investment_range = "   ".to_string();

    let err = harness
        .service
        .submit(payload)
        .await
        .expect_err("validation fails");

    assert!(matches!(
        err,
        EnquiryServiceError::Validation(ValidationError::MissingField("investment_range"))
    ));
}

#[tokio::test]
async fn unknown_enquiry_is_not_found() {
    let harness = build_service();

    let err = harness
        .service
        .get(&EnquiryId("missing".to_string()))
        .expect_err("missing enquiry");

    assert!(matches!(
        err,
        EnquiryServiceError::Repository(RepositoryError::NotFound)
    ));
}
