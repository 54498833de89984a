use std::sync::Arc;

use chrono::Duration;

use super::domain::{Enquiry, EnquiryId, EnquiryStatus, EnquirySubmission, Recipient};
use super::lifecycle::{EnquiryLifecycle, InvalidTransition, TransitionOutcome};
use super::rate_limit::RateLimiter;
use super::repository::{EnquiryRepository, FundDirectory, RepositoryError};
use super::resolver::ManagerResolver;
use super::validation::{validate_submission, ValidationError};
use crate::clock::Clock;
use crate::workflows::notifications::templates::{FundContext, NotificationPayload};
use crate::workflows::notifications::{NotificationJob, NotificationQueue};

/// Service composing validation, throttling, persistence, and notification hand-off.
pub struct EnquiryService<R> {
    repository: Arc<R>,
    resolver: Arc<ManagerResolver>,
    funds: Arc<dyn FundDirectory>,
    limiter: RateLimiter,
    queue: NotificationQueue,
    clock: Arc<dyn Clock>,
    admin: Recipient,
    lifecycle: EnquiryLifecycle,
}

impl<R> EnquiryService<R>
where
    R: EnquiryRepository + 'static,
{
    pub fn new(
        repository: Arc<R>,
        resolver: Arc<ManagerResolver>,
        funds: Arc<dyn FundDirectory>,
        limiter: RateLimiter,
        queue: NotificationQueue,
        clock: Arc<dyn Clock>,
        admin: Recipient,
    ) -> Self {
        Self {
            repository,
            resolver,
            funds,
            limiter,
            queue,
            clock,
            admin,
            lifecycle: EnquiryLifecycle,
        }
    }

    /// Validate, throttle, and persist a new enquiry, then queue the manager alert and the
    /// submitter confirmation. Returns once the enquiry is stored.
    pub async fn submit(
        &self,
        submission: EnquirySubmission,
    ) -> Result<Enquiry, EnquiryServiceError> {
        let validated = validate_submission(submission)?;

        let decision = self.limiter.allow(&validated.contact.email);
        if !decision.allowed {
            return Err(EnquiryServiceError::RateLimited {
                retry_after: self.limiter.policy().window,
            });
        }

        let enquiry = validated.into_enquiry(EnquiryId::generate(), self.clock.now());
        let stored = self.repository.create(enquiry)?;
        tracing::info!(
            enquiry_id = %stored.id,
            fund_id = %stored.fund_id,
            remaining = decision.remaining,
            "enquiry received"
        );

        let fund = FundContext::lookup(self.funds.as_ref(), &stored.fund_id);
        match self.resolver.resolve(&stored.fund_id) {
            Ok(managers) if managers.is_empty() => {
                tracing::info!(enquiry_id = %stored.id, "no managers to notify");
            }
            Ok(managers) => {
                self.enqueue(
                    NotificationPayload::NewEnquiry {
                        enquiry: stored.clone(),
                        fund: fund.clone(),
                    },
                    managers,
                );
            }
            Err(err) => {
                tracing::warn!(enquiry_id = %stored.id, error = %err, "manager resolution failed");
            }
        }

        let submitter = Recipient::new(stored.contact.email.clone(), stored.contact.full_name());
        self.enqueue(
            NotificationPayload::EnquiryConfirmation {
                enquiry: stored.clone(),
                fund,
            },
            vec![submitter],
        );

        Ok(stored)
    }

    pub fn get(&self, enquiry_id: &EnquiryId) -> Result<Enquiry, EnquiryServiceError> {
        let enquiry = self
            .repository
            .fetch(enquiry_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(enquiry)
    }

    /// Move an enquiry to `next`. A same-status request is a no-op; applied changes are
    /// persisted with an optimistic check and announced to the admin recipient.
    pub async fn transition(
        &self,
        enquiry_id: &EnquiryId,
        next: EnquiryStatus,
        actor: &str,
    ) -> Result<TransitionOutcome, EnquiryServiceError> {
        let outcome = match self.try_transition(enquiry_id, next) {
            Err(EnquiryServiceError::Repository(RepositoryError::Conflict)) => {
                tracing::debug!(%enquiry_id, "status changed concurrently; re-reading");
                self.try_transition(enquiry_id, next)?
            }
            other => other?,
        };

        if let TransitionOutcome::Applied { enquiry, previous } = &outcome {
            tracing::info!(
                %enquiry_id,
                from = %previous,
                to = %enquiry.status,
                actor,
                "enquiry status changed"
            );
            self.enqueue(
                NotificationPayload::StatusChange {
                    enquiry: enquiry.clone(),
                    fund: FundContext::lookup(self.funds.as_ref(), &enquiry.fund_id),
                    previous: *previous,
                    actor: actor.to_string(),
                },
                vec![self.admin.clone()],
            );
        }

        Ok(outcome)
    }

    fn try_transition(
        &self,
        enquiry_id: &EnquiryId,
        next: EnquiryStatus,
    ) -> Result<TransitionOutcome, EnquiryServiceError> {
        let current = self.get(enquiry_id)?;
        let expected = current.status;
        match self.lifecycle.transition(current, next, self.clock.now())? {
            TransitionOutcome::Applied { enquiry, previous } => {
                let stored = self.repository.update_status(
                    enquiry_id,
                    expected,
                    enquiry.status,
                    enquiry.updated_at,
                )?;
                Ok(TransitionOutcome::Applied {
                    enquiry: stored,
                    previous,
                })
            }
            unchanged => Ok(unchanged),
        }
    }

    /// Drop expired rate-limit windows; called periodically by the host.
    pub fn purge_rate_limits(&self) -> usize {
        self.limiter.purge_expired()
    }

    fn enqueue(&self, payload: NotificationPayload, recipients: Vec<Recipient>) {
        let email_type = payload.email_type();
        if let Err(err) = self.queue.enqueue(NotificationJob {
            payload,
            recipients,
        }) {
            tracing::error!(
                email_type = email_type.label(),
                error = %err,
                "notification dropped"
            );
        }
    }
}

/// Error raised by the enquiry service.
#[derive(Debug, thiserror::Error)]
pub enum EnquiryServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("too many enquiries from this address; try again later")]
    RateLimited { retry_after: Duration },
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
