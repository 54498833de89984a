//! Fan-out of one logical notification to a recipient set.
//!
//! ```text
//! send(payload, recipients)
//!   ├─ de-duplicate recipients (case-insensitive email)
//!   └─ buffer_unordered(concurrency):
//!        ├─ render (per recipient greeting)
//!        ├─ provider.send under timeout
//!        └─ append exactly one NotificationLog row
//! ```
//!
//! Failures are isolated per recipient; every recipient gets an attempt.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use metrics::counter;
use serde::Serialize;
use uuid::Uuid;

use super::log::{NotificationLog, NotificationLogRepository};
use super::provider::{EmailProvider, OutboundEmail, ProviderError};
use super::templates::{EmailType, NotificationPayload, TemplateRenderer};
use crate::clock::Clock;
use crate::config::LeadConfig;
use crate::workflows::enquiries::domain::Recipient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSettings {
    pub concurrency: usize,
    pub send_timeout: Duration,
    pub test_mode: bool,
    /// Delivery override used while `test_mode` is set.
    pub test_recipient: Option<String>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self::from(&LeadConfig::default())
    }
}

impl From<&LeadConfig> for DispatchSettings {
    fn from(config: &LeadConfig) -> Self {
        Self {
            concurrency: config.dispatch_concurrency.max(1),
            send_timeout: config.send_timeout,
            test_mode: config.test_mode,
            test_recipient: config.test_recipient.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientOutcome {
    pub email: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub dispatch_id: Uuid,
    pub email_type: EmailType,
    pub sent: usize,
    pub failed: usize,
    pub per_recipient: Vec<RecipientOutcome>,
}

impl DispatchResult {
    pub fn attempted(&self) -> usize {
        self.sent + self.failed
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

pub struct NotificationDispatcher {
    provider: Arc<dyn EmailProvider>,
    renderer: Arc<dyn TemplateRenderer>,
    log: Arc<dyn NotificationLogRepository>,
    clock: Arc<dyn Clock>,
    settings: DispatchSettings,
}

impl NotificationDispatcher {
    pub fn new(
        provider: Arc<dyn EmailProvider>,
        renderer: Arc<dyn TemplateRenderer>,
        log: Arc<dyn NotificationLogRepository>,
        clock: Arc<dyn Clock>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            provider,
            renderer,
            log,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.settings
    }

    /// Attempt delivery to every recipient and log one row per attempt.
    pub async fn send(
        &self,
        payload: &NotificationPayload,
        recipients: &[Recipient],
    ) -> DispatchResult {
        let email_type = payload.email_type();
        let dispatch_id = Uuid::new_v4();

        let mut unique: BTreeMap<String, Recipient> = BTreeMap::new();
        for recipient in recipients {
            unique
                .entry(recipient.email.trim().to_lowercase())
                .or_insert_with(|| recipient.clone());
        }

        if unique.is_empty() {
            tracing::debug!(email_type = email_type.label(), "no recipients; nothing to send");
            return DispatchResult {
                dispatch_id,
                email_type,
                sent: 0,
                failed: 0,
                per_recipient: Vec::new(),
            };
        }

        let mut per_recipient: Vec<RecipientOutcome> = stream::iter(unique.into_values())
            .map(|recipient: Recipient| async move {
                self.deliver(dispatch_id, payload, &recipient).await
            })
            .buffer_unordered(self.settings.concurrency.max(1))
            .collect()
            .await;
        per_recipient.sort_by(|left, right| left.email.cmp(&right.email));

        let sent = per_recipient.iter().filter(|outcome| outcome.ok).count();
        let failed = per_recipient.len() - sent;

        counter!("fund_leads_notifications_sent_total", "email_type" => email_type.label())
            .increment(sent as u64);
        counter!("fund_leads_notifications_failed_total", "email_type" => email_type.label())
            .increment(failed as u64);

        if failed > 0 {
            tracing::warn!(
                %dispatch_id,
                email_type = email_type.label(),
                sent,
                failed,
                "notification dispatch completed with failures"
            );
        } else {
            tracing::info!(
                %dispatch_id,
                email_type = email_type.label(),
                sent,
                "notification dispatched"
            );
        }

        DispatchResult {
            dispatch_id,
            email_type,
            sent,
            failed,
            per_recipient,
        }
    }

    async fn deliver(
        &self,
        dispatch_id: Uuid,
        payload: &NotificationPayload,
        recipient: &Recipient,
    ) -> RecipientOutcome {
        let email_type = payload.email_type();
        let intended = recipient.email.trim().to_lowercase();

        let (subject, result) = match self.renderer.render(payload, recipient) {
            Ok(rendered) => {
                let delivery_address =
                    match (self.settings.test_mode, &self.settings.test_recipient) {
                        (true, Some(override_address)) => override_address.clone(),
                        _ => intended.clone(),
                    };
                let email = OutboundEmail {
                    to: delivery_address,
                    to_name: Some(recipient.display_name.clone()),
                    subject: rendered.subject.clone(),
                    html: rendered.html,
                    text: rendered.text,
                };
                let timeout = self.settings.send_timeout;
                let result = match tokio::time::timeout(timeout, self.provider.send(email)).await {
                    Ok(result) => result,
                    Err(_) => Err(ProviderError::Timeout(timeout)),
                };
                (rendered.subject, result)
            }
            Err(err) => (
                email_type.template().subject_prefix.to_string(),
                Err(ProviderError::Render(err.reason)),
            ),
        };

        let (provider_id, error) = match result {
            Ok(receipt) => (Some(receipt.message_id), None),
            Err(err) => {
                tracing::warn!(
                    %dispatch_id,
                    email_type = email_type.label(),
                    recipient = %intended,
                    error = %err,
                    "notification send failed"
                );
                (None, Some(err.to_string()))
            }
        };

        let row = NotificationLog {
            id: Uuid::new_v4(),
            dispatch_id,
            enquiry_id: payload.enquiry_id().cloned(),
            fund_id: payload.fund_id().cloned(),
            recipient_email: intended.clone(),
            email_type,
            subject,
            provider_message_id: provider_id.clone(),
            error_message: error.clone(),
            sent_at: self.clock.now(),
            test_mode: self.settings.test_mode,
        };
        if let Err(err) = self.log.append(row) {
            tracing::error!(
                %dispatch_id,
                recipient = %intended,
                error = %err,
                "failed to append notification log row"
            );
        }

        RecipientOutcome {
            email: intended,
            ok: error.is_none(),
            provider_id,
            error,
        }
    }
}
