use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::templates::EmailType;
use crate::workflows::enquiries::domain::{EnquiryId, FundId};
use crate::workflows::enquiries::repository::RepositoryError;

/// Audit row written once per recipient per send attempt. Never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationLog {
    pub id: Uuid,
    /// Shared by every row written for one logical notification.
    pub dispatch_id: Uuid,
    pub enquiry_id: Option<EnquiryId>,
    pub fund_id: Option<FundId>,
    /// The intended recipient, even when test mode redirected delivery.
    pub recipient_email: String,
    pub email_type: EmailType,
    pub subject: String,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub test_mode: bool,
}

impl NotificationLog {
    pub fn succeeded(&self) -> bool {
        self.error_message.is_none()
    }
}

pub trait NotificationLogRepository: Send + Sync {
    fn append(&self, row: NotificationLog) -> Result<(), RepositoryError>;
    /// Rows with `sent_at >= since`, oldest first.
    fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<NotificationLog>, RepositoryError>;
    fn for_enquiry(&self, id: &EnquiryId) -> Result<Vec<NotificationLog>, RepositoryError>;
}
