use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{
    CompanyProfile, Enquiry, EnquiryId, EnquiryStatus, FundId, FundRecord, ManagerAssignment,
    ProfileId,
};

/// Storage abstraction so the service module can be exercised in isolation.
pub trait EnquiryRepository: Send + Sync {
    fn create(&self, enquiry: Enquiry) -> Result<Enquiry, RepositoryError>;
    fn fetch(&self, id: &EnquiryId) -> Result<Option<Enquiry>, RepositoryError>;

    /// Single-row optimistic update: fails with `Conflict` when the stored status is no
    /// longer `expected`.
    fn update_status(
        &self,
        id: &EnquiryId,
        expected: EnquiryStatus,
        next: EnquiryStatus,
        at: DateTime<Utc>,
    ) -> Result<Enquiry, RepositoryError>;

    fn count_by_email_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError>;

    /// Enquiries in one of `statuses` whose `updated_at` is strictly before `before`.
    fn find_stale(
        &self,
        statuses: &[EnquiryStatus],
        before: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>, RepositoryError>;

    /// Enquiries created in `[start, end)`.
    fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>, RepositoryError>;
}

/// Read-only view over the external fund store.
pub trait FundDirectory: Send + Sync {
    fn fund(&self, id: &FundId) -> Result<Option<FundRecord>, RepositoryError>;
}

pub trait CompanyProfileRepository: Send + Sync {
    fn find_by_manager_name(&self, name: &str) -> Result<Option<CompanyProfile>, RepositoryError>;
}

pub trait ManagerAssignmentRepository: Send + Sync {
    fn active_assignments_for_profile(
        &self,
        profile_id: &ProfileId,
    ) -> Result<Vec<ManagerAssignment>, RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of an enquiry for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct EnquiryView {
    pub enquiry_id: EnquiryId,
    pub fund_id: FundId,
    pub status: &'static str,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub investment_range: String,
    pub interest_areas: Vec<String>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Enquiry> for EnquiryView {
    fn from(enquiry: &Enquiry) -> Self {
        Self {
            enquiry_id: enquiry.id.clone(),
            fund_id: enquiry.fund_id.clone(),
            status: enquiry.status.label(),
            first_name: enquiry.contact.first_name.clone(),
            last_name: enquiry.contact.last_name.clone(),
            email: enquiry.contact.email.clone(),
            phone: enquiry.contact.phone.clone(),
            investment_range: enquiry.investment_range.clone(),
            interest_areas: enquiry.interest_areas.iter().cloned().collect(),
            message: enquiry.message.clone(),
            created_at: enquiry.created_at,
            updated_at: enquiry.updated_at,
        }
    }
}
