//! Investor enquiry intake, status lifecycle, and manager resolution.

pub mod domain;
pub mod lifecycle;
pub mod rate_limit;
pub mod repository;
pub mod resolver;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    AssignmentStatus, CompanyProfile, ContactDetails, Enquiry, EnquiryId, EnquiryStatus,
    EnquirySubmission, FundId, FundRecord, ManagerAssignment, ProfileId, Recipient,
};
pub use lifecycle::{EnquiryLifecycle, InvalidTransition, TransitionOutcome};
pub use rate_limit::{
    InMemoryRateLimitStore, RateLimitDecision, RateLimitPolicy, RateLimitStore, RateLimiter,
};
pub use repository::{
    CompanyProfileRepository, EnquiryRepository, EnquiryView, FundDirectory,
    ManagerAssignmentRepository, RepositoryError,
};
pub use resolver::{ManagerResolver, ResolverError};
pub use router::{enquiry_router, StatusUpdateRequest};
pub use service::{EnquiryService, EnquiryServiceError};
pub use validation::{validate_submission, ValidatedSubmission, ValidationError};
