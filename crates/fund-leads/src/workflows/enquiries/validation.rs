use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::domain::{ContactDetails, Enquiry, EnquiryId, EnquiryStatus, EnquirySubmission, FundId};

/// Intake validation failures. Raised before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("email address '{0}' is not valid")]
    InvalidEmail(String),
}

/// Submission that passed validation. Only the fund id, email and interest areas are trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSubmission {
    pub fund_id: FundId,
    pub contact: ContactDetails,
    pub investment_range: String,
    pub interest_areas: BTreeSet<String>,
    pub message: String,
}

impl ValidatedSubmission {
    pub fn into_enquiry(self, id: EnquiryId, now: DateTime<Utc>) -> Enquiry {
        Enquiry {
            id,
            fund_id: self.fund_id,
            contact: self.contact,
            investment_range: self.investment_range,
            interest_areas: self.interest_areas,
            message: self.message,
            status: EnquiryStatus::Open,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn validate_submission(
    submission: EnquirySubmission,
) -> Result<ValidatedSubmission, ValidationError> {
    let EnquirySubmission {
        fund_id,
        first_name,
        last_name,
        email,
        phone,
        investment_range,
        interest_areas,
        message,
    } = submission;

    let fund_id = required("fund_id", fund_id)?.trim().to_string();
    let first_name = required("first_name", first_name)?;
    let last_name = required("last_name", last_name)?;
    let email = required("email", email)?.trim().to_string();
    let message = required("message", message)?;
    let investment_range = required("investment_range", investment_range)?;

    if !is_valid_email(&email) {
        return Err(ValidationError::InvalidEmail(email));
    }

    let phone = phone.filter(|value| !value.trim().is_empty());

    let interest_areas = interest_areas
        .into_iter()
        .map(|area| area.trim().to_string())
        .filter(|area| !area.is_empty())
        .collect();

    Ok(ValidatedSubmission {
        fund_id: FundId(fund_id),
        contact: ContactDetails {
            first_name,
            last_name,
            email,
            phone,
        },
        investment_range,
        interest_areas,
        message,
    })
}

/// Blank-after-trim counts as missing; the value itself is kept as submitted.
fn required(field: &'static str, value: String) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(value)
    }
}

/// Basic `local@domain.tld` shape check.
pub fn is_valid_email(candidate: &str) -> bool {
    if candidate.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = candidate.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}
