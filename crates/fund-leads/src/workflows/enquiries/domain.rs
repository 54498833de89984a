use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for persisted enquiries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnquiryId(pub String);

impl EnquiryId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for EnquiryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundId(pub String);

impl fmt::Display for FundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prospective investor contact block captured at intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactDetails {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactDetails {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Raw intake payload as posted by the enquiry form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnquirySubmission {
    #[serde(default)]
    pub fund_id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub investment_range: String,
    #[serde(default)]
    pub interest_areas: Vec<String>,
    #[serde(default)]
    pub message: String,
}

/// Persisted lead. Only `status` and `updated_at` change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enquiry {
    pub id: EnquiryId,
    pub fund_id: FundId,
    pub contact: ContactDetails,
    pub investment_range: String,
    pub interest_areas: BTreeSet<String>,
    pub message: String,
    pub status: EnquiryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Enquiry {
    /// Whole days elapsed since the last status change.
    pub fn days_since_update(&self, now: DateTime<Utc>) -> i64 {
        (now - self.updated_at).num_days().max(0)
    }
}

/// Lead status tracked from intake to outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnquiryStatus {
    Open,
    Contacted,
    Won,
    ClosedLost,
}

impl EnquiryStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnquiryStatus::Open => "open",
            EnquiryStatus::Contacted => "contacted",
            EnquiryStatus::Won => "won",
            EnquiryStatus::ClosedLost => "closed_lost",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, EnquiryStatus::Won | EnquiryStatus::ClosedLost)
    }

    /// Statuses the stale-lead scan still chases.
    pub const fn active() -> [EnquiryStatus; 2] {
        [EnquiryStatus::Open, EnquiryStatus::Contacted]
    }
}

impl fmt::Display for EnquiryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Fund entry from the external fund store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundRecord {
    pub id: FundId,
    pub name: String,
    #[serde(default)]
    pub manager_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(pub String);

/// Company that owns funds and employs managers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: ProfileId,
    pub company_name: String,
    #[serde(default)]
    pub manager_name: Option<String>,
}

impl CompanyProfile {
    /// Case-insensitive substring match of a fund's recorded manager name against the
    /// company name or the profile's manager name.
    pub fn matches_manager_name(&self, candidate: &str) -> bool {
        let needle = candidate.trim().to_lowercase();
        if needle.is_empty() {
            return false;
        }

        let company = self.company_name.to_lowercase();
        let manager = self
            .manager_name
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default();

        company.contains(&needle) || (!manager.is_empty() && manager.contains(&needle))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Pending,
    Active,
    Revoked,
}

/// Link between a user and the company profile they manage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerAssignment {
    pub profile_id: ProfileId,
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    pub status: AssignmentStatus,
}

/// A resolved notification target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Recipient {
    pub email: String,
    pub display_name: String,
}

impl Recipient {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
        }
    }

    /// Recipient named after the local part of the address.
    pub fn from_email(email: &str) -> Self {
        let display = email.split('@').next().unwrap_or(email);
        Self::new(email, display)
    }
}
