//! Resolution of a fund to the managers who should hear about its leads.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::domain::{AssignmentStatus, CompanyProfile, FundId, ManagerAssignment, Recipient};
use super::repository::{
    CompanyProfileRepository, FundDirectory, ManagerAssignmentRepository, RepositoryError,
};

/// Infrastructure failure while resolving managers. "Nobody to notify" is not an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolverError {
    #[error("manager lookup failed for fund {fund_id}: {source}")]
    LookupFailed {
        fund_id: FundId,
        #[source]
        source: RepositoryError,
    },
}

pub struct ManagerResolver {
    funds: Arc<dyn FundDirectory>,
    profiles: Arc<dyn CompanyProfileRepository>,
    assignments: Arc<dyn ManagerAssignmentRepository>,
}

impl ManagerResolver {
    pub fn new(
        funds: Arc<dyn FundDirectory>,
        profiles: Arc<dyn CompanyProfileRepository>,
        assignments: Arc<dyn ManagerAssignmentRepository>,
    ) -> Self {
        Self {
            funds,
            profiles,
            assignments,
        }
    }

    /// Active managers for the company owning `fund_id`, one entry per lower-cased email,
    /// sorted by email. An unknown fund, unmatched company, or zero active assignments all
    /// yield an empty list.
    pub fn resolve(&self, fund_id: &FundId) -> Result<Vec<Recipient>, ResolverError> {
        let lookup_failed = |source| ResolverError::LookupFailed {
            fund_id: fund_id.clone(),
            source,
        };

        let Some(fund) = self.funds.fund(fund_id).map_err(lookup_failed)? else {
            tracing::debug!(%fund_id, "fund not found; no managers to notify");
            return Ok(Vec::new());
        };

        let Some(manager_name) = fund
            .manager_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
        else {
            tracing::debug!(%fund_id, "fund has no recorded manager name");
            return Ok(Vec::new());
        };

        let Some(profile) = self
            .profiles
            .find_by_manager_name(manager_name)
            .map_err(lookup_failed)?
        else {
            tracing::debug!(%fund_id, manager_name, "no company profile matches fund manager");
            return Ok(Vec::new());
        };

        let assignments = self
            .assignments
            .active_assignments_for_profile(&profile.id)
            .map_err(lookup_failed)?;

        let recipients = collect_recipients(&profile, assignments);
        tracing::debug!(
            %fund_id,
            company = %profile.company_name,
            recipients = recipients.len(),
            "resolved fund managers"
        );
        Ok(recipients)
    }
}

fn collect_recipients(
    profile: &CompanyProfile,
    assignments: Vec<ManagerAssignment>,
) -> Vec<Recipient> {
    let mut by_email: BTreeMap<String, Recipient> = BTreeMap::new();

    for assignment in assignments
        .into_iter()
        .filter(|assignment| assignment.status == AssignmentStatus::Active)
    {
        let email = assignment.email.trim().to_lowercase();
        if email.is_empty() || by_email.contains_key(&email) {
            continue;
        }
        let display_name = display_name(profile, &assignment, &email);
        by_email.insert(email.clone(), Recipient::new(email, display_name));
    }

    by_email.into_values().collect()
}

fn display_name(profile: &CompanyProfile, assignment: &ManagerAssignment, email: &str) -> String {
    if let Some(name) = profile
        .manager_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    {
        return name.to_string();
    }

    let parts: Vec<&str> = [assignment.first_name.as_deref(), assignment.last_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    if !parts.is_empty() {
        return parts.join(" ");
    }

    Recipient::from_email(email).display_name
}
