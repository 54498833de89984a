//! In-process implementations of the storage traits for single-instance deployments,
//! fixtures, and tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::workflows::enquiries::domain::{
    AssignmentStatus, CompanyProfile, Enquiry, EnquiryId, EnquiryStatus, FundId, FundRecord,
    ManagerAssignment, ProfileId,
};
use crate::workflows::enquiries::repository::{
    CompanyProfileRepository, EnquiryRepository, FundDirectory, ManagerAssignmentRepository,
    RepositoryError,
};
use crate::workflows::notifications::log::{NotificationLog, NotificationLogRepository};

/// Fixture document used to seed the in-memory stores.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub funds: Vec<FundRecord>,
    #[serde(default)]
    pub profiles: Vec<CompanyProfile>,
    #[serde(default)]
    pub assignments: Vec<ManagerAssignment>,
    #[serde(default)]
    pub enquiries: Vec<Enquiry>,
}

impl SeedData {
    pub fn apply(self, repository: &InMemoryEnquiryRepository, directory: &InMemoryDirectory) {
        tracing::info!(
            funds = self.funds.len(),
            profiles = self.profiles.len(),
            assignments = self.assignments.len(),
            enquiries = self.enquiries.len(),
            "seeding in-memory stores"
        );
        self.funds
            .into_iter()
            .for_each(|fund| directory.insert_fund(fund));
        self.profiles
            .into_iter()
            .for_each(|profile| directory.insert_profile(profile));
        self.assignments
            .into_iter()
            .for_each(|assignment| directory.insert_assignment(assignment));
        self.enquiries
            .into_iter()
            .for_each(|enquiry| repository.seed(enquiry));
    }
}

#[derive(Default, Clone)]
pub struct InMemoryEnquiryRepository {
    records: Arc<Mutex<HashMap<EnquiryId, Enquiry>>>,
}

impl InMemoryEnquiryRepository {
    pub fn all(&self) -> Vec<Enquiry> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut records: Vec<Enquiry> = guard.values().cloned().collect();
        records.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        records
    }

    /// Insert or replace a record verbatim, bypassing lifecycle rules. Used for seeding.
    pub fn seed(&self, enquiry: Enquiry) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(enquiry.id.clone(), enquiry);
    }
}

impl EnquiryRepository for InMemoryEnquiryRepository {
    fn create(&self, enquiry: Enquiry) -> Result<Enquiry, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&enquiry.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(enquiry.id.clone(), enquiry.clone());
        Ok(enquiry)
    }

    fn fetch(&self, id: &EnquiryId) -> Result<Option<Enquiry>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn update_status(
        &self,
        id: &EnquiryId,
        expected: EnquiryStatus,
        next: EnquiryStatus,
        at: DateTime<Utc>,
    ) -> Result<Enquiry, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if record.status != expected {
            return Err(RepositoryError::Conflict);
        }
        record.status = next;
        record.updated_at = at.max(record.created_at);
        Ok(record.clone())
    }

    fn count_by_email_since(
        &self,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<usize, RepositoryError> {
        let needle = email.trim().to_lowercase();
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.created_at >= since)
            .filter(|record| record.contact.email.trim().to_lowercase() == needle)
            .count())
    }

    fn find_stale(
        &self,
        statuses: &[EnquiryStatus],
        before: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut stale: Vec<Enquiry> = guard
            .values()
            .filter(|record| statuses.contains(&record.status) && record.updated_at < before)
            .cloned()
            .collect();
        stale.sort_by(|left, right| left.updated_at.cmp(&right.updated_at));
        Ok(stale)
    }

    fn find_created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Enquiry>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        let mut created: Vec<Enquiry> = guard
            .values()
            .filter(|record| record.created_at >= start && record.created_at < end)
            .cloned()
            .collect();
        created.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(created)
    }
}

/// Funds, company profiles, and manager assignments in one read-mostly directory.
#[derive(Default, Clone)]
pub struct InMemoryDirectory {
    funds: Arc<Mutex<HashMap<FundId, FundRecord>>>,
    profiles: Arc<Mutex<Vec<CompanyProfile>>>,
    assignments: Arc<Mutex<Vec<ManagerAssignment>>>,
}

impl InMemoryDirectory {
    pub fn insert_fund(&self, fund: FundRecord) {
        let mut guard = self.funds.lock().expect("directory mutex poisoned");
        guard.insert(fund.id.clone(), fund);
    }

    pub fn insert_profile(&self, profile: CompanyProfile) {
        let mut guard = self.profiles.lock().expect("directory mutex poisoned");
        guard.retain(|existing| existing.id != profile.id);
        guard.push(profile);
    }

    pub fn insert_assignment(&self, assignment: ManagerAssignment) {
        let mut guard = self.assignments.lock().expect("directory mutex poisoned");
        guard.push(assignment);
    }

    /// Mark every assignment for `user_id` on `profile_id` as revoked.
    pub fn revoke_assignment(&self, profile_id: &ProfileId, user_id: &str) -> usize {
        let mut guard = self.assignments.lock().expect("directory mutex poisoned");
        let mut revoked = 0;
        for assignment in guard
            .iter_mut()
            .filter(|assignment| &assignment.profile_id == profile_id && assignment.user_id == user_id)
        {
            assignment.status = AssignmentStatus::Revoked;
            revoked += 1;
        }
        revoked
    }
}

impl FundDirectory for InMemoryDirectory {
    fn fund(&self, id: &FundId) -> Result<Option<FundRecord>, RepositoryError> {
        let guard = self.funds.lock().expect("directory mutex poisoned");
        Ok(guard.get(id).cloned())
    }
}

impl CompanyProfileRepository for InMemoryDirectory {
    fn find_by_manager_name(&self, name: &str) -> Result<Option<CompanyProfile>, RepositoryError> {
        let guard = self.profiles.lock().expect("directory mutex poisoned");
        Ok(guard
            .iter()
            .find(|profile| profile.matches_manager_name(name))
            .cloned())
    }
}

impl ManagerAssignmentRepository for InMemoryDirectory {
    fn active_assignments_for_profile(
        &self,
        profile_id: &ProfileId,
    ) -> Result<Vec<ManagerAssignment>, RepositoryError> {
        let guard = self.assignments.lock().expect("directory mutex poisoned");
        Ok(guard
            .iter()
            .filter(|assignment| {
                &assignment.profile_id == profile_id
                    && assignment.status == AssignmentStatus::Active
            })
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryNotificationLog {
    rows: Arc<Mutex<Vec<NotificationLog>>>,
}

impl InMemoryNotificationLog {
    pub fn rows(&self) -> Vec<NotificationLog> {
        self.rows.lock().expect("log mutex poisoned").clone()
    }
}

impl NotificationLogRepository for InMemoryNotificationLog {
    fn append(&self, row: NotificationLog) -> Result<(), RepositoryError> {
        self.rows.lock().expect("log mutex poisoned").push(row);
        Ok(())
    }

    fn list_since(&self, since: DateTime<Utc>) -> Result<Vec<NotificationLog>, RepositoryError> {
        let guard = self.rows.lock().expect("log mutex poisoned");
        let mut rows: Vec<NotificationLog> = guard
            .iter()
            .filter(|row| row.sent_at >= since)
            .cloned()
            .collect();
        rows.sort_by(|left, right| left.sent_at.cmp(&right.sent_at));
        Ok(rows)
    }

    fn for_enquiry(&self, id: &EnquiryId) -> Result<Vec<NotificationLog>, RepositoryError> {
        let guard = self.rows.lock().expect("log mutex poisoned");
        Ok(guard
            .iter()
            .filter(|row| row.enquiry_id.as_ref() == Some(id))
            .cloned()
            .collect())
    }
}
