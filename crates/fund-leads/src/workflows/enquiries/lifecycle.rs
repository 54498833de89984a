use chrono::{DateTime, Utc};

use super::domain::{Enquiry, EnquiryStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot move enquiry from {from} to {to}")]
pub struct InvalidTransition {
    pub from: EnquiryStatus,
    pub to: EnquiryStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Target equals the current status; nothing to persist or announce.
    Unchanged(Enquiry),
    Applied {
        enquiry: Enquiry,
        previous: EnquiryStatus,
    },
}

impl TransitionOutcome {
    pub fn enquiry(&self) -> &Enquiry {
        match self {
            TransitionOutcome::Unchanged(enquiry) => enquiry,
            TransitionOutcome::Applied { enquiry, .. } => enquiry,
        }
    }

    pub fn into_enquiry(self) -> Enquiry {
        match self {
            TransitionOutcome::Unchanged(enquiry) => enquiry,
            TransitionOutcome::Applied { enquiry, .. } => enquiry,
        }
    }

    pub fn changed(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

/// Forward-only status machine: `open -> contacted -> {won, closed_lost}` with the contact
/// step optional.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnquiryLifecycle;

impl EnquiryLifecycle {
    pub fn permits(from: EnquiryStatus, to: EnquiryStatus) -> bool {
        use EnquiryStatus::*;

        matches!(
            (from, to),
            (Open, Contacted)
                | (Open, Won)
                | (Open, ClosedLost)
                | (Contacted, Won)
                | (Contacted, ClosedLost)
        )
    }

    pub fn transition(
        &self,
        enquiry: Enquiry,
        next: EnquiryStatus,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, InvalidTransition> {
        let current = enquiry.status;
        if current == next {
            return Ok(TransitionOutcome::Unchanged(enquiry));
        }

        if !Self::permits(current, next) {
            return Err(InvalidTransition {
                from: current,
                to: next,
            });
        }

        let mut enquiry = enquiry;
        enquiry.status = next;
        enquiry.updated_at = now.max(enquiry.created_at);
        Ok(TransitionOutcome::Applied {
            enquiry,
            previous: current,
        })
    }
}
