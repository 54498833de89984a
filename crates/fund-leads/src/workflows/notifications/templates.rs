//! Email kinds, the template table, and the rendering seam.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::workflows::enquiries::domain::{Enquiry, EnquiryId, EnquiryStatus, FundId, Recipient};
use crate::workflows::enquiries::repository::FundDirectory;
use crate::workflows::jobs::digest::DigestReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    NewEnquiry,
    EnquiryConfirmation,
    StatusChange,
    StaleReminder,
    WeeklyDigest,
}

impl EmailType {
    pub const ALL: [EmailType; 5] = [
        EmailType::NewEnquiry,
        EmailType::EnquiryConfirmation,
        EmailType::StatusChange,
        EmailType::StaleReminder,
        EmailType::WeeklyDigest,
    ];

    pub fn label(self) -> &'static str {
        self.template().key
    }

    pub fn template(self) -> &'static EmailTemplate {
        match self {
            EmailType::NewEnquiry => &TEMPLATES[0],
            EmailType::EnquiryConfirmation => &TEMPLATES[1],
            EmailType::StatusChange => &TEMPLATES[2],
            EmailType::StaleReminder => &TEMPLATES[3],
            EmailType::WeeklyDigest => &TEMPLATES[4],
        }
    }
}

/// Static copy for one kind of email.
#[derive(Debug, PartialEq, Eq)]
pub struct EmailTemplate {
    pub key: &'static str,
    pub subject_prefix: &'static str,
    pub heading: &'static str,
    pub intro: &'static str,
}

static TEMPLATES: [EmailTemplate; 5] = [
    EmailTemplate {
        key: "new_enquiry",
        subject_prefix: "New investor enquiry",
        heading: "You have a new investor enquiry",
        intro: "A prospective investor has asked about one of your funds.",
    },
    EmailTemplate {
        key: "enquiry_confirmation",
        subject_prefix: "We received your enquiry",
        heading: "Thanks for your enquiry",
        intro: "Your enquiry has been received and recorded. We will follow up using the contact details below.",
    },
    EmailTemplate {
        key: "status_change",
        subject_prefix: "Enquiry status changed",
        heading: "An enquiry changed status",
        intro: "A lead has moved to a new stage.",
    },
    EmailTemplate {
        key: "stale_reminder",
        subject_prefix: "Enquiry awaiting follow-up",
        heading: "This enquiry is waiting on you",
        intro: "The lead below has not been updated recently.",
    },
    EmailTemplate {
        key: "weekly_digest",
        subject_prefix: "Weekly enquiry digest",
        heading: "Enquiry activity this week",
        intro: "Lead volume and outcomes for the trailing window.",
    },
];

/// Fund details carried into lead notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundContext {
    pub id: FundId,
    pub name: String,
}

impl FundContext {
    /// Name the fund from the directory, falling back to its id.
    pub fn lookup(funds: &dyn FundDirectory, fund_id: &FundId) -> Self {
        let name = match funds.fund(fund_id) {
            Ok(Some(record)) => record.name,
            Ok(None) => fund_id.0.clone(),
            Err(err) => {
                tracing::warn!(%fund_id, error = %err, "fund lookup failed; using id");
                fund_id.0.clone()
            }
        };
        Self {
            id: fund_id.clone(),
            name,
        }
    }
}

/// Tagged notification content; the variant fixes the email type.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPayload {
    NewEnquiry {
        enquiry: Enquiry,
        fund: FundContext,
    },
    EnquiryConfirmation {
        enquiry: Enquiry,
        fund: FundContext,
    },
    StatusChange {
        enquiry: Enquiry,
        fund: FundContext,
        previous: EnquiryStatus,
        actor: String,
    },
    StaleReminder {
        enquiry: Enquiry,
        fund: FundContext,
        days_since_update: i64,
    },
    WeeklyDigest {
        report: DigestReport,
    },
}

impl NotificationPayload {
    pub fn email_type(&self) -> EmailType {
        match self {
            NotificationPayload::NewEnquiry { .. } => EmailType::NewEnquiry,
            NotificationPayload::EnquiryConfirmation { .. } => EmailType::EnquiryConfirmation,
            NotificationPayload::StatusChange { .. } => EmailType::StatusChange,
            NotificationPayload::StaleReminder { .. } => EmailType::StaleReminder,
            NotificationPayload::WeeklyDigest { .. } => EmailType::WeeklyDigest,
        }
    }

    pub fn enquiry(&self) -> Option<&Enquiry> {
        match self {
            NotificationPayload::NewEnquiry { enquiry, .. }
            | NotificationPayload::EnquiryConfirmation { enquiry, .. }
            | NotificationPayload::StatusChange { enquiry, .. }
            | NotificationPayload::StaleReminder { enquiry, .. } => Some(enquiry),
            NotificationPayload::WeeklyDigest { .. } => None,
        }
    }

    pub fn enquiry_id(&self) -> Option<&EnquiryId> {
        self.enquiry().map(|enquiry| &enquiry.id)
    }

    pub fn fund_id(&self) -> Option<&FundId> {
        self.enquiry().map(|enquiry| &enquiry.fund_id)
    }

    fn headline(&self) -> String {
        match self {
            NotificationPayload::NewEnquiry { enquiry, fund } => {
                format!("{} ({})", fund.name, enquiry.contact.full_name())
            }
            NotificationPayload::EnquiryConfirmation { fund, .. } => fund.name.clone(),
            NotificationPayload::StatusChange {
                enquiry,
                fund,
                previous,
                ..
            } => format!("{} -> {} ({})", previous, enquiry.status, fund.name),
            NotificationPayload::StaleReminder {
                enquiry,
                days_since_update,
                ..
            } => format!(
                "{} ({} days without update)",
                enquiry.contact.full_name(),
                days_since_update
            ),
            NotificationPayload::WeeklyDigest { report } => format!(
                "{} new leads, {} won",
                report.totals.new_leads, report.totals.won_leads
            ),
        }
    }

    fn facts(&self) -> Vec<(String, String)> {
        let mut facts = Vec::new();
        match self {
            NotificationPayload::NewEnquiry { enquiry, fund }
            | NotificationPayload::EnquiryConfirmation { enquiry, fund } => {
                facts.push(("Fund".to_string(), fund.name.clone()));
                push_lead_facts(&mut facts, enquiry);
            }
            NotificationPayload::StatusChange {
                enquiry,
                fund,
                previous,
                actor,
            } => {
                facts.push(("Fund".to_string(), fund.name.clone()));
                facts.push(("Previous status".to_string(), previous.to_string()));
                facts.push(("New status".to_string(), enquiry.status.to_string()));
                facts.push(("Changed by".to_string(), actor.clone()));
                push_lead_facts(&mut facts, enquiry);
            }
            NotificationPayload::StaleReminder {
                enquiry,
                fund,
                days_since_update,
            } => {
                facts.push(("Fund".to_string(), fund.name.clone()));
                facts.push(("Status".to_string(), enquiry.status.to_string()));
                facts.push(("Days since update".to_string(), days_since_update.to_string()));
                push_lead_facts(&mut facts, enquiry);
            }
            NotificationPayload::WeeklyDigest { report } => {
                facts.push((
                    "Window".to_string(),
                    format!(
                        "{} to {}",
                        report.window_start.format("%Y-%m-%d"),
                        report.window_end.format("%Y-%m-%d")
                    ),
                ));
                facts.push(("New leads".to_string(), report.totals.new_leads.to_string()));
                facts.push(("Won".to_string(), report.totals.won_leads.to_string()));
                facts.push((
                    "Closed lost".to_string(),
                    report.totals.closed_lost_leads.to_string(),
                ));
                facts.push((
                    "Conversion".to_string(),
                    format_rate(report.totals.conversion_rate),
                ));
                facts.push((
                    "Status changes".to_string(),
                    report.status_changes.to_string(),
                ));
                for fund in &report.funds {
                    facts.push((
                        fund.fund_name.clone(),
                        format!(
                            "{} new, {} won, {} lost, {} conversion",
                            fund.new_leads,
                            fund.won_leads,
                            fund.closed_lost_leads,
                            format_rate(fund.conversion_rate)
                        ),
                    ));
                }
            }
        }
        facts
    }
}

fn push_lead_facts(facts: &mut Vec<(String, String)>, enquiry: &Enquiry) {
    facts.push(("Name".to_string(), enquiry.contact.full_name()));
    facts.push(("Email".to_string(), enquiry.contact.email.clone()));
    if let Some(phone) = &enquiry.contact.phone {
        facts.push(("Phone".to_string(), phone.clone()));
    }
    facts.push((
        "Investment range".to_string(),
        enquiry.investment_range.clone(),
    ));
    if !enquiry.interest_areas.is_empty() {
        let areas: Vec<&str> = enquiry.interest_areas.iter().map(String::as_str).collect();
        facts.push(("Interests".to_string(), areas.join(", ")));
    }
    facts.push(("Message".to_string(), enquiry.message.clone()));
}

/// `0.6667` -> `66.7%`.
pub fn format_rate(rate: f64) -> String {
    format!("{:.1}%", rate * 100.0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unable to render {email_type:?} email: {reason}")]
pub struct RenderError {
    pub email_type: EmailType,
    pub reason: String,
}

/// Rendering capability. Production deployments can plug in a richer HTML renderer.
pub trait TemplateRenderer: Send + Sync {
    fn render(
        &self,
        payload: &NotificationPayload,
        recipient: &Recipient,
    ) -> Result<RenderedEmail, RenderError>;
}

/// Plain renderer driven by the template table.
#[derive(Debug, Default, Clone, Copy)]
pub struct BasicTemplateRenderer;

impl TemplateRenderer for BasicTemplateRenderer {
    fn render(
        &self,
        payload: &NotificationPayload,
        recipient: &Recipient,
    ) -> Result<RenderedEmail, RenderError> {
        let template = payload.email_type().template();
        let subject = format!("{}: {}", template.subject_prefix, payload.headline());
        let facts = payload.facts();

        let mut text = format!(
            "Hello {},\n\n{}\n\n",
            recipient.display_name, template.intro
        );
        for (label, value) in &facts {
            let _ = writeln!(text, "{label}: {value}");
        }

        let mut rows = String::new();
        for (label, value) in &facts {
            let _ = write!(
                rows,
                "<tr><th align=\"left\">{}</th><td>{}</td></tr>",
                escape_html(label),
                escape_html(value)
            );
        }
        let html = format!(
            "<!DOCTYPE html>\n<html><body><h2>{}</h2><p>Hello {},</p><p>{}</p><table>{}</table></body></html>",
            escape_html(template.heading),
            escape_html(&recipient.display_name),
            escape_html(template.intro),
            rows
        );

        Ok(RenderedEmail {
            subject,
            html,
            text,
        })
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
