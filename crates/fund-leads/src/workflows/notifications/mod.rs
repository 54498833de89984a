//! Notification rendering, delivery, and the append-only audit log.

pub mod dispatcher;
pub mod log;
pub mod provider;
pub mod queue;
pub mod templates;


pub use dispatcher::{DispatchResult, DispatchSettings, NotificationDispatcher, RecipientOutcome};
pub use log::{NotificationLog, NotificationLogRepository};
pub use provider::{
    EmailProvider, LettreEmailProvider, OutboundEmail, ProviderError, ProviderReceipt,
};
pub use queue::{NotificationJob, NotificationQueue, NotificationWorker, QueueError, WorkerStats};
pub use templates::{
    BasicTemplateRenderer, EmailTemplate, EmailType, FundContext, NotificationPayload,
    RenderError, RenderedEmail, TemplateRenderer,
};
