//! Outbound email transport.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{
    Address, AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::{EmailConfig, EmailTransportConfig};

/// Fully rendered message addressed to a single mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReceipt {
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("unable to build message: {0}")]
    Build(String),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("send timed out after {0:?}")]
    Timeout(Duration),
    #[error("template rendering failed: {0}")]
    Render(String),
}

#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError>;
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

/// `lettre`-backed provider: SMTP in deployed environments, an `.eml` outbox otherwise.
pub struct LettreEmailProvider {
    transport: EmailTransport,
    from: Mailbox,
    message_domain: String,
}

impl LettreEmailProvider {
    pub fn new(config: &EmailConfig) -> Result<Self, ProviderError> {
        let transport = match &config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
            } => {
                let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|err| ProviderError::Transport(format!("smtp relay {host}: {err}")))?
                    .port(*port);
                if let (Some(username), Some(password)) = (username, password) {
                    builder =
                        builder.credentials(Credentials::new(username.clone(), password.clone()));
                }
                EmailTransport::Smtp(builder.build())
            }
            EmailTransportConfig::File { path } => {
                let dir = Path::new(path);
                std::fs::create_dir_all(dir).map_err(|err| {
                    ProviderError::Transport(format!("create outbox {path}: {err}"))
                })?;
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(dir))
            }
        };

        let from = mailbox(Some(&config.from_name), &config.from_email)?;
        let message_domain = config
            .from_email
            .split_once('@')
            .map(|(_, domain)| domain.to_string())
            .unwrap_or_else(|| "localhost".to_string());

        Ok(Self {
            transport,
            from,
            message_domain,
        })
    }

    fn build_message(&self, email: OutboundEmail, message_id: &str) -> Result<Message, ProviderError> {
        let to = mailbox(email.to_name.as_deref(), &email.to)?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject)
            .message_id(Some(message_id.to_string()))
            .multipart(MultiPart::alternative_plain_html(email.text, email.html))
            .map_err(|err| ProviderError::Build(err.to_string()))
    }
}

/// Display names go through lettre's quoting, so commas and other specials are allowed.
fn mailbox(name: Option<&str>, email: &str) -> Result<Mailbox, ProviderError> {
    let address = email
        .trim()
        .parse::<Address>()
        .map_err(|err| ProviderError::Address(format!("{email}: {err}")))?;
    let name = name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    Ok(Mailbox::new(name, address))
}

#[async_trait]
impl EmailProvider for LettreEmailProvider {
    async fn send(&self, email: OutboundEmail) -> Result<ProviderReceipt, ProviderError> {
        let message_id = format!("<{}@{}>", uuid::Uuid::new_v4(), self.message_domain);
        let message = self.build_message(email, &message_id)?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message)
                    .await
                    .map_err(|err| ProviderError::Transport(err.to_string()))?;
            }
            EmailTransport::File(file) => {
                file.send(message)
                    .await
                    .map_err(|err| ProviderError::Transport(err.to_string()))?;
            }
        }

        Ok(ProviderReceipt { message_id })
    }
}
