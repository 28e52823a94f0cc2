use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use lettre::message::Mailbox;
use tracing::info;

use crate::config::{SenderIdentity, SmtpConfig};
use crate::error::Error;

/// Email delivery seam. The pipeline hands over recipient, subject, and a
/// plain-text body; the implementation appends the signature block.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), Error>;
}

/// Plain-text signature from the configured sender identity. Empty optional
/// fields are left out entirely.
pub fn build_signature(sender: &SenderIdentity) -> String {
    let mut lines = vec![String::new(), "---".to_string(), sender.name.clone()];
    if let Some(phone) = &sender.phone {
        lines.push(format!("Phone: {phone}"));
    }
    if let Some(linkedin) = &sender.linkedin {
        lines.push(format!("LinkedIn: {linkedin}"));
    }
    if let Some(portfolio) = &sender.portfolio {
        lines.push(format!("Portfolio: {portfolio}"));
    }
    lines.join("\n")
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    sender: SenderIdentity,
}

impl SmtpMailer {
    pub fn new(cfg: &SmtpConfig, sender: SenderIdentity) -> Result<Self, Error> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .map_err(|e| Error::Config(format!("SMTP relay {}: {e}", cfg.host)))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.email.clone(), cfg.password.clone()))
            .build();
        let from = cfg
            .email
            .parse()
            .map_err(|e| Error::Config(format!("SMTP_EMAIL '{}': {e}", cfg.email)))?;
        Ok(Self {
            transport,
            from,
            sender,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), Error> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| Error::Transport(format!("recipient '{to}': {e}")))?;
        let full_body = format!("{body}\n{}", build_signature(&self.sender));

        let message = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(full_body)
            .map_err(|e| Error::Transport(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        info!(recipient = %to, "email sent");
        Ok(())
    }
}
