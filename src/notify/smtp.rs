use crate::config::SmtpConfig;
use crate::notify::{Mailer, OutboundEmail};
use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

#[derive(Clone)]
pub struct SmtpMailer {
    host: String,
    port: u16,
    credentials: Credentials,
    from: String,
}

impl SmtpMailer {
    pub fn new(host: &str, cfg: &SmtpConfig) -> Self {
        Self {
            host: host.to_string(),
            port: cfg.port,
            credentials: Credentials::new(cfg.username.clone(), cfg.password.clone()),
            from: cfg.from.clone(),
        }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        Ok(SmtpTransport::relay(&self.host)
            .context("smtp relay setup")?
            .port(self.port)
            .credentials(self.credentials.clone())
            .build())
    }
}

pub fn build_message(from: &str, email: OutboundEmail) -> Result<Message> {
    let mut related = MultiPart::related().singlepart(SinglePart::html(email.html_body));
    for (content_id, part) in email.inline {
        let content_type = ContentType::parse(&part.content_type)
            .map_err(|e| anyhow::anyhow!("bad content type {}: {e}", part.content_type))?;
        related = related.singlepart(Attachment::new_inline(content_id).body(part.bytes, content_type));
    }

    Ok(Message::builder()
        .from(from.parse().context("invalid from address")?)
        .to(email.to.parse().context("invalid recipient address")?)
        .subject(email.subject)
        .multipart(related)?)
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        let message = build_message(&self.from, email)?;
        let mailer = self.transport()?;

        // lettre's blocking transport, kept off the runtime threads.
        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .context("email task failed")?
            .context("smtp send failed")?;
        Ok(())
    }
}
