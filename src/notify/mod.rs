use anyhow::Result;
use std::collections::BTreeMap;

pub mod smtp;
pub mod ticket_email;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAttachment {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub subject: String,
    pub to: String,
    pub html_body: String,
    /// Keyed by content-id, referenced from the body as `cid:<id>`.
    pub inline: BTreeMap<String, InlineAttachment>,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutboundEmail) -> Result<()>;
}

/// Stand-in used when no SMTP host is configured.
pub struct LogMailer;

#[async_trait::async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutboundEmail) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            inline_parts = email.inline.len(),
            "smtp not configured, email logged instead of sent"
        );
        Ok(())
    }
}

pub fn mailer_from_config(cfg: &crate::config::SmtpConfig) -> std::sync::Arc<dyn Mailer> {
    match cfg.host.as_deref() {
        Some(host) => std::sync::Arc::new(smtp::SmtpMailer::new(host, cfg)),
        None => std::sync::Arc::new(LogMailer),
    }
}
