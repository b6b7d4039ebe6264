//! Outbound email for OTP delivery.
//!
//! Delivery is best-effort: callers get a `Delivery` value they may inspect or
//! drop, and a failed send never undoes the write that triggered it.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{info, warn};

use crate::config::SmtpConfig;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outcome of a best-effort send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed(String),
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Sends and folds any error into `Delivery::Failed`.
pub async fn deliver(notifier: &dyn Notifier, message: &EmailMessage) -> Delivery {
    match notifier.send(message).await {
        Ok(()) => Delivery::Sent,
        Err(e) => {
            warn!(to = %message.to, error = %e, "email delivery failed");
            Delivery::Failed(e.to_string())
        }
    }
}

/// Used when SMTP is not configured: writes the message to the log.
#[derive(Clone, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            body = %message.body,
            "smtp not configured; email logged instead of sent"
        );
        Ok(())
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .with_context(|| format!("smtp relay {}", cfg.host))?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .timeout(Some(Duration::from_secs(10)))
            .build();
        Ok(Self {
            transport,
            from: cfg.username.clone(),
        })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let email = Message::builder()
            .from(self.from.parse().context("parse from address")?)
            .to(message.to.parse().context("parse recipient address")?)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("build email")?;
        self.transport.send(email).await.context("smtp send")?;
        Ok(())
    }
}

/// SMTP when credentials are present, otherwise the log fallback.
pub fn from_config(smtp: Option<&SmtpConfig>) -> anyhow::Result<Arc<dyn Notifier>> {
    match smtp {
        Some(cfg) => Ok(Arc::new(SmtpNotifier::new(cfg)?)),
        None => {
            warn!("SMTP_EMAIL/SMTP_PASSWORD not set; OTP emails will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}
