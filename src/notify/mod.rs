//! Outbound notification sink.
//!
//! One trait seam over email delivery with an at-least-once, fire-and-forget
//! contract: a failed send is the caller's problem to log, never to
//! propagate into other recipients' work. `SmtpNotifier` delivers for real;
//! `LogNotifier` stands in when no SMTP settings are configured;
//! `MemoryNotifier` captures messages for tests.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tokio::sync::RwLock;
use tracing::info;

use crate::config::EmailConfig;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<()>;
}

// ─── SMTP ────────────────────────────────────────────────────────────────────

/// Real delivery via SMTP with STARTTLS and credential auth.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self> {
        let host = cfg.host.as_deref().context("SMTP host not configured")?;
        let username = cfg
            .username
            .as_deref()
            .context("SMTP username not configured")?;
        let password = cfg
            .password
            .as_deref()
            .context("SMTP password not configured")?;
        let from_address = cfg
            .from_address
            .as_deref()
            .context("SMTP from_address not configured")?;

        let creds = Credentials::new(username.to_string(), password.to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .context("failed to build SMTP transport")?
            .port(cfg.port)
            .credentials(creds)
            .build();

        let from: Mailbox = format!("{} <{}>", cfg.display_name, from_address)
            .parse()
            .with_context(|| format!("invalid from_address '{from_address}'"))?;

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<()> {
        let to: Mailbox = to
            .parse()
            .with_context(|| format!("invalid recipient address '{to}'"))?;
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body_html.to_string())?;
        self.transport.send(message).await?;
        Ok(())
    }
}

// ─── Fallbacks ───────────────────────────────────────────────────────────────

/// Used when no SMTP settings are present: logs the would-be send and
/// succeeds, so the rest of the pipeline behaves identically in development.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, _body_html: &str) -> Result<()> {
        info!(to, subject, "email delivery not configured — logging instead");
        Ok(())
    }
}

/// Captures sent messages in memory. Addresses listed in `failing` error out,
/// which is how tests exercise per-recipient failure isolation.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: RwLock<Vec<(String, String, String)>>,
    failing: Vec<String>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(addresses: Vec<String>) -> Self {
        Self {
            sent: RwLock::new(Vec::new()),
            failing: addresses,
        }
    }

    /// (recipient, subject, body) triples in send order.
    pub async fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, to: &str, subject: &str, body_html: &str) -> Result<()> {
        if self.failing.iter().any(|a| a == to) {
            anyhow::bail!("simulated delivery failure for {to}");
        }
        self.sent
            .write()
            .await
            .push((to.to_string(), subject.to_string(), body_html.to_string()));
        Ok(())
    }
}
