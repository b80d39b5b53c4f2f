//! Best-effort email delivery of compiled documents.
//!
//! Missing credentials are not an error: the notifier reports `Skipped` and
//! the job carries on. Send failures are returned so the pipeline can log
//! them, but the pipeline never fails a job because of them.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::info;

use crate::config::SmtpConfig;

const SUBJECT: &str = "Your Adapted CV";
const BODY: &str = "Please find attached your CV and cover letter adapted to the job description you provided.";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("Failed to read attachment {path}: {source}")]
    Attachment {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// No credentials configured.
    Skipped,
}

/// Delivers a set of files to a recipient.
///
/// Carried by the pipeline as `Arc<dyn Notifier>`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        recipient: &str,
        attachments: &[PathBuf],
    ) -> Result<NotifyOutcome, NotifyError>;
}

/// Sends mail over SMTP with implicit TLS (port 465 by default).
#[derive(Debug, Clone)]
pub struct SmtpNotifier {
    config: SmtpConfig,
}

impl SmtpNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(
        &self,
        recipient: &str,
        attachments: &[PathBuf],
    ) -> Result<NotifyOutcome, NotifyError> {
        let Some((username, password)) = self.config.credentials() else {
            info!("SMTP credentials not configured, skipping email to {recipient}");
            return Ok(NotifyOutcome::Skipped);
        };

        let from: Mailbox = username.parse()?;
        let to: Mailbox = recipient.parse()?;

        let mut parts = MultiPart::mixed().singlepart(SinglePart::plain(BODY.to_string()));
        for path in attachments {
            parts = parts.singlepart(pdf_attachment(path).await?);
        }

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(SUBJECT)
            .multipart(parts)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)?
            .port(self.config.port)
            .credentials(Credentials::new(username.to_string(), password.to_string()))
            .build();

        mailer.send(email).await?;
        info!("Email sent to {recipient} with {} attachment(s)", attachments.len());
        Ok(NotifyOutcome::Sent)
    }
}

async fn pdf_attachment(path: &Path) -> Result<SinglePart, NotifyError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| NotifyError::Attachment {
            path: path.to_path_buf(),
            source,
        })?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());

    Ok(Attachment::new(filename).body(bytes, pdf_content_type()))
}

fn pdf_content_type() -> ContentType {
    ContentType::parse("application/pdf").unwrap_or(ContentType::TEXT_PLAIN)
}
