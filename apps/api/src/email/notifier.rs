//! SMTP notifier using lettre.
//!
//! Built once at startup from the optional SMTP config. Without one, every
//! call is skipped rather than failed.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SmtpConfig;
use crate::email::EmailMessage;

const SMTP_TIMEOUT: Duration = Duration::from_secs(30);
const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Sent,
    /// SMTP is not configured; nothing was attempted.
    Skipped,
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to build email: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}

/// Delivers notification e-mail.
///
/// Carried in `AppState` as `Arc<dyn Notifier>`.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: EmailMessage) -> Result<NotifyOutcome, NotifyError>;
}

struct Smtp {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

pub struct SmtpNotifier {
    smtp: Option<Smtp>,
}

impl SmtpNotifier {
    pub fn disabled() -> Self {
        Self { smtp: None }
    }

    pub fn from_config(config: Option<&SmtpConfig>) -> Result<Self, NotifyError> {
        let Some(config) = config else {
            return Ok(Self::disabled());
        };

        let from_address: Address = config
            .username
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(config.username.clone()))?;
        let from = Mailbox::new(Some(config.from_name.clone()), from_address);

        // 465 speaks TLS from the first byte; everything else upgrades via STARTTLS.
        let builder = if config.port == IMPLICIT_TLS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
        }
        .map_err(|e| NotifyError::Transport(format!("TLS configuration error: {e}")))?;

        let transport = builder
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(SMTP_TIMEOUT))
            .build();

        info!("SMTP notifier configured for {}:{}", config.host, config.port);
        Ok(Self {
            smtp: Some(Smtp { transport, from }),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.smtp.is_some()
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, message: EmailMessage) -> Result<NotifyOutcome, NotifyError> {
        let Some(smtp) = &self.smtp else {
            info!("Email not configured, skipping send to {}", message.to);
            return Ok(NotifyOutcome::Skipped);
        };

        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| NotifyError::InvalidAddress(message.to.clone()))?;

        let builder = Message::builder()
            .from(smtp.from.clone())
            .to(to)
            .subject(message.subject);

        let email = match message.html_body {
            Some(html) => builder.multipart(MultiPart::alternative_plain_html(message.text_body, html)),
            None => builder.singlepart(SinglePart::plain(message.text_body)),
        }
        .map_err(|e| NotifyError::Build(e.to_string()))?;

        debug!("Sending email to {}", message.to);
        match smtp.transport.send(email).await {
            Ok(_) => {
                info!("Email sent to {}", message.to);
                Ok(NotifyOutcome::Sent)
            }
            Err(e) => {
                warn!("Failed to send email to {}: {}", message.to, e);
                Err(NotifyError::Transport(e.to_string()))
            }
        }
    }
}
