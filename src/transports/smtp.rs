//! SMTP relay transport using lettre.
//!
//! Every call to [`send_once`](crate::Transport::send_once) builds a fresh,
//! unpooled lettre transport from the current [`DeliveryConfig`]. lettre
//! connects, negotiates TLS, authenticates, sends and issues `QUIT` inside
//! the send future; the connection is owned by that future, so the socket is
//! released on every exit path.
//!
//! # Example
//!
//! ```rust,ignore
//! use courier::transports::{SmtpTransport, TlsMode};
//!
//! // Implicit TLS on 465, STARTTLS when offered elsewhere
//! let transport = SmtpTransport::new();
//!
//! // Refuse to send unless the relay upgrades the connection
//! let strict = SmtpTransport::new().tls(TlsMode::StartTls);
//! ```

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::{
        authentication::Credentials,
        client::{Tls, TlsParameters},
    },
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::address::Address;
use crate::config::DeliveryConfig;
use crate::error::MailError;
use crate::message::TransportMessage;
use crate::transport::{SendReceipt, Transport};

/// Network timeout applied to each SMTP command.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Port conventionally used for implicit TLS.
const SUBMISSIONS_PORT: u16 = 465;

/// How the session is secured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Implicit TLS on port 465, opportunistic STARTTLS on any other port.
    #[default]
    Auto,
    /// Upgrade with STARTTLS if the relay offers it, else continue in plaintext.
    Opportunistic,
    /// STARTTLS required; fail if the relay does not offer it.
    StartTls,
    /// Implicit TLS from the first byte.
    Tls,
    /// No TLS (dangerous, only for local test relays).
    None,
}

impl TlsMode {
    /// Resolve [`TlsMode::Auto`] against the configured port.
    pub fn resolve(self, port: u16) -> TlsMode {
        match self {
            TlsMode::Auto if port == SUBMISSIONS_PORT => TlsMode::Tls,
            TlsMode::Auto => TlsMode::Opportunistic,
            other => other,
        }
    }
}

/// SMTP relay transport.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    tls: TlsMode,
    timeout: Option<Duration>,
}

impl Default for SmtpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtpTransport {
    /// Create a transport with [`TlsMode::Auto`] and the default timeout.
    pub fn new() -> Self {
        Self {
            tls: TlsMode::Auto,
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Set TLS mode.
    pub fn tls(mut self, mode: TlsMode) -> Self {
        self.tls = mode;
        self
    }

    /// Set the per-command network timeout (`None` waits forever).
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build a single-use lettre transport for one attempt.
    fn session(
        &self,
        config: &DeliveryConfig,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, MailError> {
        let tls = match self.tls.resolve(config.smtp_port) {
            TlsMode::None => Tls::None,
            TlsMode::Tls => Tls::Wrapper(TlsParameters::new(config.smtp_host.clone())?),
            TlsMode::StartTls => Tls::Required(TlsParameters::new(config.smtp_host.clone())?),
            TlsMode::Opportunistic | TlsMode::Auto => {
                Tls::Opportunistic(TlsParameters::new(config.smtp_host.clone())?)
            }
        };

        Ok(
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .tls(tls)
                .credentials(Credentials::new(
                    config.username.clone(),
                    config.password.clone(),
                ))
                .timeout(self.timeout)
                .build(),
        )
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send_once(
        &self,
        message: &TransportMessage,
        config: &DeliveryConfig,
    ) -> Result<SendReceipt, MailError> {
        self.validate_config(config)?;

        let email = build_lettre_message(message)?;
        let session = self.session(config)?;

        tracing::debug!(
            host = %config.smtp_host,
            port = config.smtp_port,
            tls = ?self.tls.resolve(config.smtp_port),
            "Opening SMTP session"
        );

        let response = session.send(email).await.map_err(|e| {
            MailError::Transport(format!(
                "{}:{}: {}",
                config.smtp_host, config.smtp_port, e
            ))
        })?;

        // Extract message ID from SMTP response, or generate one
        let receipt = response
            .message()
            .next()
            .and_then(|m| m.lines().next())
            .map(SendReceipt::new)
            .unwrap_or_else(SendReceipt::generated);

        Ok(receipt)
    }

    fn transport_name(&self) -> &'static str {
        "smtp"
    }
}

/// Build a lettre `Message` with a single HTML part.
fn build_lettre_message(message: &TransportMessage) -> Result<Message, MailError> {
    let email = Message::builder()
        .from(address_to_mailbox(&message.from)?)
        .to(address_to_mailbox(&message.to)?)
        .subject(message.subject.clone())
        .header(ContentType::TEXT_HTML)
        .body(message.html_body.clone())?;

    Ok(email)
}

/// Convert our Address to lettre's Mailbox, punycoding the domain.
fn address_to_mailbox(addr: &Address) -> Result<Mailbox, MailError> {
    let email: lettre::Address = addr.to_ascii()?.parse()?;
    Ok(Mailbox::new(addr.name().map(str::to_string), email))
}
