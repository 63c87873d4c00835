//! Logger transport that only logs messages.
//!
//! Useful for staging environments or dry runs where you want to see what
//! would be sent without contacting a relay.

use async_trait::async_trait;

use crate::config::DeliveryConfig;
use crate::error::MailError;
use crate::message::TransportMessage;
use crate::transport::{SendReceipt, Transport};

/// Transport that emits tracing events for messages.
#[derive(Debug, Clone, Default)]
pub struct LoggerTransport {
    /// If true, also log the HTML body at debug level.
    log_body: bool,
}

impl LoggerTransport {
    /// Create a logger transport with brief output.
    pub fn new() -> Self {
        Self { log_body: false }
    }

    /// Create a logger transport that also logs bodies.
    pub fn full() -> Self {
        Self { log_body: true }
    }
}

#[async_trait]
impl Transport for LoggerTransport {
    async fn send_once(
        &self,
        message: &TransportMessage,
        config: &DeliveryConfig,
    ) -> Result<SendReceipt, MailError> {
        let receipt = SendReceipt::generated();

        tracing::info!(
            message_id = %receipt.message_id,
            relay = %config.smtp_host,
            from = %message.from.formatted(),
            to = %message.to.email(),
            subject = %message.subject,
            "Email logged"
        );

        if self.log_body {
            tracing::debug!(body = %message.html_body, "HTML body");
        }

        Ok(receipt)
    }

    /// No relay is contacted, so no settings are required.
    fn validate_config(&self, _config: &DeliveryConfig) -> Result<(), MailError> {
        Ok(())
    }

    fn transport_name(&self) -> &'static str {
        "logger"
    }
}
