//! Transport trait and send receipt types.
//!
//! # Architecture: Why `async_trait`?
//!
//! The dispatcher holds its transport as an `Arc<dyn Transport>` so the same
//! dispatcher type works with SMTP in production and an in-memory transport
//! in tests. Native async traits are not object-safe, so `#[async_trait]`
//! boxes the future. One allocation per attempt is nothing next to an SMTP
//! round trip.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DeliveryConfig;
use crate::error::MailError;
use crate::message::TransportMessage;

/// What the relay said when it accepted a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Message ID from the relay response, or a generated one.
    pub message_id: String,
}

impl SendReceipt {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
        }
    }

    /// Receipt with a freshly generated UUID.
    pub fn generated() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Result of a successful dispatch call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryResult {
    /// Message ID assigned by the relay
    pub message_id: String,
    /// Attempts used, including the successful one
    pub attempts: u32,
    /// When the relay accepted the message
    pub completed_at: DateTime<Utc>,
}

/// One delivery attempt against a relay.
///
/// Implementations open a session, send, and close it again within a single
/// call. Sessions are never kept between calls.
///
/// # Example
///
/// ```ignore
/// use courier::transports::SmtpTransport;
///
/// let transport = SmtpTransport::new();
/// let receipt = transport.send_once(&message, &config).await?;
/// println!("Relay accepted {}", receipt.message_id);
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform exactly one connect, authenticate, send, disconnect sequence.
    ///
    /// Failures reaching the relay are [`MailError::Transport`]; those are
    /// the only errors the dispatcher retries.
    async fn send_once(
        &self,
        message: &TransportMessage,
        config: &DeliveryConfig,
    ) -> Result<SendReceipt, MailError>;

    /// Check the configuration before any network work.
    ///
    /// Called by the dispatcher at the start of every attempt. The default
    /// requires host, port, username and password.
    fn validate_config(&self, config: &DeliveryConfig) -> Result<(), MailError> {
        config.check_transport_settings()
    }

    /// Get the transport name (for logging/debugging).
    fn transport_name(&self) -> &'static str {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_receipts_are_unique() {
        let a = SendReceipt::generated();
        let b = SendReceipt::generated();
        assert!(!a.message_id.is_empty());
        assert_ne!(a, b);
    }

    #[test]
    fn test_delivery_result_serializes() {
        let result = DeliveryResult {
            message_id: "abc".into(),
            attempts: 2,
            completed_at: Utc::now(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["message_id"], "abc");
        assert_eq!(json["attempts"], 2);
    }
}
