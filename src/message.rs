//! Transport-neutral message and the builder that produces it.

use serde::Serialize;

use crate::address::Address;
use crate::error::MailError;
use crate::request::DeliveryRequest;

/// A message ready to hand to a [`Transport`](crate::Transport).
///
/// Built fresh for every attempt and dropped afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportMessage {
    /// Sender mailbox
    pub from: Address,
    /// Recipient mailbox
    pub to: Address,
    /// Subject line, verbatim
    pub subject: String,
    /// HTML body
    pub html_body: String,
}

/// Build a [`TransportMessage`] from a request and the sender identity.
///
/// Missing or invalid sender identity is a [`MailError::Configuration`];
/// an unparseable recipient is a [`MailError::InvalidAddress`]. Neither is
/// worth retrying.
///
/// ```
/// use courier::{build_message, DeliveryRequest};
///
/// let request = DeliveryRequest::new("user@example.com", "Hi", "<b>hello</b>").unwrap();
/// let message = build_message(&request, "Example", "noreply@example.com").unwrap();
/// assert_eq!(message.from.formatted(), "Example <noreply@example.com>");
/// assert_eq!(message.html_body, "<b>hello</b>");
/// ```
pub fn build_message(
    request: &DeliveryRequest,
    from_name: &str,
    from_email: &str,
) -> Result<TransportMessage, MailError> {
    if from_name.trim().is_empty() || from_email.trim().is_empty() {
        tracing::error!("FromName or FromEmail is missing in the configuration");
        return Err(MailError::Configuration("sender identity missing".into()));
    }

    let from = Address::parse_with_name(from_name, from_email).map_err(|e| {
        MailError::Configuration(format!("sender address is invalid: {}", e))
    })?;

    let to = Address::parse(request.recipient()).map_err(|e| {
        tracing::warn!(to = %request.recipient(), "Invalid recipient email address");
        e
    })?;

    Ok(TransportMessage {
        from,
        to,
        subject: request.subject().to_string(),
        html_body: request.body().to_string(),
    })
}
