//! Inbound delivery request.

use serde::{Deserialize, Serialize};

use crate::error::MailError;

/// A single-recipient send request: who, what subject, what HTML body.
///
/// Construction validates that every field is non-blank. Recipient syntax
/// is checked again when the message is built.
///
/// ```
/// use courier::DeliveryRequest;
///
/// let request = DeliveryRequest::new("user@example.com", "Hi", "<b>hello</b>").unwrap();
/// assert_eq!(request.recipient(), "user@example.com");
///
/// assert!(DeliveryRequest::new("user@example.com", "   ", "body").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRequest")]
pub struct DeliveryRequest {
    #[serde(rename = "to")]
    recipient: String,
    subject: String,
    body: String,
}

impl DeliveryRequest {
    /// Create a validated request.
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Result<Self, MailError> {
        let request = Self {
            recipient: to.into(),
            subject: subject.into(),
            body: body.into(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Check that recipient, subject and body are all non-blank.
    pub fn validate(&self) -> Result<(), MailError> {
        if self.recipient.trim().is_empty() {
            return Err(MailError::InvalidInput(
                "Recipient email address cannot be empty".into(),
            ));
        }
        if self.subject.trim().is_empty() {
            return Err(MailError::InvalidInput(
                "Email subject cannot be empty".into(),
            ));
        }
        if self.body.trim().is_empty() {
            return Err(MailError::InvalidInput("Email body cannot be empty".into()));
        }
        Ok(())
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// HTML body.
    pub fn body(&self) -> &str {
        &self.body
    }
}

#[derive(Deserialize)]
struct RawRequest {
    #[serde(default)]
    to: String,
    #[serde(default)]
    subject: String,
    #[serde(default)]
    body: String,
}

impl TryFrom<RawRequest> for DeliveryRequest {
    type Error = MailError;

    fn try_from(raw: RawRequest) -> Result<Self, Self::Error> {
        Self::new(raw.to, raw.subject, raw.body)
    }
}
