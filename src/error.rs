//! Error types for courier.

use thiserror::Error;

/// Who is at fault for a failed delivery.
///
/// An HTTP layer maps [`Fault::Client`] to a 4xx response and
/// [`Fault::Server`] to a 5xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The caller supplied bad input.
    Client,
    /// Configuration or delivery failed on our side.
    Server,
}

/// Errors that can occur when dispatching an email.
#[derive(Debug, Clone, Error)]
pub enum MailError {
    /// Blank or malformed recipient, subject, or body.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Recipient string is not a syntactically valid mailbox.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Required configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Connect, TLS, authentication, or relay rejection during one attempt.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Every allowed attempt failed with a transport error.
    #[error("Failed to send email after {attempts} attempts: {source}")]
    DeliveryFailed {
        attempts: u32,
        #[source]
        source: Box<MailError>,
    },
}

impl MailError {
    /// Create a delivery failure wrapping the last transport error.
    pub fn delivery_failed(attempts: u32, last: MailError) -> Self {
        Self::DeliveryFailed {
            attempts,
            source: Box::new(last),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Only transport errors are transient. Bad input and bad configuration
    /// stay bad no matter how often they are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Classify the error as a client or server fault.
    pub fn fault(&self) -> Fault {
        match self {
            Self::InvalidInput(_) | Self::InvalidAddress(_) => Fault::Client,
            Self::Configuration(_) | Self::Transport(_) | Self::DeliveryFailed { .. } => {
                Fault::Server
            }
        }
    }

    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self.fault() {
            Fault::Client => 400,
            Fault::Server => 500,
        }
    }

    /// Message suitable for returning to an external caller.
    ///
    /// Client faults echo the validation message. Server faults return a
    /// generic message so internal causes (hosts, relay responses) stay in
    /// the logs.
    pub fn public_message(&self) -> String {
        match self.fault() {
            Fault::Client => self.to_string(),
            Fault::Server => {
                "An error occurred while sending the email. Please try again later.".to_string()
            }
        }
    }

    /// Number of attempts made before a terminal delivery failure.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::DeliveryFailed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// The underlying cause of a terminal delivery failure.
    pub fn last_cause(&self) -> Option<&MailError> {
        match self {
            Self::DeliveryFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for MailError {
    fn from(err: serde_json::Error) -> Self {
        Self::Configuration(format!("invalid JSON configuration: {}", err))
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::error::Error> for MailError {
    fn from(err: lettre::error::Error) -> Self {
        Self::InvalidInput(format!("message could not be encoded: {}", err))
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::transport::smtp::Error> for MailError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

#[cfg(feature = "smtp")]
impl From<lettre::address::AddressError> for MailError {
    fn from(err: lettre::address::AddressError) -> Self {
        Self::InvalidAddress(err.to_string())
    }
}
