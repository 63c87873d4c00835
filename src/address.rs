//! Mailbox address type with optional display name.

use crate::error::MailError;
use email_address::{EmailAddress, Options};
use serde::Serialize;
use std::fmt;

/// A validated mailbox: an email address with an optional display name.
///
/// Addresses are only built through [`Address::parse`] and
/// [`Address::parse_with_name`], so an `Address` always holds a
/// syntactically valid email.
///
/// # Examples
///
/// ```
/// use courier::Address;
///
/// let addr = Address::parse("user@example.com").unwrap();
/// assert_eq!(addr.email(), "user@example.com");
/// assert_eq!(addr.name(), None);
///
/// let addr = Address::parse("Alice <alice@example.com>").unwrap();
/// assert_eq!(addr.email(), "alice@example.com");
/// assert_eq!(addr.name(), Some("Alice"));
///
/// assert!(Address::parse("not-an-email").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Address {
    name: Option<String>,
    email: String,
}

impl Address {
    /// Parse and validate a mailbox.
    ///
    /// Accepts a bare address (`user@example.com`) or the display form
    /// (`Name <user@example.com>`). Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, MailError> {
        let input = input.trim();

        if let Some((name, email)) = split_display_form(input) {
            return Self::parse_with_name(name, email);
        }

        Self::validate(input)?;
        Ok(Self {
            name: None,
            email: input.to_string(),
        })
    }

    /// Parse and validate an email address with a display name.
    ///
    /// An empty name is treated as no name. Names containing control
    /// characters (CR, LF, ...) are rejected so they cannot inject headers.
    pub fn parse_with_name(name: &str, email: &str) -> Result<Self, MailError> {
        let email = email.trim();
        Self::validate(email)?;

        let name = name.trim().trim_matches('"');
        if name.chars().any(char::is_control) {
            return Err(MailError::InvalidAddress(format!(
                "display name for '{}' contains control characters",
                email
            )));
        }
        Ok(Self {
            name: if name.is_empty() {
                None
            } else {
                Some(name.to_string())
            },
            email: email.to_string(),
        })
    }

    /// Bare `local@domain` only: no display text, no `[ip]` domain literals.
    fn validate(email: &str) -> Result<(), MailError> {
        let options = Options::default()
            .without_display_text()
            .without_domain_literal();

        EmailAddress::parse_with_options(email, options)
            .map(|_| ())
            .map_err(|_| {
                MailError::InvalidAddress(format!("'{}' is not a valid email address", email))
            })
    }

    /// The display name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The bare email address.
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Convert the domain part of the email address to ASCII (Punycode).
    ///
    /// SMTP relays expect ASCII domains. The local part is preserved as-is.
    ///
    /// ```
    /// use courier::Address;
    ///
    /// let addr = Address::parse("user@example.com").unwrap();
    /// assert_eq!(addr.to_ascii().unwrap(), "user@example.com");
    /// ```
    pub fn to_ascii(&self) -> Result<String, MailError> {
        let (local_part, domain) = self.email.rsplit_once('@').ok_or_else(|| {
            MailError::InvalidAddress(format!("'{}' is missing @ symbol", self.email))
        })?;

        let ascii_domain = idna::domain_to_ascii(domain).map_err(|e| {
            MailError::InvalidAddress(format!(
                "Failed to convert domain '{}' to ASCII: {:?}",
                domain, e
            ))
        })?;

        Ok(format!("{}@{}", local_part, ascii_domain))
    }

    /// Format as "Name <email>" or just "email" if no name.
    pub fn formatted(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formatted())
    }
}

/// Split `Name <email>` into its parts.
fn split_display_form(input: &str) -> Option<(&str, &str)> {
    let inner = input.strip_suffix('>')?;
    let (name, email) = inner.rsplit_once('<')?;
    Some((name, email))
}
