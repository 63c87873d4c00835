//! Delivery configuration and the sources it is read from.
//!
//! Configuration is a flat namespace of `Section:Key` strings, read through
//! the [`ConfigSource`] trait. [`DeliveryConfig::load`] pulls the
//! `EmailSettings:*` keys out of any source once per dispatch call.
//!
//! ## Keys
//!
//! | Key | Description |
//! |-----|-------------|
//! | `EmailSettings:SmtpServer` | Relay host |
//! | `EmailSettings:SmtpPort` | Relay port (nonzero) |
//! | `EmailSettings:Username` | SMTP username |
//! | `EmailSettings:Password` | SMTP password (never logged) |
//! | `EmailSettings:FromName` | Sender display name |
//! | `EmailSettings:FromEmail` | Sender address |
//! | `EmailSettings:MaxRetries` | Attempt limit (default: 3) |
//!
//! ## Sources
//!
//! ```rust,ignore
//! use courier::config::{EnvConfig, JsonConfig, Layered};
//!
//! // appsettings.json, overridden by EmailSettings__Password in the environment
//! let source = Layered::new()
//!     .with(EnvConfig::new())
//!     .with(JsonConfig::from_file("appsettings.json")?);
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;

use crate::error::MailError;

/// Recognized configuration keys.
pub mod keys {
    pub const SMTP_SERVER: &str = "EmailSettings:SmtpServer";
    pub const SMTP_PORT: &str = "EmailSettings:SmtpPort";
    pub const USERNAME: &str = "EmailSettings:Username";
    pub const PASSWORD: &str = "EmailSettings:Password";
    pub const FROM_NAME: &str = "EmailSettings:FromName";
    pub const FROM_EMAIL: &str = "EmailSettings:FromEmail";
    pub const MAX_RETRIES: &str = "EmailSettings:MaxRetries";
}

/// Attempt limit used when `EmailSettings:MaxRetries` is absent.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A read-only source of flat configuration values.
///
/// Implementations must be safe to read concurrently; the dispatcher reads
/// from the same source on every call.
pub trait ConfigSource: Send + Sync {
    /// Look up a value by its `Section:Key` name.
    fn get(&self, key: &str) -> Option<String>;
}

impl ConfigSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

impl ConfigSource for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        BTreeMap::get(self, key).cloned()
    }
}

impl<T: ConfigSource + ?Sized> ConfigSource for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }
}

// ============================================================================
// JSON
// ============================================================================

/// Configuration loaded from an `appsettings.json`-style document.
///
/// Nested objects are flattened with `:`; array elements are keyed by index.
/// Lookups are case-insensitive.
///
/// ```
/// use courier::config::{ConfigSource, JsonConfig};
///
/// let config = JsonConfig::from_json(r#"{"EmailSettings": {"SmtpPort": 587}}"#).unwrap();
/// assert_eq!(config.get("EmailSettings:SmtpPort").as_deref(), Some("587"));
/// assert_eq!(config.get("emailsettings:smtpport").as_deref(), Some("587"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonConfig {
    values: HashMap<String, String>,
}

impl JsonConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self, MailError> {
        let root: Value = serde_json::from_str(json)?;
        if !root.is_object() {
            return Err(MailError::Configuration(
                "JSON configuration root must be an object".into(),
            ));
        }

        let mut values = HashMap::new();
        flatten(None, &root, &mut values);
        Ok(Self { values })
    }

    /// Read and parse a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MailError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            MailError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }
}

impl FromStr for JsonConfig {
    type Err = MailError;

    fn from_str(json: &str) -> Result<Self, Self::Err> {
        Self::from_json(json)
    }
}

impl ConfigSource for JsonConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(&key.to_lowercase()).cloned()
    }
}

fn flatten(prefix: Option<&str>, value: &Value, out: &mut HashMap<String, String>) {
    let join = |key: &str| match prefix {
        Some(p) => format!("{}:{}", p, key),
        None => key.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten(Some(&join(key)), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten(Some(&join(&index.to_string())), child, out);
            }
        }
        Value::Null => {}
        Value::String(s) => {
            if let Some(p) = prefix {
                out.insert(p.to_lowercase(), s.clone());
            }
        }
        other => {
            if let Some(p) = prefix {
                out.insert(p.to_lowercase(), other.to_string());
            }
        }
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Configuration read from environment variables.
///
/// The `:` separator becomes `__`, so `EmailSettings:SmtpPort` is read from
/// `EmailSettings__SmtpPort`, falling back to `EMAILSETTINGS__SMTPPORT`.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    prefix: String,
}

impl EnvConfig {
    /// Read variables without a prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only read variables starting with `prefix` (e.g. `"COURIER_"`).
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace(':', "__"))
    }
}

impl ConfigSource for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        let name = self.var_name(key);
        std::env::var(&name)
            .or_else(|_| std::env::var(name.to_uppercase()))
            .ok()
    }
}

// ============================================================================
// Layering
// ============================================================================

/// A stack of sources; the first source holding a key wins.
#[derive(Default)]
pub struct Layered {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl Layered {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a lower-priority source.
    pub fn with(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl ConfigSource for Layered {
    fn get(&self, key: &str) -> Option<String> {
        self.sources.iter().find_map(|s| s.get(key))
    }
}

// ============================================================================
// DeliveryConfig
// ============================================================================

/// Settings for one dispatch call.
///
/// String fields may be blank after loading; the component that needs a
/// field rejects it with [`MailError::Configuration`].
#[derive(Clone)]
pub struct DeliveryConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
    pub from_email: String,
    pub max_retries: u32,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 0,
            username: String::new(),
            password: String::new(),
            from_name: String::new(),
            from_email: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl DeliveryConfig {
    /// Read the `EmailSettings:*` keys from a source.
    ///
    /// Fails only on values that cannot be parsed (a non-numeric port, a
    /// retry limit below 1). Missing strings load as empty.
    pub fn load(source: &dyn ConfigSource) -> Result<Self, MailError> {
        let max_retries = match parse_number::<i64>(source, keys::MAX_RETRIES)? {
            None => DEFAULT_MAX_RETRIES,
            Some(n) if n < 1 => {
                return Err(MailError::Configuration(format!(
                    "{} must be at least 1, got {}",
                    keys::MAX_RETRIES,
                    n
                )))
            }
            Some(n) => u32::try_from(n).map_err(|_| {
                MailError::Configuration(format!("{} is out of range: {}", keys::MAX_RETRIES, n))
            })?,
        };

        Ok(Self {
            smtp_host: string(source, keys::SMTP_SERVER),
            smtp_port: parse_number::<u16>(source, keys::SMTP_PORT)?.unwrap_or(0),
            username: string(source, keys::USERNAME),
            password: string(source, keys::PASSWORD),
            from_name: string(source, keys::FROM_NAME),
            from_email: string(source, keys::FROM_EMAIL),
            max_retries,
        })
    }

    /// Check the settings needed to open an authenticated relay session.
    pub fn check_transport_settings(&self) -> Result<(), MailError> {
        if self.smtp_host.trim().is_empty()
            || self.smtp_port == 0
            || self.username.trim().is_empty()
            || self.password.trim().is_empty()
        {
            return Err(MailError::Configuration(
                "incomplete transport settings".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for DeliveryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeliveryConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_name", &self.from_name)
            .field("from_email", &self.from_email)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

fn string(source: &dyn ConfigSource, key: &str) -> String {
    source.get(key).unwrap_or_default()
}

fn parse_number<T: std::str::FromStr>(
    source: &dyn ConfigSource,
    key: &str,
) -> Result<Option<T>, MailError> {
    match source.get(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| MailError::Configuration(format!("{} is not a valid number: {}", key, raw))),
        _ => Ok(None),
    }
}
