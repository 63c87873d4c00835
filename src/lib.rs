//! # Courier
//!
//! Send a single HTML email through an authenticated SMTP relay, retrying
//! transient failures with exponential backoff.
//!
//! ## Quick Start
//!
//! `appsettings.json`:
//! ```json
//! {
//!   "EmailSettings": {
//!     "SmtpServer": "smtp.example.com",
//!     "SmtpPort": 587,
//!     "Username": "mailer",
//!     "Password": "secret",
//!     "FromName": "My App",
//!     "FromEmail": "noreply@example.com",
//!     "MaxRetries": 3
//!   }
//! }
//! ```
//!
//! ```rust,ignore
//! use courier::{Dispatcher, config::JsonConfig, transports::SmtpTransport};
//!
//! let dispatcher = Dispatcher::new(JsonConfig::from_file("appsettings.json")?, SmtpTransport::new());
//!
//! match dispatcher.send_email("user@example.com", "Welcome!", "<h1>Hello</h1>").await {
//!     Ok(result) => println!("sent {} after {} attempt(s)", result.message_id, result.attempts),
//!     Err(e) => eprintln!("{} {}", e.status_code(), e.public_message()),
//! }
//! ```
//!
//! ## Retry Behavior
//!
//! | Failure | Retried? | Fault |
//! |---------|----------|-------|
//! | Blank input, bad recipient | No | client |
//! | Missing sender identity, incomplete SMTP settings, `MaxRetries < 1` | No | server |
//! | Connect, TLS, auth, relay rejection | Yes, `2^n` s apart | server once exhausted |
//!
//! ## Feature Flags
//!
//! - `smtp` (default) - SMTP transport via lettre
//! - `metrics` - Prometheus-style metrics (counters/histograms)
//!
//! ## Metrics
//!
//! Enable `features = ["metrics"]` to emit:
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `courier_attempts_total` | Counter | status (`success`, `failure`, `rejected`) | Individual send attempts |
//! | `courier_deliveries_total` | Counter | status | Dispatch calls by outcome |
//! | `courier_delivery_duration_seconds` | Histogram | | Dispatch duration, backoff included |
//!
//! Install a recorder (e.g., `metrics-exporter-prometheus`) in your app to collect them.

/// The version of the courier crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

mod address;
mod dispatcher;
mod error;
mod message;
mod request;
mod retry;
mod transport;

pub mod config;
pub mod observer;
pub mod transports;

// Re-exports
pub use address::Address;
pub use config::{ConfigSource, DeliveryConfig};
pub use dispatcher::Dispatcher;
pub use error::{Fault, MailError};
pub use message::{build_message, TransportMessage};
pub use observer::{DeliveryEvent, DeliveryObserver};
pub use request::DeliveryRequest;
pub use retry::RetryPolicy;
pub use transport::{DeliveryResult, SendReceipt, Transport};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::Address;
    pub use crate::ConfigSource;
    pub use crate::DeliveryConfig;
    pub use crate::DeliveryRequest;
    pub use crate::DeliveryResult;
    pub use crate::Dispatcher;
    pub use crate::MailError;
    pub use crate::Transport;
}
