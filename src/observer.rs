//! Delivery events and the sinks that receive them.
//!
//! The dispatcher never configures logging itself. It reports what happens
//! to an injected [`DeliveryObserver`]; the default [`TracingObserver`]
//! forwards to `tracing`, and the application decides where that goes.
//!
//! Events carry recipients, attempt counts and error text only. Credentials
//! are never part of an event.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::MailError;

/// Something that happened during a dispatch call.
#[derive(Debug, Clone)]
pub enum DeliveryEvent {
    /// An attempt failed with a transient error.
    AttemptFailed {
        recipient: String,
        attempt: u32,
        max_attempts: u32,
        error: MailError,
        /// Backoff before the next attempt; `None` when this was the last one.
        retry_in: Option<Duration>,
    },
    /// The relay accepted the message.
    Delivered {
        recipient: String,
        attempts: u32,
        message_id: String,
        completed_at: DateTime<Utc>,
    },
    /// Every allowed attempt failed.
    Exhausted {
        recipient: String,
        attempts: u32,
        error: MailError,
    },
    /// A non-retryable error (bad input, bad configuration) ended the call.
    Aborted { recipient: String, error: MailError },
}

/// Sink for [`DeliveryEvent`]s.
pub trait DeliveryObserver: Send + Sync {
    fn on_event(&self, event: &DeliveryEvent);
}

impl<T: DeliveryObserver + ?Sized> DeliveryObserver for Arc<T> {
    fn on_event(&self, event: &DeliveryEvent) {
        (**self).on_event(event)
    }
}

/// Observer that emits `tracing` events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl DeliveryObserver for TracingObserver {
    fn on_event(&self, event: &DeliveryEvent) {
        match event {
            DeliveryEvent::AttemptFailed {
                recipient,
                attempt,
                max_attempts,
                error,
                retry_in,
            } => tracing::warn!(
                to = %recipient,
                attempt,
                max_attempts,
                error = %error,
                retry_in_secs = retry_in.map(|d| d.as_secs_f64()),
                "Attempt {}: Failed to send email",
                attempt
            ),
            DeliveryEvent::Delivered {
                recipient,
                attempts,
                message_id,
                completed_at,
            } => tracing::info!(
                to = %recipient,
                attempts,
                message_id = %message_id,
                completed_at = %completed_at.to_rfc3339(),
                "Email sent"
            ),
            DeliveryEvent::Exhausted {
                recipient,
                attempts,
                error,
            } => tracing::error!(
                to = %recipient,
                attempts,
                error = %error,
                "Max retry limit reached, email not sent"
            ),
            DeliveryEvent::Aborted { recipient, error } => tracing::error!(
                to = %recipient,
                error = %error,
                fault = ?error.fault(),
                "Email rejected before delivery"
            ),
        }
    }
}

/// Observer that keeps every event in memory.
///
/// ```
/// use courier::observer::{DeliveryObserver, RecordingObserver};
///
/// let observer = RecordingObserver::new();
/// assert!(observer.events().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DeliveryEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared observer, ready to hand to a dispatcher.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// All events, oldest first.
    pub fn events(&self) -> Vec<DeliveryEvent> {
        self.events.lock().clone()
    }

    /// Backoff delays that were scheduled, in order.
    pub fn retry_delays(&self) -> Vec<Duration> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                DeliveryEvent::AttemptFailed { retry_in, .. } => *retry_in,
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl DeliveryObserver for RecordingObserver {
    fn on_event(&self, event: &DeliveryEvent) {
        self.events.lock().push(event.clone());
    }
}
