//! The mail dispatcher: build, send, retry.
//!
//! [`Dispatcher::dispatch`] runs one delivery call:
//!
//! 1. Load [`DeliveryConfig`] from the configuration source.
//! 2. For each attempt: build the message, validate transport settings,
//!    call [`Transport::send_once`].
//! 3. On a transport error, back off `2^n` units and try again until
//!    `MaxRetries` attempts have been made.
//!
//! Input and configuration errors end the call immediately without using
//! the retry budget. Attempts within a call are strictly sequential; calls
//! are independent and can run concurrently on a shared dispatcher.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::Instrument;

#[cfg(feature = "metrics")]
use std::time::Instant;

use crate::config::{ConfigSource, DeliveryConfig};
use crate::error::MailError;
use crate::message::build_message;
use crate::observer::{DeliveryEvent, DeliveryObserver, TracingObserver};
use crate::request::DeliveryRequest;
use crate::retry::{AttemptState, RetryPolicy, Step, DEFAULT_BACKOFF_UNIT};
use crate::transport::{DeliveryResult, SendReceipt, Transport};

/// Sends single-recipient HTML emails with bounded retry.
///
/// ```rust,ignore
/// use courier::{Dispatcher, config::JsonConfig, transports::SmtpTransport};
///
/// let dispatcher = Dispatcher::new(
///     JsonConfig::from_file("appsettings.json")?,
///     SmtpTransport::new(),
/// );
///
/// dispatcher
///     .send_email("user@example.com", "Welcome!", "<h1>Hello</h1>")
///     .await?;
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    config: Arc<dyn ConfigSource>,
    transport: Arc<dyn Transport>,
    observer: Arc<dyn DeliveryObserver>,
    backoff_unit: Duration,
}

impl Dispatcher {
    /// Create a dispatcher reporting to [`TracingObserver`].
    pub fn new(config: impl ConfigSource + 'static, transport: impl Transport + 'static) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
            observer: Arc::new(TracingObserver),
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }

    /// Report delivery events to a different observer.
    pub fn with_observer(mut self, observer: impl DeliveryObserver + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Set the backoff unit (default: one second).
    pub fn backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    /// Validate `(to, subject, body)` and dispatch it.
    pub async fn send_email(
        &self,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<DeliveryResult, MailError> {
        let request = DeliveryRequest::new(to, subject, body).map_err(|e| {
            self.notify(DeliveryEvent::Aborted {
                recipient: to.to_string(),
                error: e.clone(),
            });
            e
        })?;
        self.dispatch(&request).await
    }

    /// Deliver a request, retrying transient transport failures.
    pub async fn dispatch(&self, request: &DeliveryRequest) -> Result<DeliveryResult, MailError> {
        let span = tracing::info_span!(
            "courier.dispatch",
            transport = self.transport.transport_name(),
            to = %request.recipient(),
        );

        async {
            #[cfg(feature = "metrics")]
            let start = Instant::now();

            let result = self.run(request).await;

            #[cfg(feature = "metrics")]
            {
                let status = match &result {
                    Ok(_) => "delivered",
                    Err(MailError::DeliveryFailed { .. }) => "failed",
                    Err(_) => "rejected",
                };
                metrics::counter!("courier_deliveries_total", "status" => status).increment(1);
                metrics::histogram!("courier_delivery_duration_seconds")
                    .record(start.elapsed().as_secs_f64());
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn run(&self, request: &DeliveryRequest) -> Result<DeliveryResult, MailError> {
        let recipient = request.recipient();

        let loaded = DeliveryConfig::load(self.config.as_ref()).and_then(|config| {
            let policy = RetryPolicy::new(config.max_retries, self.backoff_unit)?;
            Ok((config, policy))
        });
        let (config, policy) = match loaded {
            Ok(loaded) => loaded,
            Err(error) => return Err(self.abort(recipient, error)),
        };

        let mut state = AttemptState::new(policy);

        loop {
            tracing::debug!(
                attempt = state.attempt_number() + 1,
                last_error = ?state.last_error(),
                "Attempting delivery"
            );

            let outcome = self.attempt(request, &config).await;
            record_attempt(attempt_status(&outcome));

            let error = match outcome {
                Ok(receipt) => {
                    let result = DeliveryResult {
                        message_id: receipt.message_id,
                        attempts: state.attempt_number() + 1,
                        completed_at: Utc::now(),
                    };
                    self.notify(DeliveryEvent::Delivered {
                        recipient: recipient.to_string(),
                        attempts: result.attempts,
                        message_id: result.message_id.clone(),
                        completed_at: result.completed_at,
                    });
                    return Ok(result);
                }
                Err(error) if !error.is_retryable() => return Err(self.abort(recipient, error)),
                Err(error) => error,
            };

            match state.record_failure(error.clone()) {
                Step::Retry { delay } => {
                    self.notify(DeliveryEvent::AttemptFailed {
                        recipient: recipient.to_string(),
                        attempt: state.attempt_number(),
                        max_attempts: state.max_attempts(),
                        error,
                        retry_in: Some(delay),
                    });
                    tokio::time::sleep(delay).await;
                }
                Step::Exhausted(terminal) => {
                    self.notify(DeliveryEvent::AttemptFailed {
                        recipient: recipient.to_string(),
                        attempt: state.attempt_number(),
                        max_attempts: state.max_attempts(),
                        error: error.clone(),
                        retry_in: None,
                    });
                    self.notify(DeliveryEvent::Exhausted {
                        recipient: recipient.to_string(),
                        attempts: state.attempt_number(),
                        error,
                    });
                    return Err(terminal);
                }
            }
        }
    }

    /// One attempt: fresh message, settings check, single send.
    async fn attempt(
        &self,
        request: &DeliveryRequest,
        config: &DeliveryConfig,
    ) -> Result<SendReceipt, MailError> {
        let message = build_message(request, &config.from_name, &config.from_email)?;
        self.transport.validate_config(config)?;
        self.transport.send_once(&message, config).await
    }

    fn abort(&self, recipient: &str, error: MailError) -> MailError {
        self.notify(DeliveryEvent::Aborted {
            recipient: recipient.to_string(),
            error: error.clone(),
        });
        error
    }

    fn notify(&self, event: DeliveryEvent) {
        self.observer.on_event(&event);
    }
}

/// Label for one attempt's outcome in `courier_attempts_total`.
fn attempt_status(outcome: &Result<SendReceipt, MailError>) -> &'static str {
    match outcome {
        Ok(_) => "success",
        Err(e) if e.is_retryable() => "failure",
        Err(_) => "rejected",
    }
}

#[cfg(feature = "metrics")]
fn record_attempt(status: &'static str) {
    metrics::counter!("courier_attempts_total", "status" => status).increment(1);
}

#[cfg(not(feature = "metrics"))]
fn record_attempt(_status: &'static str) {}
