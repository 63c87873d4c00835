//! In-memory transport for development and testing.
//!
//! Stores accepted messages instead of talking to a relay, and can be
//! scripted to fail so retry behavior can be exercised without a network.
//!
//! # Testing Usage
//!
//! ```rust,ignore
//! use courier::transports::MemoryTransport;
//!
//! let transport = MemoryTransport::new();
//! transport.fail_next(2, "connection refused");
//!
//! let dispatcher = Dispatcher::new(config, transport.clone());
//! dispatcher.send_email("user@example.com", "Hi", "<b>hello</b>").await?;
//!
//! assert_eq!(transport.attempts(), 3);
//! assert_eq!(transport.sent().len(), 1);
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::config::DeliveryConfig;
use crate::error::MailError;
use crate::message::TransportMessage;
use crate::transport::{SendReceipt, Transport};

#[derive(Debug, Default)]
struct Inner {
    sent: Mutex<Vec<TransportMessage>>,
    attempted_at: Mutex<Vec<Instant>>,
    /// Errors returned by the next attempts, in order.
    script: Mutex<VecDeque<MailError>>,
    /// If set, every attempt fails with this error once the script is empty.
    fail_always: Mutex<Option<MailError>>,
}

/// Transport that records messages in memory.
///
/// Clones share the same storage, so a test can keep one handle while the
/// dispatcher owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Inner>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Failure Simulation
    // =========================================================================

    /// Fail the next `n` attempts with a transport error.
    pub fn fail_next(&self, n: usize, message: impl Into<String>) {
        let message = message.into();
        let mut script = self.inner.script.lock();
        for _ in 0..n {
            script.push_back(MailError::Transport(message.clone()));
        }
    }

    /// Fail the next attempt with a specific error.
    pub fn push_failure(&self, error: MailError) {
        self.inner.script.lock().push_back(error);
    }

    /// Fail every attempt with a transport error.
    pub fn fail_always(&self, message: impl Into<String>) {
        *self.inner.fail_always.lock() = Some(MailError::Transport(message.into()));
    }

    /// Clear scripted and permanent failures.
    pub fn clear_failure(&self) {
        self.inner.script.lock().clear();
        *self.inner.fail_always.lock() = None;
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Number of `send_once` calls, successful or not.
    pub fn attempts(&self) -> usize {
        self.inner.attempted_at.lock().len()
    }

    /// When each attempt started, oldest first.
    pub fn attempted_at(&self) -> Vec<Instant> {
        self.inner.attempted_at.lock().clone()
    }

    /// Accepted messages, oldest first.
    pub fn sent(&self) -> Vec<TransportMessage> {
        self.inner.sent.lock().clone()
    }

    /// Most recently accepted message.
    pub fn last_sent(&self) -> Option<TransportMessage> {
        self.inner.sent.lock().last().cloned()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send_once(
        &self,
        message: &TransportMessage,
        _config: &DeliveryConfig,
    ) -> Result<SendReceipt, MailError> {
        self.inner.attempted_at.lock().push(Instant::now());

        if let Some(error) = self.inner.script.lock().pop_front() {
            return Err(error);
        }
        if let Some(error) = self.inner.fail_always.lock().clone() {
            return Err(error);
        }

        self.inner.sent.lock().push(message.clone());
        Ok(SendReceipt::generated())
    }

    fn transport_name(&self) -> &'static str {
        "memory"
    }
}
