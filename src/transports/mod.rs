//! Transport implementations.
//!
//! Each transport implements the [`Transport`](crate::Transport) trait.
//!
//! ## Available Transports
//!
//! | Transport | Feature Flag | Description |
//! |-----------|-------------|-------------|
//! | [`SmtpTransport`] | `smtp` | Authenticated SMTP relay via lettre |
//! | [`MemoryTransport`] | (none) | In-memory storage with scripted failures |
//! | [`LoggerTransport`] | (none) | Logs messages without sending |

#[cfg(feature = "smtp")]
mod smtp;
#[cfg(feature = "smtp")]
pub use smtp::{SmtpTransport, TlsMode, DEFAULT_TIMEOUT};

mod memory;
pub use memory::MemoryTransport;

mod logger;
pub use logger::LoggerTransport;
