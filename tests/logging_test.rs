//! Log output produced by the default tracing observer.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use courier::config::keys;
use courier::transports::{LoggerTransport, MemoryTransport};
use courier::Dispatcher;

const PASSWORD: &str = "s3cr3t-pa55w0rd";

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
    fn output(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for Capture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn settings() -> HashMap<String, String> {
    [
        (keys::SMTP_SERVER, "smtp.example.com"),
        (keys::SMTP_PORT, "587"),
        (keys::USERNAME, "mailer"),
        (keys::PASSWORD, PASSWORD),
        (keys::FROM_NAME, "Example"),
        (keys::FROM_EMAIL, "noreply@example.com"),
        (keys::MAX_RETRIES, "2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn subscriber(capture: &Capture) -> impl tracing::Subscriber + Send + Sync {
    let writer = capture.clone();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish()
}

#[tokio::test(start_paused = true)]
async fn retry_and_exhaustion_are_logged_without_credentials() {
    let capture = Capture::default();
    let _guard = tracing::subscriber::set_default(subscriber(&capture));

    let transport = MemoryTransport::new();
    transport.fail_always("connection refused");
    let dispatcher = Dispatcher::new(settings(), transport);

    let _ = dispatcher
        .send_email("user@example.com", "Hi", "<b>hello</b>")
        .await;

    let output = capture.output();
    assert!(output.contains("Attempt 1: Failed to send email"), "{output}");
    assert!(output.contains("Max retry limit reached"), "{output}");
    assert!(output.contains("user@example.com"));
    assert!(output.contains("connection refused"));
    assert!(!output.contains(PASSWORD), "{output}");
}

#[tokio::test]
async fn success_is_logged_without_credentials() {
    let capture = Capture::default();
    let _guard = tracing::subscriber::set_default(subscriber(&capture));

    let dispatcher = Dispatcher::new(settings(), LoggerTransport::full());
    dispatcher
        .send_email("user@example.com", "Hi", "<b>hello</b>")
        .await
        .unwrap();

    let output = capture.output();
    assert!(output.contains("Email sent"), "{output}");
    assert!(output.contains("Email logged"));
    assert!(output.contains("courier.dispatch"));
    assert!(!output.contains(PASSWORD), "{output}");
}

#[tokio::test]
async fn rejected_input_is_logged() {
    let capture = Capture::default();
    let _guard = tracing::subscriber::set_default(subscriber(&capture));

    let dispatcher = Dispatcher::new(settings(), MemoryTransport::new());
    let _ = dispatcher.send_email("not-an-email", "Hi", "<b>hello</b>").await;

    let output = capture.output();
    assert!(output.contains("Email rejected before delivery"), "{output}");
    assert!(output.contains("Client"));
}
