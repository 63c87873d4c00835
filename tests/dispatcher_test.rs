//! Dispatcher retry behavior against an in-memory transport.
//!
//! Backoff tests run on a paused tokio clock, so `2^n` second waits complete
//! instantly while still being measurable through `tokio::time::Instant`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use courier::config::keys;
use courier::observer::RecordingObserver;
use courier::transports::MemoryTransport;
use courier::{DeliveryEvent, DeliveryRequest, Dispatcher, MailError};
use tokio::time::Instant;

fn settings(max_retries: u32) -> HashMap<String, String> {
    [
        (keys::SMTP_SERVER, "smtp.example.com".to_string()),
        (keys::SMTP_PORT, "587".to_string()),
        (keys::USERNAME, "mailer".to_string()),
        (keys::PASSWORD, "secret".to_string()),
        (keys::FROM_NAME, "Example".to_string()),
        (keys::FROM_EMAIL, "noreply@example.com".to_string()),
        (keys::MAX_RETRIES, max_retries.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn without(mut settings: HashMap<String, String>, key: &str) -> HashMap<String, String> {
    settings.remove(key);
    settings
}

fn gaps(instants: &[Instant]) -> Vec<Duration> {
    instants.windows(2).map(|w| w[1] - w[0]).collect()
}

fn assert_gaps(instants: &[Instant], expected_secs: &[u64]) {
    let actual = gaps(instants);
    assert_eq!(actual.len(), expected_secs.len(), "gaps: {:?}", actual);
    for (gap, secs) in actual.iter().zip(expected_secs) {
        let expected = Duration::from_secs(*secs);
        assert!(
            *gap >= expected && *gap < expected + Duration::from_millis(50),
            "expected ~{:?}, got {:?}",
            expected,
            gap
        );
    }
}

// ============================================================================
// Success Paths
// ============================================================================

#[tokio::test]
async fn always_succeeding_transport_uses_one_attempt() {
    let transport = MemoryTransport::new();
    let dispatcher = Dispatcher::new(settings(3), transport.clone());

    let result = dispatcher
        .send_email("user@example.com", "Hi", "<b>hello</b>")
        .await
        .unwrap();

    assert_eq!(result.attempts, 1);
    assert!(!result.message_id.is_empty());
    assert_eq!(transport.attempts(), 1);

    let sent = transport.last_sent().unwrap();
    assert_eq!(sent.to.email(), "user@example.com");
    assert_eq!(sent.from.formatted(), "Example <noreply@example.com>");
    assert_eq!(sent.subject, "Hi");
    assert_eq!(sent.html_body, "<b>hello</b>");
}

#[tokio::test(start_paused = true)]
async fn transient_failures_then_success() {
    for k in 0..5u32 {
        let transport = MemoryTransport::new();
        transport.fail_next(k as usize, "temporary relay failure");
        let observer = RecordingObserver::shared();
        let dispatcher =
            Dispatcher::new(settings(5), transport.clone()).with_observer(Arc::clone(&observer));

        let result = dispatcher
            .send_email("user@example.com", "Hi", "<b>hello</b>")
            .await
            .unwrap();

        assert_eq!(result.attempts, k + 1);
        assert_eq!(transport.attempts(), (k + 1) as usize);
        assert_eq!(transport.sent().len(), 1);

        let expected: Vec<u64> = (1..=k).map(|n| 2u64.pow(n)).collect();
        assert_gaps(&transport.attempted_at(), &expected);
        assert_eq!(
            observer.retry_delays(),
            expected.iter().map(|s| Duration::from_secs(*s)).collect::<Vec<_>>()
        );
    }
}

#[tokio::test(start_paused = true)]
async fn fails_twice_then_succeeds_on_third_attempt() {
    let transport = MemoryTransport::new();
    transport.fail_next(2, "connection reset");
    let observer = RecordingObserver::shared();
    let dispatcher =
        Dispatcher::new(settings(3), transport.clone()).with_observer(Arc::clone(&observer));

    let start = Instant::now();
    let result = dispatcher
        .send_email("user@example.com", "Hi", "<b>hello</b>")
        .await
        .unwrap();

    assert_eq!(result.attempts, 3);
    assert_eq!(transport.attempts(), 3);
    assert_gaps(&transport.attempted_at(), &[2, 4]);
    assert!(start.elapsed() >= Duration::from_secs(6));

    let events = observer.events();
    assert_eq!(events.len(), 3);
    assert!(matches!(
        &events[0],
        DeliveryEvent::AttemptFailed { attempt: 1, max_attempts: 3, retry_in: Some(d), .. }
            if *d == Duration::from_secs(2)
    ));
    assert!(matches!(
        &events[1],
        DeliveryEvent::AttemptFailed { attempt: 2, retry_in: Some(d), .. }
            if *d == Duration::from_secs(4)
    ));
    assert!(matches!(
        &events[2],
        DeliveryEvent::Delivered { attempts: 3, recipient, .. } if recipient == "user@example.com"
    ));
}

// ============================================================================
// Exhaustion
// ============================================================================

#[tokio::test(start_paused = true)]
async fn always_failing_transport_exhausts_budget() {
    for max_retries in [1u32, 3, 4] {
        let transport = MemoryTransport::new();
        transport.fail_always("relay unavailable");
        let dispatcher = Dispatcher::new(settings(max_retries), transport.clone());

        let err = dispatcher
            .send_email("user@example.com", "Hi", "<b>hello</b>")
            .await
            .unwrap_err();

        assert_eq!(transport.attempts(), max_retries as usize);
        assert_eq!(err.attempts(), Some(max_retries));
        assert!(matches!(
            err.last_cause(),
            Some(MailError::Transport(msg)) if msg == "relay unavailable"
        ));
        assert!(transport.sent().is_empty());
    }
}

#[tokio::test(start_paused = true)]
async fn connection_refused_with_two_retries() {
    let transport = MemoryTransport::new();
    transport.fail_always("Connection refused (os error 111)");
    let observer = RecordingObserver::shared();
    let dispatcher =
        Dispatcher::new(settings(2), transport.clone()).with_observer(Arc::clone(&observer));

    let err = dispatcher
        .send_email("user@example.com", "Hi", "<b>hello</b>")
        .await
        .unwrap_err();

    assert!(matches!(err, MailError::DeliveryFailed { attempts: 2, .. }));
    assert!(err.to_string().contains("Connection refused"));
    assert_eq!(transport.attempts(), 2);
    assert_gaps(&transport.attempted_at(), &[2]);
    assert_eq!(observer.retry_delays(), vec![Duration::from_secs(2)]);

    let events = observer.events();
    assert!(matches!(
        events.last(),
        Some(DeliveryEvent::Exhausted { attempts: 2, error: MailError::Transport(_), .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn last_cause_is_the_final_error() {
    let transport = MemoryTransport::new();
    transport.fail_next(1, "first failure");
    transport.fail_next(1, "second failure");
    let dispatcher = Dispatcher::new(settings(2), transport.clone());

    let err = dispatcher
        .send_email("user@example.com", "Hi", "<b>hello</b>")
        .await
        .unwrap_err();

    assert!(matches!(
        err.last_cause(),
        Some(MailError::Transport(msg)) if msg == "second failure"
    ));
}

// ============================================================================
// Fast Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn invalid_recipient_makes_no_attempts() {
    for to in [
        "not-an-email",
        "user@",
        "@example.com",
        "two@@example.com",
        "user@[127.0.0.1]",
        "Evil\r\nBcc: x@evil.com <user@example.com>",
    ] {
        let transport = MemoryTransport::new();
        let observer = RecordingObserver::shared();
        let dispatcher =
            Dispatcher::new(settings(3), transport.clone()).with_observer(Arc::clone(&observer));

        let start = Instant::now();
        let err = dispatcher.send_email(to, "Hi", "<b>hello</b>").await.unwrap_err();

        assert!(matches!(err, MailError::InvalidAddress(_)), "{to}: {err}");
        assert_eq!(err.status_code(), 400);
        assert_eq!(transport.attempts(), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(matches!(
            observer.events().as_slice(),
            [DeliveryEvent::Aborted { .. }]
        ));
    }
}

#[tokio::test(start_paused = true)]
async fn malformed_sender_settings_make_no_attempts() {
    for (key, value) in [
        (keys::FROM_EMAIL, "Ops Team <ops@example.com>"),
        (keys::FROM_NAME, "Ops\r\nBcc: x@evil.com"),
    ] {
        let mut settings = settings(3);
        settings.insert(key.to_string(), value.to_string());
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(settings, transport.clone());

        let err = dispatcher
            .send_email("user@example.com", "Hi", "<b>hello</b>")
            .await
            .unwrap_err();

        assert!(matches!(err, MailError::Configuration(_)), "{key}: {err}");
        assert_eq!(err.status_code(), 500);
        assert_eq!(transport.attempts(), 0);
    }
}

#[tokio::test]
async fn blank_fields_make_no_attempts() {
    let transport = MemoryTransport::new();
    let dispatcher = Dispatcher::new(settings(3), transport.clone());

    for (to, subject, body) in [
        ("", "Hi", "<b>hello</b>"),
        ("user@example.com", " ", "<b>hello</b>"),
        ("user@example.com", "Hi", ""),
    ] {
        let err = dispatcher.send_email(to, subject, body).await.unwrap_err();
        assert!(matches!(err, MailError::InvalidInput(_)));
    }
    assert_eq!(transport.attempts(), 0);
}

#[tokio::test(start_paused = true)]
async fn missing_sender_identity_makes_no_attempts() {
    for key in [keys::FROM_EMAIL, keys::FROM_NAME] {
        for max_retries in [1u32, 10] {
            let transport = MemoryTransport::new();
            let dispatcher =
                Dispatcher::new(without(settings(max_retries), key), transport.clone());

            let start = Instant::now();
            let err = dispatcher
                .send_email("user@example.com", "Hi", "<b>hello</b>")
                .await
                .unwrap_err();

            assert!(
                matches!(&err, MailError::Configuration(msg) if msg == "sender identity missing"),
                "{key}: {err}"
            );
            assert_eq!(err.status_code(), 500);
            assert_eq!(transport.attempts(), 0);
            assert_eq!(start.elapsed(), Duration::ZERO);
        }
    }
}

#[tokio::test(start_paused = true)]
async fn incomplete_transport_settings_make_no_attempts() {
    let mut zero_port = settings(3);
    zero_port.insert(keys::SMTP_PORT.to_string(), "0".to_string());

    let cases = [
        zero_port,
        without(settings(3), keys::SMTP_PORT),
        without(settings(3), keys::SMTP_SERVER),
        without(settings(3), keys::USERNAME),
        without(settings(3), keys::PASSWORD),
    ];

    for config in cases {
        let transport = MemoryTransport::new();
        let dispatcher = Dispatcher::new(config, transport.clone());

        let err = dispatcher
            .send_email("user@example.com", "Hi", "<b>hello</b>")
            .await
            .unwrap_err();

        assert!(matches!(
            &err,
            MailError::Configuration(msg) if msg == "incomplete transport settings"
        ));
        assert_eq!(transport.attempts(), 0);
    }
}

#[tokio::test]
async fn non_positive_retry_limit_fails_fast() {
    for value in ["0", "-1"] {
        let transport = MemoryTransport::new();
        let mut config = settings(3);
        config.insert(keys::MAX_RETRIES.to_string(), value.to_string());
        let dispatcher = Dispatcher::new(config, transport.clone());

        let err = dispatcher
            .send_email("user@example.com", "Hi", "<b>hello</b>")
            .await
            .unwrap_err();

        assert!(matches!(err, MailError::Configuration(_)));
        assert_eq!(transport.attempts(), 0);
    }
}

#[tokio::test]
async fn missing_retry_limit_defaults_to_three() {
    let transport = MemoryTransport::new();
    transport.fail_always("refused");
    let dispatcher = Dispatcher::new(without(settings(3), keys::MAX_RETRIES), transport.clone())
        .backoff_unit(Duration::from_millis(1));

    let err = dispatcher
        .send_email("user@example.com", "Hi", "<b>hello</b>")
        .await
        .unwrap_err();

    assert_eq!(err.attempts(), Some(3));
    assert_eq!(transport.attempts(), 3);
}

// ============================================================================
// Configuration Is Read Per Call
// ============================================================================

#[tokio::test]
async fn dispatch_accepts_prebuilt_request() {
    let transport = MemoryTransport::new();
    let dispatcher = Dispatcher::new(settings(3), transport.clone());

    let request: DeliveryRequest = serde_json::from_str(
        r#"{"to": "Jane Doe <jane@example.com>", "subject": "Hi", "body": "<p>x</p>"}"#,
    )
    .unwrap();
    dispatcher.dispatch(&request).await.unwrap();

    let sent = transport.last_sent().unwrap();
    assert_eq!(sent.to.email(), "jane@example.com");
    assert_eq!(sent.to.name(), Some("Jane Doe"));
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(start_paused = true)]
async fn backoff_does_not_block_other_calls() {
    let config = Arc::new(settings(3));

    let failing = MemoryTransport::new();
    failing.fail_always("relay unavailable");
    let healthy = MemoryTransport::new();

    let slow = Dispatcher::new(Arc::clone(&config), failing.clone());
    let fast = Dispatcher::new(Arc::clone(&config), healthy.clone());

    let start = Instant::now();
    let slow_call = tokio::spawn(async move {
        let result = slow
            .send_email("slow@example.com", "Hi", "<b>hello</b>")
            .await;
        (result, Instant::now())
    });
    let fast_call = tokio::spawn(async move {
        // Let the slow call fail once and enter its backoff first
        tokio::task::yield_now().await;
        let result = fast
            .send_email("fast@example.com", "Hi", "<b>hello</b>")
            .await;
        (result, Instant::now())
    });

    let (fast_result, fast_done) = fast_call.await.unwrap();
    let (slow_result, slow_done) = slow_call.await.unwrap();

    assert!(fast_result.is_ok());
    assert!(fast_done - start < Duration::from_secs(1));

    assert!(matches!(slow_result, Err(MailError::DeliveryFailed { attempts: 3, .. })));
    assert!(slow_done - start >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn shared_dispatcher_serves_concurrent_calls() {
    let transport = MemoryTransport::new();
    let dispatcher = Dispatcher::new(settings(3), transport.clone());

    let calls = (0..8).map(|i| {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .send_email(&format!("user{}@example.com", i), "Hi", "<b>hello</b>")
                .await
        })
    });

    for call in calls.collect::<Vec<_>>() {
        assert_eq!(call.await.unwrap().unwrap().attempts, 1);
    }
    assert_eq!(transport.sent().len(), 8);
}
