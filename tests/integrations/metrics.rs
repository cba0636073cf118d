//! Scrapes the Prometheus endpoint after a mix of dispatch outcomes.
//!
//! The recorder is process-global, so this target holds a single test.

use notifyd::{
    channels::test_utils::{Behavior, ScriptedSender},
    core::ChannelId,
};
use serde_json::json;
use std::time::Duration;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{app::TestAppBuilder, metric_value};

#[tokio::test]
async fn test_dispatch_outcomes_are_exported() {
    let app = TestAppBuilder::new()
        .with_metrics()
        .with_config_modifier(|config| config.dispatch.attempt_timeout_ms = 100)
        .with_sender(ChannelId::Email, ScriptedSender::rejecting())
        .with_sender(ChannelId::Sms, ScriptedSender::failing("carrier down"))
        .with_sender(
            ChannelId::Telegram,
            ScriptedSender::sequence(vec![
                Behavior::Deliver,
                Behavior::Panic,
                Behavior::Hang(Duration::from_secs(5)),
            ]),
        )
        .start()
        .await
        .unwrap();
    assert!(app.metrics_addr.is_some());

    // email rejects, sms errors, telegram delivers.
    let response = app
        .post_json(
            "/notify/",
            &json!({
                "user_id": "42",
                "message": "hi",
                "channels": ["email", "sms", "telegram"],
                "email": "a@b.com",
                "phone": "+1",
                "telegram_id": "99"
            }),
        )
        .await;
    assert_eq!(response.status(), 200);

    // telegram panics, then hangs past the attempt timeout.
    for _ in 0..2 {
        let response = app
            .post_json(
                "/notify/",
                &json!({
                    "user_id": "42",
                    "message": "hi",
                    "channels": ["telegram"],
                    "telegram_id": "99"
                }),
            )
            .await;
        assert_eq!(response.status(), 500);
    }

    let response = app
        .post_json(
            "/notify/",
            &json!({ "user_id": "42", "message": "hi", "channels": [] }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let rendered = app.scrape_metrics().await;
    let value = |name: &str, labels: &[&str]| {
        metric_value(&rendered, name, labels)
            .unwrap_or_else(|| panic!("no sample for {name} {labels:?} in:\n{rendered}"))
    };

    assert_eq!(value("notifications_requested_total", &[]), 4.0);
    assert_eq!(value("notifications_rejected_total", &[]), 1.0);
    assert_eq!(value("notifications_exhausted_total", &[]), 2.0);
    assert_eq!(
        value("notifications_delivered_total", &[r#"channel="telegram""#]),
        1.0
    );
    assert_eq!(
        metric_value(&rendered, "notifications_delivered_total", &[r#"channel="email""#]),
        None
    );

    let attempts = [
        ("email", "rejected"),
        ("sms", "error"),
        ("telegram", "delivered"),
        ("telegram", "panicked"),
        ("telegram", "timeout"),
    ];
    for (channel, outcome) in attempts {
        let channel = format!(r#"channel="{channel}""#);
        let outcome = format!(r#"outcome="{outcome}""#);
        assert_eq!(
            value("channel_attempts_total", &[&channel, &outcome]),
            1.0,
            "{channel} {outcome}"
        );
    }

    // Only the three dispatches that reached a channel are timed.
    assert_eq!(value("dispatch_duration_seconds_count", &[]), 3.0);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
