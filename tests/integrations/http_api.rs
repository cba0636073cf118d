use notifyd::{
    channels::test_utils::ScriptedSender,
    core::{ChannelId, DispatchOutcome},
    http::error::ErrorResponse,
};
use serde_json::{json, Value};
use std::time::Duration;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::app::TestAppBuilder;

#[tokio::test]
async fn test_health_reports_ok() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app.get("/health").await;
    assert_eq!(response.status(), 200);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({ "status": "ok" }));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_notify_delivers_on_first_channel() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app
        .post_json(
            "/notify/",
            &json!({
                "user_id": "42",
                "message": "hi",
                "channels": ["email"],
                "email": "a@b.com"
            }),
        )
        .await;

    assert_eq!(response.status(), 200);
    let outcome: DispatchOutcome = response.json().await.unwrap();
    assert!(outcome.success);
    assert_eq!(outcome.channel_used, Some(ChannelId::Email));
    assert_eq!(outcome.message, "delivered via email");
    assert_eq!(
        app.sender(ChannelId::Email).attempts(),
        vec![("a@b.com".to_string(), "hi".to_string())]
    );

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_notify_falls_back_in_priority_order() {
    let app = TestAppBuilder::new()
        .with_sender(ChannelId::Email, ScriptedSender::failing("mailbox full"))
        .start()
        .await
        .unwrap();

    let response = app
        .post_json(
            "/notify",
            &json!({
                "user_id": "42",
                "message": "hi",
                "channels": ["sms", "email"],
                "email": "a@b.com",
                "phone": "+1"
            }),
        )
        .await;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["channel_used"], "sms");
    assert_eq!(app.sender(ChannelId::Email).attempt_count(), 1);
    assert_eq!(app.sender(ChannelId::Sms).attempt_count(), 1);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_notify_rejects_empty_channel_list() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app
        .post_json(
            "/notify/",
            &json!({ "user_id": "42", "message": "hi", "channels": [] }),
        )
        .await;

    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.detail, "at least one channel must be requested");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_notify_names_the_missing_field() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app
        .post_json(
            "/notify/",
            &json!({
                "user_id": "42",
                "message": "hi",
                "channels": ["email", "sms"],
                "email": "a@b.com"
            }),
        )
        .await;

    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.detail, "field 'phone' is required for sms notifications");
    assert_eq!(app.sender(ChannelId::Email).attempt_count(), 0);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_notify_rejects_unknown_channel() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app
        .post_json(
            "/notify/",
            &json!({
                "user_id": "42",
                "message": "hi",
                "channels": ["email", "pigeon"],
                "email": "a@b.com"
            }),
        )
        .await;

    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.detail, "unsupported channel 'pigeon'");
    assert_eq!(app.sender(ChannelId::Email).attempt_count(), 0);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_notify_returns_500_when_every_channel_fails() {
    let app = TestAppBuilder::new()
        .with_sender(ChannelId::Sms, ScriptedSender::rejecting())
        .start()
        .await
        .unwrap();

    let response = app
        .post_json(
            "/notify/",
            &json!({
                "user_id": "42",
                "message": "hi",
                "channels": ["sms"],
                "phone": "+1"
            }),
        )
        .await;

    assert_eq!(response.status(), 500);
    let error: ErrorResponse = response.json().await.unwrap();
    assert_eq!(error.detail, "failed to deliver notification on any channel");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_exhausted_dispatch_records_incident_when_enabled() {
    let app = TestAppBuilder::new()
        .with_sender(ChannelId::Telegram, ScriptedSender::failing("bot blocked"))
        .with_config_modifier(|config| config.dispatch.record_exhausted_incidents = true)
        .start()
        .await
        .unwrap();

    let response = app
        .post_json(
            "/notify/",
            &json!({
                "user_id": "7",
                "message": "hi",
                "channels": ["telegram"],
                "telegram_id": "99"
            }),
        )
        .await;
    assert_eq!(response.status(), 500);

    let incidents: Value = app.get("/incidents/").await.json().await.unwrap();
    let incidents = incidents.as_array().unwrap();
    assert_eq!(incidents.len(), 1);
    assert_eq!(incidents[0]["source"], "monitoring");
    assert_eq!(incidents[0]["status"], "new");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app
        .client
        .post(app.url("/notify/"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert!(!error.detail.is_empty());

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
