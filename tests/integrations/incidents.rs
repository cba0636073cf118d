use notifyd::{
    core::{IncidentRecord, IncidentSource, IncidentStatus, IncidentStore},
    http::error::ErrorResponse,
};
use serde_json::json;
use std::time::Duration;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::app::{TestApp, TestAppBuilder};

async fn create(app: &TestApp, description: &str, source: &str) -> IncidentRecord {
    let response = app
        .post_json(
            "/incidents/",
            &json!({ "description": description, "source": source }),
        )
        .await;
    assert_eq!(response.status(), 201);
    response.json().await.unwrap()
}

#[tokio::test]
async fn test_create_then_fetch_incident() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let created = create(&app, "Payment gateway returns 502", "partner").await;
    assert_eq!(created.status, IncidentStatus::New);
    assert_eq!(created.source, IncidentSource::Partner);

    let response = app.get(&format!("/incidents/{}", created.id)).await;
    assert_eq!(response.status(), 200);
    let fetched: IncidentRecord = response.json().await.unwrap();
    assert_eq!(fetched, created);

    // The HTTP layer and the store share the same database.
    assert_eq!(app.incidents.get(created.id).await.unwrap(), Some(created));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_list_filters_by_status() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let first = create(&app, "disk almost full", "monitoring").await;
    let second = create(&app, "customer cannot log in", "operator").await;

    let response = app
        .client
        .patch(app.url(&format!("/incidents/{}", second.id)))
        .json(&json!({ "status": "in_progress" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let updated: IncidentRecord = response.json().await.unwrap();
    assert_eq!(updated.status, IncidentStatus::InProgress);
    assert_eq!(updated.description, second.description);

    let all: Vec<IncidentRecord> = app.get("/incidents/").await.json().await.unwrap();
    assert_eq!(
        all.iter().map(|i| i.id).collect::<Vec<_>>(),
        vec![first.id, second.id]
    );

    let fresh: Vec<IncidentRecord> = app
        .get("/incidents/?status=new")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(fresh.len(), 1);
    assert_eq!(fresh[0].id, first.id);

    let closed: Vec<IncidentRecord> = app
        .get("/incidents?status=closed")
        .await
        .json()
        .await
        .unwrap();
    assert!(closed.is_empty());

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_unknown_incident_is_404() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app.get("/incidents/999").await;
    assert_eq!(response.status(), 404);
    let error: ErrorResponse = response.json().await.unwrap();
    assert!(error.detail.contains("999"));

    let response = app
        .client
        .patch(app.url("/incidents/999"))
        .json(&json!({ "status": "closed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_invalid_incident_input_is_400() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app
        .post_json(
            "/incidents/",
            &json!({ "description": "   ", "source": "operator" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .post_json(
            "/incidents/",
            &json!({ "description": "router down", "source": "satellite" }),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app.get("/incidents/?status=forgotten").await;
    assert_eq!(response.status(), 400);

    let created = create(&app, "router down", "operator").await;
    let response = app
        .client
        .patch(app.url(&format!("/incidents/{}", created.id)))
        .json(&json!({ "status": "archived" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_non_numeric_id_is_400_with_detail() {
    let app = TestAppBuilder::new().start().await.unwrap();

    let response = app.get("/incidents/abc").await;
    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert!(!error.detail.is_empty());

    let response = app
        .client
        .patch(app.url("/incidents/abc"))
        .json(&json!({ "status": "closed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let error: ErrorResponse = response.json().await.unwrap();
    assert!(!error.detail.is_empty());

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
