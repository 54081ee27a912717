//! User Lifecycle Tests
//!
//! Drives the HTTP API end to end over the in-memory store:
//! - Create, read, update, delete
//! - Stale updates are rejected
//! - One notification per committed change, none for failures
//! - Request validation and error bodies

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use userservice::event::{ChangeObserver, ChannelProducer, Message, MessageReceiver, TopicPublisher};
use userservice::http_server::{HttpServer, HttpServerConfig};
use userservice::metrics::MetricsRegistry;
use userservice::persistence::{InMemoryUserRepository, ObservedRepository};
use userservice::service::UserService;

fn app() -> (Router, MessageReceiver) {
    let (producer, receiver) = ChannelProducer::new(64);
    let publisher: Arc<dyn ChangeObserver> = Arc::new(TopicPublisher::new(producer));
    let repo = ObservedRepository::new(Arc::new(InMemoryUserRepository::new()), vec![publisher]);
    let service = UserService::new(Arc::new(repo));

    let metrics = Arc::new(MetricsRegistry::new());
    let router = HttpServer::new(HttpServerConfig::default(), service, metrics).router();
    (router, receiver)
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    let request = match body {
        Some(body) => request.body(Body::from(body.to_string())).unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn new_user() -> Value {
    json!({
        "first_name": "John",
        "last_name": "Doe",
        "name": "jdoe",
        "email": "john@example.com",
        "country": "uk",
        "password": "12345678"
    })
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    serde_json::from_value(value.clone()).unwrap()
}

fn expect_message(receiver: &mut MessageReceiver, topic: &str, id: &str) {
    let Message { topic: got, payload } = receiver.try_recv().expect("a published message");
    assert_eq!(got, topic);
    assert_eq!(payload, serde_json::to_vec(id).unwrap());
}

// =============================================================================
// Lifecycle
// =============================================================================

/// A user goes through create, update, stale update, delete and the
/// matching notifications are published.
#[tokio::test]
async fn test_user_lifecycle() {
    let (router, mut messages) = app();

    let (status, created) = send(&router, Method::POST, "/v1/users", Some(new_user())).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created["created_at"], created["updated_at"]);
    assert!(created.get("password").is_none());
    expect_message(&mut messages, "user.created", &id);

    let (status, fetched) = send(&router, Method::GET, &format!("/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let mut change = new_user();
    change["name"] = json!("johnny");
    change["created_at"] = created["created_at"].clone();
    change["updated_at"] = created["updated_at"].clone();
    change.as_object_mut().unwrap().remove("password");

    let (status, updated) =
        send(&router, Method::PUT, &format!("/v1/users/{id}"), Some(change.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["name"], "johnny");
    assert_eq!(updated["created_at"], created["created_at"]);
    assert!(timestamp(&updated["updated_at"]) > timestamp(&created["updated_at"]));
    expect_message(&mut messages, "user.updated", &id);

    // same request again carries the old updated_at
    let (status, body) = send(&router, Method::PUT, &format!("/v1/users/{id}"), Some(change)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 409);
    assert!(messages.try_recv().is_err());

    let (status, body) = send(&router, Method::DELETE, &format!("/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    expect_message(&mut messages, "user.deleted", &id);

    let (status, _) = send(&router, Method::GET, &format!("/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&router, Method::DELETE, &format!("/v1/users/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 404);
    assert!(messages.try_recv().is_err());
}

/// Timestamps round-trip through JSON with their sub-second digits.
#[tokio::test]
async fn test_read_after_write_round_trips_timestamps() {
    let (router, _messages) = app();

    let (_, created) = send(&router, Method::POST, "/v1/users/", Some(new_user())).await;
    let id = created["id"].as_str().unwrap();

    let mut change = new_user();
    change["created_at"] = created["created_at"].clone();
    change["updated_at"] = created["updated_at"].clone();
    let (_, first) = send(&router, Method::PUT, &format!("/v1/users/{id}"), Some(change)).await;

    // echo the returned timestamps back for a second update
    let mut change = new_user();
    change["created_at"] = first["created_at"].clone();
    change["updated_at"] = first["updated_at"].clone();
    let (status, second) =
        send(&router, Method::PUT, &format!("/v1/users/{id}/"), Some(change)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(timestamp(&second["updated_at"]) > timestamp(&first["updated_at"]));
}

/// Updating an unknown id is not found and publishes nothing.
#[tokio::test]
async fn test_update_unknown_user() {
    let (router, mut messages) = app();

    let mut change = new_user();
    change["created_at"] = json!("2020-01-02T03:04:05.000001Z");
    change["updated_at"] = json!("2020-01-02T03:04:05.000001Z");
    let (status, _) = send(&router, Method::PUT, "/v1/users/missing", Some(change)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(messages.try_recv().is_err());
}

// =============================================================================
// Listing
// =============================================================================

/// Listings filter by country or email and never expose password hashes.
#[tokio::test]
async fn test_list_filters() {
    let (router, _messages) = app();

    for (email, country) in [("a@x.io", "es"), ("b@x.io", "fr"), ("c@x.io", "es")] {
        let mut user = new_user();
        user["email"] = json!(email);
        user["country"] = json!(country);
        let (status, _) = send(&router, Method::POST, "/v1/users", Some(user)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, all) = send(&router, Method::GET, "/v1/users", None).await;
    assert_eq!(status, StatusCode::OK);
    let all = all.as_array().unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|u| u.get("password_hash").is_none()));

    let ids: Vec<&str> = all.iter().map(|u| u["id"].as_str().unwrap()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    assert_eq!(ids, sorted);

    let (_, spanish) = send(&router, Method::GET, "/v1/users?country=es", None).await;
    assert_eq!(spanish.as_array().unwrap().len(), 2);

    let (_, by_email) = send(&router, Method::GET, "/v1/users/?email=b@x.io", None).await;
    let by_email = by_email.as_array().unwrap();
    assert_eq!(by_email.len(), 1);
    assert_eq!(by_email[0]["country"], "fr");

    let (_, nobody) = send(&router, Method::GET, "/v1/users?country=zz", None).await;
    assert_eq!(nobody, json!([]));
}

/// Filtering by both fields at once is rejected.
#[tokio::test]
async fn test_list_with_two_filters_is_rejected() {
    let (router, _messages) = app();

    let (status, body) = send(&router, Method::GET, "/v1/users?country=es&email=a@x.io", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

// =============================================================================
// Validation
// =============================================================================

/// Malformed JSON is a client error with an error body.
#[tokio::test]
async fn test_malformed_json() {
    let (router, mut messages) = app();

    let request = Request::post("/v1/users")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{ not json"))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 400);
    assert!(body["error"].is_string());
    assert!(messages.try_recv().is_err());
}

/// Callers can't choose service-owned fields.
#[tokio::test]
async fn test_create_rejects_service_owned_fields() {
    let (router, _messages) = app();

    let mut user = new_user();
    user["id"] = json!("chosen-by-me");
    let (status, body) = send(&router, Method::POST, "/v1/users", Some(user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("id"));

    let mut user = new_user();
    user["password_hash"] = json!("deadbeef");
    let (status, _) = send(&router, Method::POST, "/v1/users", Some(user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Field rules are enforced on create and update.
#[tokio::test]
async fn test_field_rules() {
    let (router, _messages) = app();

    let mut user = new_user();
    user["country"] = json!("gbr");
    let (status, _) = send(&router, Method::POST, "/v1/users", Some(user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut user = new_user();
    user["password"] = json!("short");
    let (status, _) = send(&router, Method::POST, "/v1/users", Some(user)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, created) = send(&router, Method::POST, "/v1/users", Some(new_user())).await;
    let id = created["id"].as_str().unwrap();

    // update without the timestamps it read
    let (status, _) = send(&router, Method::PUT, &format!("/v1/users/{id}"), Some(new_user())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// The status endpoint answers without touching the store.
#[tokio::test]
async fn test_status() {
    let (router, _messages) = app();

    let (status, body) = send(&router, Method::GET, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
