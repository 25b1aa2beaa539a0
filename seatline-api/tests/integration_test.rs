use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use prometheus::Registry;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use seatline_api::middleware::CustomerClaims;
use seatline_api::{app, AppState, AuthConfig};
use seatline_booking::{BookingCoordinator, BookingPolicy, WorkerMetrics};
use seatline_core::{ManualClock, SeatInventoryStore};
use seatline_store::{
    InMemoryBookingRepository, InMemoryDelayedScheduler, InMemorySeatInventoryStore, InMemorySoftLockStore,
    RecordingEventPublisher,
};

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    trip_id: Uuid,
}

async fn setup() -> TestApp {
    let clock = Arc::new(ManualClock::default());
    let seats = Arc::new(InMemorySeatInventoryStore::new(clock.clone()));
    let trip_id = Uuid::new_v4();
    let seat_ids: Vec<String> = ["1A", "1B", "2A", "2B"].iter().map(|s| s.to_string()).collect();
    seats.initialize_trip(trip_id, &seat_ids).await.unwrap();

    let coordinator = Arc::new(BookingCoordinator::new(
        seats,
        Arc::new(InMemorySoftLockStore::new(clock.clone())),
        Arc::new(InMemoryBookingRepository::new()),
        Arc::new(InMemoryDelayedScheduler::new(clock.clone())),
        Arc::new(RecordingEventPublisher::new()),
        clock,
        BookingPolicy::default(),
    ));

    let registry = Registry::new();
    let metrics = WorkerMetrics::new(&registry).unwrap();
    metrics.record_job("succeeded");

    let state = AppState { coordinator, auth: AuthConfig { secret: SECRET.to_string() }, registry };
    TestApp { router: app(state), trip_id }
}

fn token_for(user_id: &str) -> String {
    let claims = CustomerClaims { sub: user_id.to_string(), exp: (Utc::now().timestamp() + 3600) as usize };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

async fn send(router: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
    (status, value)
}

async fn book(test: &TestApp, token: &str, seats: &[&str]) -> (StatusCode, Value) {
    send(
        &test.router,
        Method::POST,
        "/v1/bookings",
        Some(token),
        Some(json!({ "trip_id": test.trip_id, "seat_ids": seats, "total_amount": 4200 })),
    )
    .await
}

#[tokio::test]
async fn test_booking_requires_a_valid_token() {
    let test = setup().await;

    let (status, body) = send(&test.router, Method::POST, "/v1/bookings", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = book(&test, "not-a-jwt", &["1A"]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_and_fetch_booking() {
    let test = setup().await;
    let token = token_for("user-1");

    let (status, booking) = book(&test, &token, &["1A", "1B"]).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["payment_status"], "pending");
    assert_eq!(booking["user_id"], "user-1");

    let id = booking["id"].as_str().unwrap();
    let (status, fetched) = send(&test.router, Method::GET, &format!("/v1/bookings/{}", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"], booking["id"]);

    // someone else's booking looks missing
    let other = token_for("user-2");
    let (status, _) = send(&test.router, Method::GET, &format!("/v1/bookings/{}", id), Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, seats) =
        send(&test.router, Method::GET, &format!("/v1/trips/{}/seats", test.trip_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    let reserved: Vec<&str> = seats
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["status"] == "reserved")
        .map(|s| s["seat_id"].as_str().unwrap())
        .collect();
    assert_eq!(reserved, vec!["1A", "1B"]);
}

#[tokio::test]
async fn test_taken_seat_is_a_conflict() {
    let test = setup().await;

    let (status, _) = book(&test, &token_for("user-1"), &["2A"]).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = book(&test, &token_for("user-2"), &["2B", "2A"]).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("2A"));
}

#[tokio::test]
async fn test_invalid_request_is_bad_request() {
    let test = setup().await;
    let (status, _) = book(&test, &token_for("user-1"), &[]).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_payment_webhook_confirms_booking() {
    let test = setup().await;
    let token = token_for("user-1");
    let (_, booking) = book(&test, &token, &["1A"]).await;

    let webhook = json!({ "booking_id": booking["id"], "event": "payment.succeeded" });
    let (status, ack) = send(&test.router, Method::POST, "/v1/webhooks/payments", None, Some(webhook.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "confirmed");
    assert_eq!(ack["applied"], true);

    // redelivery is acknowledged without applying again
    let (status, ack) = send(&test.router, Method::POST, "/v1/webhooks/payments", None, Some(webhook)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["applied"], false);

    // confirmed bookings cannot be cancelled
    let (status, _) = send(
        &test.router,
        Method::POST,
        &format!("/v1/bookings/{}/cancel", booking["id"].as_str().unwrap()),
        Some(&token),
        Some(json!({ "reason": "changed plans" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_failed_payment_and_cancel() {
    let test = setup().await;
    let token = token_for("user-1");
    let (_, first) = book(&test, &token, &["1A"]).await;
    let (_, second) = book(&test, &token, &["1B"]).await;

    let webhook = json!({ "booking_id": first["id"], "event": "payment.failed", "reason": "card declined" });
    let (status, ack) = send(&test.router, Method::POST, "/v1/webhooks/payments", None, Some(webhook)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "cancelled");

    let (status, cancelled) = send(
        &test.router,
        Method::POST,
        &format!("/v1/bookings/{}/cancel", second["id"].as_str().unwrap()),
        Some(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancel_reason"], "cancelled by customer");

    // both seats are bookable again
    let (status, _) = book(&test, &token_for("user-2"), &["1A", "1B"]).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_webhook_for_unknown_booking_is_not_found() {
    let test = setup().await;
    let webhook = json!({ "booking_id": Uuid::new_v4(), "event": "payment.succeeded" });
    let (status, _) = send(&test.router, Method::POST, "/v1/webhooks/payments", None, Some(webhook)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_soft_lock_holds() {
    let test = setup().await;
    let holds_uri = format!("/v1/trips/{}/holds", test.trip_id);

    let (status, body) = send(
        &test.router,
        Method::POST,
        &holds_uri,
        None,
        Some(json!({ "session_id": "sess-a", "seat_ids": ["2A", "2B"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["expires_at"].is_string());

    let (status, body) = send(
        &test.router,
        Method::POST,
        &holds_uri,
        None,
        Some(json!({ "session_id": "sess-b", "seat_ids": ["1A", "2B"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["seat_ids"], json!(["2B"]));

    // a booking from another session cannot take a held seat
    let (status, _) = book(&test, &token_for("user-2"), &["2A"]).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&test.router, Method::DELETE, "/v1/holds/sess-a", None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = book(&test, &token_for("user-2"), &["2A"]).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_unknown_trip_seat_map_is_not_found() {
    let test = setup().await;
    let (status, _) =
        send(&test.router, Method::GET, &format!("/v1/trips/{}/seats", Uuid::new_v4()), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let test = setup().await;
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = test.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("seatline_expiry_jobs_total"));
}
