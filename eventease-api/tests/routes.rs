use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use eventease_api::{app, metrics::Metrics, sale::SaleStatus, AppState};
use eventease_booking::{seed_pool, BookingEngine};
use eventease_core::{BucketStore, ManualClock, Revision, StoreError, StoreResult};
use eventease_ratelimit::{RateLimitPolicy, RateLimiter};
use eventease_shared::BucketState;
use eventease_store::{MemoryBucketStore, MemorySeatStore};
use serde_json::Value;
use tower::ServiceExt;

async fn build_app(policy: RateLimitPolicy, buckets: Arc<dyn BucketStore>) -> Router {
    let seats = Arc::new(MemorySeatStore::new());
    seed_pool(seats.as_ref(), "A", 3, Utc::now()).await.unwrap();

    let limiter = RateLimiter::new(buckets, policy).with_clock(Arc::new(ManualClock::default()));
    app(AppState {
        engine: Arc::new(BookingEngine::new(seats)),
        limiter: Arc::new(limiter),
        sale: Arc::new(SaleStatus::default()),
        metrics: Arc::new(Metrics::new().unwrap()),
    })
}

async fn test_app() -> Router {
    let generous = RateLimitPolicy {
        capacity: 1_000,
        ..RateLimitPolicy::default()
    };
    build_app(generous, Arc::new(MemoryBucketStore::new())).await
}

async fn send(app: &Router, method: Method, uri: &str, client: &str) -> Response {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_seat_map_lists_seeded_pool() {
    let app = test_app().await;
    let response = send(&app, Method::GET, "/api/seats", "10.0.0.1").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!response.headers().contains_key("x-ratelimit-remaining"));

    let json = body_json(response).await;
    let ids: Vec<&str> = json.as_array().unwrap().iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["A1", "A2", "A3"]);
    assert!(json.as_array().unwrap().iter().all(|s| s["status"] == "AVAILABLE"));
}

#[tokio::test]
async fn test_booking_flow_and_error_mapping() {
    let app = test_app().await;

    let response = send(&app, Method::POST, "/api/book/A2?userId=alice", "10.0.0.1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let seat = body_json(response).await;
    assert_eq!(seat["status"], "SOLD");
    assert_eq!(seat["holder"], "alice");
    assert_eq!(seat["version"], 1);

    let response = send(&app, Method::POST, "/api/book/A2?userId=bob", "10.0.0.1").await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["error"], "SEAT_ALREADY_CLAIMED");

    let response = send(&app, Method::POST, "/api/book/Z9?userId=bob", "10.0.0.1").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "SEAT_NOT_FOUND");

    let response = send(&app, Method::POST, "/api/book/A1", "10.0.0.1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "BAD_REQUEST");

    let response = send(&app, Method::POST, "/api/book/A1?userId=%20%20", "10.0.0.1").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "INVALID_CLAIMANT");
}

#[tokio::test]
async fn test_user_bookings_and_available_count() {
    let app = test_app().await;
    send(&app, Method::POST, "/api/book/A1?userId=alice", "10.0.0.1").await;
    send(&app, Method::POST, "/api/book/A3?userId=alice", "10.0.0.1").await;

    let response = send(&app, Method::GET, "/api/booking/user/alice", "10.0.0.1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let seats = body_json(response).await;
    let ids: Vec<&str> = seats.as_array().unwrap().iter().map(|s| s["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["A1", "A3"]);

    let response = send(&app, Method::GET, "/api/booking/available-count", "10.0.0.1").await;
    assert_eq!(body_json(response).await["availableSeats"], 1);
}

#[tokio::test]
async fn test_admin_reset_returns_pool_to_available() {
    let app = test_app().await;
    send(&app, Method::POST, "/api/book/A1?userId=alice", "10.0.0.1").await;

    let response = send(&app, Method::POST, "/api/admin/reset", "10.0.0.9").await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["released"], 1);
    assert_eq!(json["refreshed"], 2);
    assert_eq!(json["availableSeats"], 3);

    let response = send(&app, Method::GET, "/api/booking/user/alice", "10.0.0.1").await;
    assert!(body_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_sale_flag_is_informational() {
    let app = test_app().await;

    let status = body_json(send(&app, Method::GET, "/api/admin/status", "10.0.0.9").await).await;
    assert_eq!(status["flashSaleEnabled"], false);

    // Claims work with the flag off
    let response = send(&app, Method::POST, "/api/book/A1?userId=alice", "10.0.0.1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let started = body_json(send(&app, Method::POST, "/api/admin/start", "10.0.0.9").await).await;
    assert_eq!(started["enabled"], true);
    assert_eq!(started["availableSeats"], 2);

    let status = body_json(send(&app, Method::GET, "/api/admin/status", "10.0.0.9").await).await;
    assert_eq!(status["flashSaleEnabled"], true);

    let stopped = body_json(send(&app, Method::POST, "/api/admin/stop", "10.0.0.9").await).await;
    assert_eq!(stopped["enabled"], false);
}

fn tight_policy() -> RateLimitPolicy {
    RateLimitPolicy {
        capacity: 2,
        refill_tokens: 2,
        ..RateLimitPolicy::default()
    }
}

#[tokio::test]
async fn test_rate_limit_is_per_client() {
    let app = build_app(tight_policy(), Arc::new(MemoryBucketStore::new())).await;

    for remaining in ["1", "0"] {
        let response = send(&app, Method::GET, "/api/booking/available-count", "203.0.113.5").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-remaining"], remaining);
    }

    let response = send(&app, Method::POST, "/api/book/A1?userId=alice", "203.0.113.5").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    let json = body_json(response).await;
    assert_eq!(json["error"], "TOO_MANY_REQUESTS");
    assert_eq!(json["retryAfterSeconds"], 60);

    // Another client has its own bucket
    let response = send(&app, Method::POST, "/api/book/A1?userId=bob", "203.0.113.6").await;
    assert_eq!(response.status(), StatusCode::OK);

    // Operational endpoints are outside /api
    assert_eq!(send(&app, Method::GET, "/health", "203.0.113.5").await.status(), StatusCode::OK);
    let response = send(&app, Method::GET, "/metrics", "203.0.113.5").await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("eventease_rate_limit_denied_total 1"));
}

#[tokio::test]
async fn test_seat_map_polling_does_not_spend_booking_tokens() {
    let app = build_app(tight_policy(), Arc::new(MemoryBucketStore::new())).await;

    // Poll far more often than the bucket allows
    for _ in 0..20 {
        let response = send(&app, Method::GET, "/api/seats", "198.51.100.4").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // The full allowance is still there for booking
    let response = send(&app, Method::POST, "/api/book/A1?userId=carol", "198.51.100.4").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-ratelimit-remaining"], "1");

    // And the map keeps answering once the allowance is gone
    send(&app, Method::POST, "/api/book/A2?userId=carol", "198.51.100.4").await;
    let response = send(&app, Method::POST, "/api/book/A3?userId=carol", "198.51.100.4").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let response = send(&app, Method::GET, "/api/seats", "198.51.100.4").await;
    assert_eq!(response.status(), StatusCode::OK);
}

struct BrokenBuckets;

#[async_trait]
impl BucketStore for BrokenBuckets {
    async fn load(&self, _key: &str) -> StoreResult<Option<(BucketState, Revision)>> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    async fn compare_and_set(&self, _key: &str, _expected: Option<Revision>, _next: BucketState) -> StoreResult<bool> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_broken_rate_limit_store_denies_requests() {
    let policy = RateLimitPolicy {
        failure_backoff: Duration::from_secs(2),
        ..RateLimitPolicy::default()
    };
    let app = build_app(policy, Arc::new(BrokenBuckets)).await;

    let response = send(&app, Method::POST, "/api/book/A1?userId=alice", "10.0.0.1").await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "2");
}

#[tokio::test]
async fn test_claim_outcomes_are_counted() {
    let app = test_app().await;
    send(&app, Method::POST, "/api/book/A1?userId=alice", "10.0.0.1").await;
    send(&app, Method::POST, "/api/book/A1?userId=bob", "10.0.0.1").await;

    let response = send(&app, Method::GET, "/metrics", "10.0.0.1").await;
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(r#"eventease_claims_total{outcome="claimed"} 1"#));
    assert!(text.contains(r#"eventease_claims_total{outcome="seat_already_claimed"} 1"#));
}
