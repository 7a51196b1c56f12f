/// Integration tests with a mocked Judge.me API.
/// Exercises pagination termination, fail-soft truncation, the list
/// handler with its cache, and submission relay without hitting the
/// real provider.
use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use moka::future::Cache;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use storefront_reviews_api::config::Config;
use storefront_reviews_api::errors::AppError;
use storefront_reviews_api::handlers::{self, AppState, ListReviewsParams};
use storefront_reviews_api::judgeme::JudgeMeClient;
use storefront_reviews_api::models::SubmissionRequest;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to create test config pointing at a mock server.
fn create_test_config(judgeme_base_url: String) -> Config {
    Config {
        port: 8080,
        judgeme_api_token: "test_token".to_string(),
        shop_domain: "armor-shop.myshopify.com".to_string(),
        judgeme_base_url,
        platform: "shopify".to_string(),
        product_handle_map: HashMap::from([("steel-helmet".to_string(), 123456u64)]),
        reviews_cache_ttl_secs: 60,
        allowed_origins: vec![],
    }
}

fn create_test_state(judgeme_base_url: String) -> Arc<AppState> {
    let config = create_test_config(judgeme_base_url.clone());
    let judgeme = JudgeMeClient::new(
        judgeme_base_url,
        config.judgeme_api_token.clone(),
        config.shop_domain.clone(),
    )
    .expect("client should build");
    Arc::new(AppState {
        config,
        judgeme,
        reviews_cache: Cache::builder()
            .time_to_live(Duration::from_secs(60))
            .max_capacity(16)
            .build(),
    })
}

/// Builds a page of `count` published review records for `handle`,
/// with ids starting at `first_id`.
fn review_page(count: usize, first_id: i64, handle: &str) -> serde_json::Value {
    let reviews: Vec<serde_json::Value> = (0..count)
        .map(|i| {
            serde_json::json!({
                "id": first_id + i as i64,
                "title": "Great product",
                "body": "Would buy again",
                "rating": 5,
                "product_handle": handle,
                "published": true,
                "reviewer": {"name": "Marta K."},
                "verified": "buyer",
                "created_at": "2024-03-01T12:00:00Z"
            })
        })
        .collect();
    serde_json::json!({ "reviews": reviews })
}

fn peer() -> ConnectInfo<SocketAddr> {
    ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4242)))
}

#[tokio::test]
async fn test_pagination_stops_on_short_page() {
    let mock_server = MockServer::start().await;

    for (page, count, first_id) in [(1, 100, 0i64), (2, 100, 100), (3, 40, 200)] {
        Mock::given(method("GET"))
            .and(path("/reviews"))
            .and(query_param("page", page.to_string()))
            .and(query_param("per_page", "100"))
            .and(query_param("shop_domain", "armor-shop.myshopify.com"))
            .and(query_param("api_token", "test_token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(review_page(count, first_id, "steel-helmet")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    // The short third page is terminal; no fourth call allowed.
    Mock::given(method("GET"))
        .and(path("/reviews"))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(review_page(0, 0, "x")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let state = create_test_state(mock_server.uri());
    let reviews = state.judgeme.fetch_all_shop_reviews().await;
    assert_eq!(reviews.len(), 240);
}

#[tokio::test]
async fn test_pagination_full_last_page_needs_empty_confirmation() {
    let mock_server = MockServer::start().await;

    for (page, count, first_id) in [(1, 100, 0i64), (2, 100, 100), (3, 100, 200)] {
        Mock::given(method("GET"))
            .and(path("/reviews"))
            .and(query_param("page", page.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(review_page(count, first_id, "steel-helmet")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    // Exactly-full third page forces a confirming empty fourth call.
    Mock::given(method("GET"))
        .and(path("/reviews"))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(review_page(0, 0, "x")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = create_test_state(mock_server.uri());
    let reviews = state.judgeme.fetch_all_shop_reviews().await;
    assert_eq!(reviews.len(), 300);
}

#[tokio::test]
async fn test_pagination_truncates_on_upstream_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reviews"))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(review_page(100, 0, "steel-helmet")),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/reviews"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let state = create_test_state(mock_server.uri());
    let reviews = state.judgeme.fetch_all_shop_reviews().await;

    // Best-effort policy: the accumulated prefix is returned, no error.
    assert_eq!(reviews.len(), 100);
}

#[tokio::test]
async fn test_list_handler_filters_and_aggregates() {
    let mock_server = MockServer::start().await;

    // Mixed page: three published for our handle ([4,4,5]), one
    // unpublished, one unmoderated, one for another product.
    let body = serde_json::json!({
        "reviews": [
            {"id": 1, "rating": 4, "product_handle": "steel-helmet", "published": true,
             "reviewer": {"name": "Ana"}, "verified": "buyer"},
            {"id": 2, "rating": 4, "product_handle": "steel-helmet", "published": true,
             "reviewer": {"name": "Anonymous"}, "verified": "nothing"},
            {"id": 3, "rating": 5, "product_handle": "steel-helmet", "published": true,
             "reviewer": {"name": "Bea"}, "verified": "verified_buyer"},
            {"id": 4, "rating": 1, "product_handle": "steel-helmet", "published": false,
             "reviewer": {"name": "Carl"}},
            {"id": 5, "rating": 1, "product_handle": "steel-helmet",
             "reviewer": {"name": "Dana"}},
            {"id": 6, "rating": 1, "product_handle": "kevlar-vest", "published": true,
             "reviewer": {"name": "Eve"}}
        ]
    });
    Mock::given(method("GET"))
        .and(path("/reviews"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&mock_server)
        .await;

    let state = create_test_state(mock_server.uri());
    let Json(response) = handlers::list_reviews(
        State(state),
        Query(ListReviewsParams {
            handle: Some("steel-helmet".to_string()),
        }),
    )
    .await
    .expect("list should succeed");

    assert_eq!(response.stats.count, 3);
    assert_eq!(response.stats.average, 4.33);
    assert_eq!(response.stats.distribution[&4], 2);
    assert_eq!(response.stats.distribution[&5], 1);
    assert_eq!(response.reviews.len(), 3);

    let anonymous = &response.reviews[1];
    assert_eq!(anonymous.author, "Verified Buyer");
    assert!(!anonymous.is_verified);
    assert!(response.reviews[0].is_verified);
}

#[tokio::test]
async fn test_list_handler_missing_handle_is_bad_request() {
    let state = create_test_state("http://127.0.0.1:9".to_string());
    let result =
        handlers::list_reviews(State(state), Query(ListReviewsParams { handle: None })).await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[tokio::test]
async fn test_list_handler_serves_repeat_requests_from_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reviews"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(review_page(3, 0, "steel-helmet")),
        )
        .expect(1) // a second upstream scan means the cache failed
        .mount(&mock_server)
        .await;

    let state = create_test_state(mock_server.uri());
    for _ in 0..2 {
        let Json(response) = handlers::list_reviews(
            State(state.clone()),
            Query(ListReviewsParams {
                handle: Some("steel-helmet".to_string()),
            }),
        )
        .await
        .expect("list should succeed");
        assert_eq!(response.stats.count, 3);
    }
}

#[tokio::test]
async fn test_submit_success_invalidates_cache() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/reviews"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(review_page(2, 0, "steel-helmet")),
        )
        .expect(2) // one scan before the submission, one after invalidation
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/reviews"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = create_test_state(mock_server.uri());
    let params = || {
        Query(ListReviewsParams {
            handle: Some("steel-helmet".to_string()),
        })
    };

    handlers::list_reviews(State(state.clone()), params())
        .await
        .expect("first list should succeed");

    let Json(result) = handlers::submit_review(
        State(state.clone()),
        peer(),
        HeaderMap::new(),
        Json(SubmissionRequest {
            handle: "steel-helmet".to_string(),
            name: "Marta K.".to_string(),
            email: "marta@example.com".to_string(),
            rating: 5,
            body: "Excellent fit".to_string(),
            title: None,
        }),
    )
    .await
    .expect("submission should succeed");
    assert_eq!(result["status"], "success");

    handlers::list_reviews(State(state), params())
        .await
        .expect("second list should succeed");
}

#[tokio::test]
async fn test_submit_relays_upstream_rejection_verbatim() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/reviews"))
        .respond_with(
            ResponseTemplate::new(422).set_body_string(r#"{"error":"rating out of range"}"#),
        )
        .mount(&mock_server)
        .await;

    let state = create_test_state(mock_server.uri());
    let result = handlers::submit_review(
        State(state),
        peer(),
        HeaderMap::new(),
        Json(SubmissionRequest {
            handle: "steel-helmet".to_string(),
            name: "Marta K.".to_string(),
            email: "marta@example.com".to_string(),
            rating: 9,
            body: "???".to_string(),
            title: None,
        }),
    )
    .await;

    match result {
        Err(AppError::UpstreamRejected { status, body }) => {
            assert_eq!(status, 422);
            assert!(body.contains("rating out of range"));
        }
        other => panic!("expected UpstreamRejected, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_submit_unknown_handle_is_not_found() {
    let mock_server = MockServer::start().await;

    // Must not reach the provider at all.
    Mock::given(method("POST"))
        .and(path("/reviews"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let state = create_test_state(mock_server.uri());
    let result = handlers::submit_review(
        State(state),
        peer(),
        HeaderMap::new(),
        Json(SubmissionRequest {
            handle: "no-such-product".to_string(),
            name: "Marta K.".to_string(),
            email: "marta@example.com".to_string(),
            rating: 5,
            body: "Nice".to_string(),
            title: None,
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_submit_transport_failure_is_internal_error() {
    // Nothing listening on this port.
    let state = create_test_state("http://127.0.0.1:9".to_string());
    let result = handlers::submit_review(
        State(state),
        peer(),
        HeaderMap::new(),
        Json(SubmissionRequest {
            handle: "steel-helmet".to_string(),
            name: "Marta K.".to_string(),
            email: "marta@example.com".to_string(),
            rating: 5,
            body: "Nice".to_string(),
            title: Some("Solid".to_string()),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::InternalError(_))));
}

#[tokio::test]
async fn test_submission_payload_carries_resolved_id_and_ip() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/reviews"))
        .and(wiremock::matchers::body_partial_json(serde_json::json!({
            "shop_domain": "armor-shop.myshopify.com",
            "platform": "shopify",
            "id": 123456,
            "name": "Marta K.",
            "email": "marta@example.com",
            "rating": 5,
            "ip_addr": "203.0.113.7"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());

    let state = create_test_state(mock_server.uri());
    handlers::submit_review(
        State(state),
        peer(),
        headers,
        Json(SubmissionRequest {
            handle: "steel-helmet".to_string(),
            name: "Marta K.".to_string(),
            email: "marta@example.com".to_string(),
            rating: 5,
            body: "Excellent fit".to_string(),
            title: None,
        }),
    )
    .await
    .expect("submission should succeed");
}
