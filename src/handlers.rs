use crate::config::Config;
use crate::errors::AppError;
use crate::judgeme::JudgeMeClient;
use crate::models::*;
use crate::reviews::{calculate_stats, is_published_for_handle, normalize_review};
use axum::{
    extract::{ConnectInfo, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use moka::future::Cache;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration (read-only after startup).
    pub config: Config,
    /// Client for the Judge.me reviews API.
    pub judgeme: JudgeMeClient,
    /// Short-TTL cache of the full raw-review pull, keyed by shop domain.
    /// Invalidated explicitly when a submission for the shop succeeds.
    pub reviews_cache: Cache<String, Arc<Vec<RawReview>>>,
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "storefront-reviews-api",
            "version": "0.1.0"
        })),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListReviewsParams {
    #[serde(default)]
    pub handle: Option<String>,
}

/// Returns the shop's full raw-review pull, served from cache when a
/// fresh entry exists.
async fn raw_reviews_for_shop(state: &AppState) -> Arc<Vec<RawReview>> {
    let cache_key = state.config.shop_domain.clone();

    if let Some(cached) = state.reviews_cache.get(&cache_key).await {
        tracing::debug!(
            "Review cache HIT for {} ({} raw reviews)",
            cache_key,
            cached.len()
        );
        return cached;
    }

    tracing::info!("Review cache MISS for {} - fetching from provider", cache_key);
    let raw = Arc::new(state.judgeme.fetch_all_shop_reviews().await);
    state.reviews_cache.insert(cache_key, raw.clone()).await;
    raw
}

/// GET /api/product-reviews?handle=<string>
///
/// Pulls the shop's full review set, retains the explicitly published
/// reviews for the requested handle, and returns aggregate stats plus
/// the normalized reviews.
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListReviewsParams>,
) -> Result<Json<ProductReviewsResponse>, AppError> {
    let handle = params
        .handle
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'handle' parameter".to_string()))?;

    tracing::info!("GET /api/product-reviews - handle: {}", handle);

    let raw_reviews = raw_reviews_for_shop(&state).await;

    let filtered: Vec<RawReview> = raw_reviews
        .iter()
        .filter(|r| is_published_for_handle(r, handle))
        .cloned()
        .collect();

    let stats = calculate_stats(&filtered);

    let mut issue_count = 0;
    let reviews: Vec<NormalizedReview> = filtered
        .iter()
        .map(|r| {
            let (normalized, issues) = normalize_review(r);
            for i in &issues {
                tracing::debug!(
                    "Review {:?}: defaulted field '{}': {}",
                    i.review_id,
                    i.field,
                    i.detail
                );
            }
            issue_count += issues.len();
            normalized
        })
        .collect();

    if issue_count > 0 {
        tracing::debug!(
            "Normalized {} reviews for '{}' with {} defaulted field(s)",
            reviews.len(),
            handle,
            issue_count
        );
    }

    Ok(Json(ProductReviewsResponse { stats, reviews }))
}

/// Resolves the submitting IP: first X-Forwarded-For hop when present
/// (we sit behind a proxy in production), else the socket peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

/// POST /api/submit-review
///
/// Resolves the handle to the provider's numeric product id, builds the
/// upstream submission payload, and forwards it. Provider rejections
/// are relayed verbatim; a successful submission invalidates the shop's
/// review cache entry.
pub async fn submit_review(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(submission): Json<SubmissionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    tracing::info!("POST /api/submit-review - handle: {}", submission.handle);

    let product_id = *state
        .config
        .product_handle_map
        .get(&submission.handle)
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Product handle '{}' is not configured",
                submission.handle
            ))
        })?;

    let payload = UpstreamSubmission {
        shop_domain: state.config.shop_domain.clone(),
        platform: state.config.platform.clone(),
        id: product_id,
        name: submission.name,
        email: submission.email,
        rating: submission.rating,
        body: submission.body,
        title: submission.title,
        ip_addr: client_ip(&headers, peer),
    };

    state.judgeme.submit_review(&payload).await?;

    // The new review changes the shop's dataset once the provider
    // publishes it; drop the cached pull so the next list is fresh.
    state
        .reviews_cache
        .invalidate(&state.config.shop_domain)
        .await;

    Ok(Json(json!({ "status": "success" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_ip_prefers_first_forwarded_hop() {
        let peer = SocketAddr::from(([10, 0, 0, 1], 4242));

        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.2".parse().unwrap());
        assert_eq!(client_ip(&headers, peer), "203.0.113.7");

        let empty = HeaderMap::new();
        assert_eq!(client_ip(&empty, peer), "10.0.0.1");
    }
}
