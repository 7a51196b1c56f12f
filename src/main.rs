mod config;
mod errors;
mod handlers;
mod judgeme;
mod models;
mod reviews;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use moka::future::Cache;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Builds the CORS layer: an explicit origin allow-list when one is
/// configured, permissive otherwise (local development).
fn cors_layer(config: &Config) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Main entry point for the application.
///
/// Initializes logging, configuration, the review cache, and the
/// Judge.me client, then starts the Axum server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_reviews_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Short-TTL cache for the shop's full raw-review pull. One entry per
    // shop domain; invalidated when a submission for the shop succeeds.
    let reviews_cache = Cache::builder()
        .time_to_live(Duration::from_secs(config.reviews_cache_ttl_secs))
        .max_capacity(16)
        .build();
    tracing::info!(
        "Review cache initialized ({}s TTL)",
        config.reviews_cache_ttl_secs
    );

    // Initialize Judge.me client
    let judgeme = judgeme::JudgeMeClient::new(
        config.judgeme_base_url.clone(),
        config.judgeme_api_token.clone(),
        config.shop_domain.clone(),
    )
    .map_err(|e| anyhow::anyhow!("Failed to initialize Judge.me client: {}", e))?;
    tracing::info!("Judge.me client initialized: {}", config.judgeme_base_url);

    let cors = cors_layer(&config);

    // Build application state
    let app_state = Arc::new(handlers::AppState {
        config: config.clone(),
        judgeme,
        reviews_cache,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .unwrap(),
    );

    // Build protected routes with security layers
    let protected_routes = Router::new()
        .route("/api/product-reviews", get(handlers::list_reviews))
        .route("/api/submit-review", post(handlers::submit_review))
        .layer(
            ServiceBuilder::new()
                // Request size limit: 1MB max payload (a review submission is tiny)
                .layer(RequestBodyLimitLayer::new(1024 * 1024))
                // Rate limiting: 10 req/sec per IP, burst of 20
                .layer(GovernorLayer {
                    config: governor_conf,
                }),
        );

    // Build final app with health check (bypasses rate limiting)
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // connect_info so submission handlers can observe the peer address
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
