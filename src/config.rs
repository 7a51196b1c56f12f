use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub judgeme_api_token: String,
    pub shop_domain: String,
    pub judgeme_base_url: String,
    pub platform: String,
    /// Static storefront handle -> Judge.me numeric product id mapping.
    pub product_handle_map: HashMap<String, u64>,
    /// TTL for the raw shop-review cache, in seconds.
    pub reviews_cache_ttl_secs: u64,
    /// Explicit CORS origins; empty list means permissive.
    pub allowed_origins: Vec<String>,
}

/// Strips a scheme prefix and trailing slashes from a shop domain.
///
/// Judge.me keys shops by bare domain (`my-shop.myshopify.com`), but
/// operators routinely paste the full URL into the env file.
pub fn clean_shop_domain(raw: &str) -> String {
    raw.trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://")
        .trim_end_matches('/')
        .to_string()
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            judgeme_api_token: std::env::var("JUDGE_ME_API_TOKEN")
                .map_err(|_| anyhow::anyhow!("JUDGE_ME_API_TOKEN environment variable required"))
                .and_then(|token| {
                    if token.trim().is_empty() {
                        anyhow::bail!("JUDGE_ME_API_TOKEN cannot be empty");
                    }
                    Ok(token)
                })?,
            shop_domain: std::env::var("SHOP_DOMAIN")
                .map_err(|_| anyhow::anyhow!("SHOP_DOMAIN environment variable required"))
                .and_then(|domain| {
                    let cleaned = clean_shop_domain(&domain);
                    if cleaned.is_empty() {
                        anyhow::bail!("SHOP_DOMAIN cannot be empty");
                    }
                    Ok(cleaned)
                })?,
            judgeme_base_url: std::env::var("JUDGE_ME_BASE_URL")
                .unwrap_or_else(|_| "https://judge.me/api/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            platform: std::env::var("SHOP_PLATFORM").unwrap_or_else(|_| "shopify".to_string()),
            product_handle_map: match std::env::var("PRODUCT_HANDLE_MAP") {
                Ok(raw) if !raw.trim().is_empty() => serde_json::from_str(&raw).map_err(|e| {
                    anyhow::anyhow!(
                        "PRODUCT_HANDLE_MAP must be a JSON object of handle -> numeric id: {}",
                        e
                    )
                })?,
                _ => HashMap::new(),
            },
            reviews_cache_ttl_secs: std::env::var("REVIEWS_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("REVIEWS_CACHE_TTL_SECS must be a valid number"))?,
            allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
        };

        if !config.judgeme_base_url.starts_with("http://")
            && !config.judgeme_base_url.starts_with("https://")
        {
            anyhow::bail!("JUDGE_ME_BASE_URL must start with http:// or https://");
        }

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Shop domain: {}", config.shop_domain);
        tracing::debug!("Judge.me base URL: {}", config.judgeme_base_url);
        tracing::debug!(
            "Configured product handles: {}",
            config.product_handle_map.len()
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}
