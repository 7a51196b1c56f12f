use crate::errors::AppError;
use crate::models::{RawReview, ReviewsPage, UpstreamSubmission};
use std::time::Duration;

/// Page size for the provider's reviews listing.
const PER_PAGE: usize = 100;

/// Fixed pause between page fetches so we do not hammer the provider.
const PAGE_DELAY: Duration = Duration::from_millis(100);

/// Client for the Judge.me reviews API.
#[derive(Clone)]
pub struct JudgeMeClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
    shop_domain: String,
}

impl JudgeMeClient {
    /// Creates a new `JudgeMeClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the Judge.me API (no trailing slash).
    /// * `api_token` - The shop's API token.
    /// * `shop_domain` - The bare shop domain the token belongs to.
    pub fn new(
        base_url: String,
        api_token: String,
        shop_domain: String,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Judge.me client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            api_token,
            shop_domain,
        })
    }

    /// Fetches EVERY review belonging to the shop, one page at a time.
    ///
    /// The provider's own handle filter is unreliable, so filtering is
    /// done on our side over the full pull. Pagination stops on an empty
    /// page or a short page; an exactly-full final page costs one extra
    /// round trip to confirm termination.
    ///
    /// Best effort: a non-success status, transport failure, or parse
    /// failure ends pagination early and returns whatever was
    /// accumulated. The caller is not told the result may be truncated.
    pub async fn fetch_all_shop_reviews(&self) -> Vec<RawReview> {
        let url = format!("{}/reviews", self.base_url);
        let mut all_reviews: Vec<RawReview> = Vec::new();
        let mut page: usize = 1;

        tracing::info!("Starting full review fetch for {}", self.shop_domain);

        loop {
            let per_page = PER_PAGE.to_string();
            let page_str = page.to_string();
            // Token is a query parameter on this API; keep it out of logs.
            let request = self.client.get(&url).query(&[
                ("api_token", self.api_token.as_str()),
                ("shop_domain", self.shop_domain.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page_str.as_str()),
            ]);

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Transport error on page {}: {} (truncating)", page, e);
                    break;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                tracing::warn!(
                    "Provider returned {} on page {}: {} (truncating)",
                    status,
                    page,
                    error_text
                );
                break;
            }

            let batch = match response.json::<ReviewsPage>().await {
                Ok(data) => data.reviews,
                Err(e) => {
                    tracing::warn!("Failed to parse page {}: {} (truncating)", page, e);
                    break;
                }
            };

            if batch.is_empty() {
                break;
            }

            let batch_len = batch.len();
            all_reviews.extend(batch);

            // Short page means we are on the last page already.
            if batch_len < PER_PAGE {
                break;
            }

            page += 1;
            tokio::time::sleep(PAGE_DELAY).await;
        }

        tracing::info!(
            "Fetch complete for {}: {} raw reviews over {} page(s)",
            self.shop_domain,
            all_reviews.len(),
            page
        );
        all_reviews
    }

    /// Forwards a new review submission to the provider.
    ///
    /// 2xx means accepted. A non-2xx response is relayed to the caller
    /// with the provider's status and message verbatim; transport
    /// failures surface as a generic server error.
    pub async fn submit_review(&self, payload: &UpstreamSubmission) -> Result<(), AppError> {
        let url = format!("{}/reviews", self.base_url);
        tracing::info!(
            "Submitting review for product {} to {}",
            payload.id,
            self.shop_domain
        );

        let response = self
            .client
            .post(&url)
            .query(&[("api_token", self.api_token.as_str())])
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                AppError::InternalError(format!("Review submission request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::UpstreamRejected { status, body });
        }

        tracing::info!("Review submitted successfully for product {}", payload.id);
        Ok(())
    }
}
