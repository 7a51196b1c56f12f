use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

// ============ Upstream (Judge.me) Models ============

/// One page of the provider's paginated reviews listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewsPage {
    #[serde(default)]
    pub reviews: Vec<RawReview>,
}

/// A review record as the provider returns it.
///
/// Every field is optional: the provider omits fields freely between
/// plan tiers and API versions, and the pipeline must never fail on a
/// missing one. Omissions are surfaced as [`FieldIssue`]s instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawReview {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Int in recent payloads, float or numeric string in older ones.
    #[serde(default)]
    pub rating: Option<Value>,
    #[serde(default)]
    pub product_handle: Option<String>,
    /// Moderation flag. Only `Some(true)` makes a review visible.
    #[serde(default)]
    pub published: Option<bool>,
    #[serde(default)]
    pub reviewer: Option<Reviewer>,
    /// Alternate author field present in some payload variants;
    /// takes precedence over `reviewer.name`.
    #[serde(default)]
    pub user_name: Option<String>,
    /// Provider's purchase-confirmation classification (open string enum).
    #[serde(default)]
    pub verified: Option<String>,
    #[serde(default)]
    pub pictures: Vec<Picture>,
    #[serde(default)]
    pub videos: Vec<Video>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reviewer {
    #[serde(default)]
    pub name: Option<String>,
}

/// Image attachment descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Picture {
    /// Nested size-variant URLs (the standard shape).
    #[serde(default)]
    pub urls: Option<PictureUrls>,
    /// Flat URL fallback seen in simpler payloads.
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PictureUrls {
    #[serde(default)]
    pub original: Option<String>,
    #[serde(default)]
    pub huge: Option<String>,
}

/// Video attachment descriptor. The provider keeps videos in a list
/// separate from pictures.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Video {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub original_url: Option<String>,
}

// ============ Frontend Response Models ============

/// The stable review shape consumed by the storefront frontend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedReview {
    pub id: Option<i64>,
    pub title: Option<String>,
    pub body: Option<String>,
    /// Always within 1..=5 after coercion.
    pub rating: u8,
    pub author: String,
    pub initials: String,
    pub is_verified: bool,
    /// ISO timestamp, passed through from the provider.
    pub date: Option<String>,
    pub media: Vec<MediaItem>,
    /// Raw verification string from the provider.
    pub verification_type: String,
}

/// A single media attachment in display order (images before videos).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaItem {
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub url: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// Aggregate rating statistics for one product's published reviews.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsSummary {
    /// Mean rating rounded to 2 decimal places; 0.0 when there are no reviews.
    pub average: f64,
    pub count: usize,
    /// Occurrence count per star rating, keyed 1 through 5.
    pub distribution: BTreeMap<u8, usize>,
}

impl StatsSummary {
    /// Zero-valued summary with an all-zero 1..=5 histogram.
    pub fn empty() -> Self {
        Self {
            average: 0.0,
            count: 0,
            distribution: (1..=5).map(|star| (star, 0)).collect(),
        }
    }
}

/// Response body for the list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductReviewsResponse {
    pub stats: StatsSummary,
    pub reviews: Vec<NormalizedReview>,
}

// ============ Submission Models ============

/// Client-supplied review submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionRequest {
    pub handle: String,
    pub name: String,
    pub email: String,
    pub rating: u8,
    pub body: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Payload forwarded to the provider's review-creation endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UpstreamSubmission {
    pub shop_domain: String,
    pub platform: String,
    /// The provider's numeric product id resolved from the handle map.
    pub id: u64,
    pub name: String,
    pub email: String,
    pub rating: u8,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub ip_addr: String,
}

// ============ Observability Models ============

/// A defaulted or out-of-range field observed while normalizing a raw
/// review. Collected and logged rather than failing the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub review_id: Option<i64>,
    pub field: &'static str,
    pub detail: String,
}
