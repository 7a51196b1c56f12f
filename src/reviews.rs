//! The fetch/filter/transform pipeline: rating coercion, stats
//! aggregation, the publish filter, and raw -> frontend normalization.
//!
//! Everything here is a pure function over already-fetched records so
//! the whole pipeline is testable without a provider in the loop.

use crate::models::{
    FieldIssue, MediaItem, MediaType, NormalizedReview, RawReview, StatsSummary,
};
use serde_json::Value;

/// Verification strings the provider uses for confirmed purchases.
const VERIFIED_VALUES: [&str; 5] = [
    "buyer",
    "verified_buyer",
    "confirmed-buyer",
    "verified-purchase",
    "email",
];

/// Attempts integer conversion of a loosely typed rating value.
///
/// Numbers are truncated toward zero; strings are parsed only when they
/// are plain integers. Anything else is `None`.
fn parse_rating(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Coerces a raw rating into the 1..=5 range.
///
/// Missing or non-numeric ratings default to 5; out-of-range values are
/// clamped.
pub fn coerce_rating(raw: Option<&Value>) -> u8 {
    let rating = raw.and_then(parse_rating).unwrap_or(5);
    rating.clamp(1, 5) as u8
}

/// Computes count, rounded average, and the 1..=5 star histogram over a
/// set of reviews.
///
/// Empty input yields a zero-valued summary with an all-zero histogram.
pub fn calculate_stats(reviews: &[RawReview]) -> StatsSummary {
    let count = reviews.len();
    if count == 0 {
        return StatsSummary::empty();
    }

    let mut summary = StatsSummary::empty();
    summary.count = count;

    let mut total: u64 = 0;
    for review in reviews {
        let rating = coerce_rating(review.rating.as_ref());
        *summary.distribution.entry(rating).or_insert(0) += 1;
        total += rating as u64;
    }

    let average = total as f64 / count as f64;
    summary.average = (average * 100.0).round() / 100.0;
    summary
}

/// Retention predicate for the list endpoint: the review must belong to
/// the requested handle and be explicitly published. An absent
/// `published` flag excludes the review.
pub fn is_published_for_handle(review: &RawReview, handle: &str) -> bool {
    review.product_handle.as_deref() == Some(handle) && review.published == Some(true)
}

/// Maps one raw provider record into the frontend's stable shape.
///
/// Never fails: missing fields are defaulted, and every defaulted or
/// out-of-range field is reported as a [`FieldIssue`] so omissions stay
/// observable without breaking the response.
pub fn normalize_review(review: &RawReview) -> (NormalizedReview, Vec<FieldIssue>) {
    let mut issues = Vec::new();
    let issue = |field: &'static str, detail: String| FieldIssue {
        review_id: review.id,
        field,
        detail,
    };

    if review.id.is_none() {
        issues.push(issue("id", "missing".to_string()));
    }
    if review.published.is_none() {
        issues.push(issue("published", "missing".to_string()));
    }

    // Rating
    let rating = match review.rating.as_ref() {
        None => {
            issues.push(issue("rating", "missing, defaulted to 5".to_string()));
            5
        }
        Some(value) => match parse_rating(value) {
            None => {
                issues.push(issue(
                    "rating",
                    format!("not an integer ({}), defaulted to 5", value),
                ));
                5
            }
            Some(n) if !(1..=5).contains(&n) => {
                issues.push(issue(
                    "rating",
                    format!("out of range ({}), clamped", n),
                ));
                n.clamp(1, 5) as u8
            }
            Some(n) => n as u8,
        },
    };

    // Media: images first, preserving provider order, then videos.
    let mut media = Vec::new();
    for picture in &review.pictures {
        let url = picture
            .urls
            .as_ref()
            .and_then(|urls| urls.original.clone().or_else(|| urls.huge.clone()))
            .or_else(|| picture.url.clone())
            .filter(|u| !u.is_empty());
        match url {
            Some(url) => media.push(MediaItem {
                media_type: MediaType::Image,
                url,
            }),
            None => issues.push(issue("pictures", "entry with no resolvable URL".to_string())),
        }
    }
    for video in &review.videos {
        let url = video
            .url
            .clone()
            .or_else(|| video.original_url.clone())
            .filter(|u| !u.is_empty());
        if let Some(url) = url {
            media.push(MediaItem {
                media_type: MediaType::Video,
                url,
            });
        }
    }

    // Author: explicit display name wins over the nested reviewer name.
    let raw_author = review
        .user_name
        .clone()
        .or_else(|| review.reviewer.as_ref().and_then(|r| r.name.clone()));
    if raw_author.is_none() {
        issues.push(issue("reviewer", "no author name, using Anonymous".to_string()));
    }
    let mut author = raw_author.unwrap_or_else(|| "Anonymous".to_string());
    if author.trim().eq_ignore_ascii_case("anonymous") {
        author = "Verified Buyer".to_string();
    }
    let initials = author
        .chars()
        .next()
        .map(|c| c.to_uppercase().to_string())
        .unwrap_or_else(|| "A".to_string());

    // Verification
    let verification_type = review
        .verified
        .clone()
        .unwrap_or_else(|| "nothing".to_string());
    let is_verified = VERIFIED_VALUES.contains(&verification_type.as_str());

    let normalized = NormalizedReview {
        id: review.id,
        title: review.title.clone(),
        body: review.body.clone(),
        rating,
        author,
        initials,
        is_verified,
        date: review.created_at.clone(),
        media,
        verification_type,
    };

    (normalized, issues)
}
