//! Submission decoding and dispatch.
//!
//! A request body is routed to exactly one pipeline: text reviews go to the
//! review appender, everything else to the rating aggregator. Warmup pings
//! are acknowledged without touching the store.

use crate::aggregate::{
    FieldPipeline, RatingAggregator, RatingSubmission, ReviewAppender, ReviewSubmission,
};
use crate::config::Config;
use crate::error::SubmissionError;
use crate::models::{coerce_number, RatingRecord, Review};
use crate::store::{FieldStore, ItemLocks};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// A decoded submission, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    Warmup,
    Rating(RatingSubmission),
    Review(ReviewSubmission),
}

/// Result of a dispatched submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Warmup,
    Rated(RatingRecord),
    Reviewed(Review),
}

/// Read the item id, accepting non-empty strings and non-negative integers.
fn item_id(body: &Map<String, Value>) -> Option<String> {
    match body.get("product_id")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) if n.is_u64() => n.as_u64().map(|id| id.to_string()),
        _ => None,
    }
}

impl Submission {
    /// Decode a request body.
    pub fn decode(body: &Value) -> Result<Self, SubmissionError> {
        let body = body
            .as_object()
            .ok_or_else(|| SubmissionError::validation("Request body must be a JSON object"))?;

        // A bare marker is a ping; anything else must name an item.
        let is_warmup = body.get("warmup") == Some(&Value::Bool(true));
        if is_warmup && body.len() == 1 {
            return Ok(Submission::Warmup);
        }

        let item_id = item_id(body).ok_or_else(|| SubmissionError::validation("Missing product_id"))?;

        match body.get("review") {
            Some(Value::Null) | None => Ok(Submission::Rating(RatingSubmission::from_body(
                item_id, body,
            ))),
            Some(review) => Ok(Submission::Review(ReviewSubmission {
                item_id,
                text: review.as_str().unwrap_or_default().to_string(),
                author: body.get("name").and_then(Value::as_str).map(String::from),
                score: body.get("rating").and_then(coerce_number),
            })),
        }
    }
}

/// Routes decoded submissions to the two pipelines.
pub struct SubmissionRouter {
    ratings: RatingAggregator,
    reviews: ReviewAppender,
}

impl SubmissionRouter {
    pub fn new(ratings: RatingAggregator, reviews: ReviewAppender) -> Self {
        Self { ratings, reviews }
    }

    /// Wire both pipelines to one store using the given configuration.
    pub fn from_config(store: Arc<dyn FieldStore>, config: &Config) -> Self {
        let locks = config
            .aggregation
            .serialize_per_item
            .then(|| Arc::new(ItemLocks::new()));
        let pipeline = Arc::new(FieldPipeline::new(store, locks));
        info!(
            "Per-item serialization {}",
            if pipeline.is_serialized() { "enabled" } else { "disabled" }
        );

        Self::new(
            RatingAggregator::new(
                pipeline.clone(),
                config.fields.ratings_field(),
                config.aggregation.count_policy,
            )
            .skip_zero_values(config.aggregation.skip_zero_values),
            ReviewAppender::new(pipeline, config.fields.reviews_field()),
        )
    }

    /// Decode and handle one request body.
    pub async fn dispatch(&self, body: &Value) -> Result<Outcome, SubmissionError> {
        debug!("Incoming submission: {}", body);

        match Submission::decode(body)? {
            Submission::Warmup => Ok(Outcome::Warmup),
            Submission::Rating(rating) => self.ratings.submit(&rating).await.map(Outcome::Rated),
            Submission::Review(review) => {
                self.reviews.append(&review).await.map(Outcome::Reviewed)
            }
        }
    }
}
