//! Aggregation pipelines.
//!
//! Two independent pipelines share one read-modify-write driver:
//! - ratings: per-attribute running means plus a submission counter
//! - reviews: an append-only list of written reviews

pub mod pipeline;
pub mod ratings;
pub mod reviews;

pub use pipeline::{decode_or_default, FieldPipeline};
pub use ratings::{apply_rating, CountPolicy, RatingAggregator, RatingSubmission};
pub use reviews::{ReviewAppender, ReviewSubmission};
