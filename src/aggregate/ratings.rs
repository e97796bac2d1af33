//! Rating aggregation.
//!
//! Folds one multi-attribute rating submission into the item's stored
//! `RatingRecord`: each accepted value updates its attribute's running mean
//! and the submission counter moves according to the [`CountPolicy`].

use super::pipeline::FieldPipeline;
use crate::error::SubmissionError;
use crate::models::{coerce_number, Attribute, RatingRecord};
use crate::store::FieldRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// When `total_submissions` is incremented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountPolicy {
    /// Every rating submission counts, even one with no usable values.
    #[default]
    EverySubmission,
    /// Only submissions with at least one accepted value count.
    WithValuesOnly,
}

/// A decoded rating submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RatingSubmission {
    pub item_id: String,
    /// Accepted values, at most one per attribute.
    pub values: Vec<(Attribute, f64)>,
}

impl RatingSubmission {
    /// Collect the accepted attribute values from a request body.
    ///
    /// Unknown keys are ignored, as are values that don't coerce to a
    /// number.
    pub fn from_body(item_id: impl Into<String>, body: &Map<String, Value>) -> Self {
        let values = Attribute::ALL
            .iter()
            .filter_map(|attr| {
                let value = body.get(attr.as_str()).and_then(coerce_number)?;
                Some((*attr, value))
            })
            .collect();

        Self {
            item_id: item_id.into(),
            values,
        }
    }
}

/// Apply a submission's values to a record. Returns how many were folded in.
pub fn apply_rating(
    record: &mut RatingRecord,
    values: &[(Attribute, f64)],
    policy: CountPolicy,
) -> usize {
    if policy == CountPolicy::EverySubmission || !values.is_empty() {
        record.total_submissions = record.total_submissions.saturating_add(1);
    }

    for (attr, value) in values {
        record.observe(*attr, *value);
    }

    values.len()
}

/// Merges rating submissions into the stored ratings field.
pub struct RatingAggregator {
    pipeline: Arc<FieldPipeline>,
    field: FieldRef,
    policy: CountPolicy,
    skip_zero_values: bool,
}

impl RatingAggregator {
    pub fn new(pipeline: Arc<FieldPipeline>, field: FieldRef, policy: CountPolicy) -> Self {
        Self {
            pipeline,
            field,
            policy,
            skip_zero_values: false,
        }
    }

    /// Treat a value of 0 as "not rated" instead of folding it in.
    pub fn skip_zero_values(mut self, skip: bool) -> Self {
        self.skip_zero_values = skip;
        self
    }

    /// Merge one submission and return the record as written.
    pub async fn submit(
        &self,
        submission: &RatingSubmission,
    ) -> Result<RatingRecord, SubmissionError> {
        if submission.item_id.trim().is_empty() {
            return Err(SubmissionError::validation("Missing product_id"));
        }

        let values: Vec<(Attribute, f64)> = submission
            .values
            .iter()
            .copied()
            .filter(|(_, value)| !(self.skip_zero_values && *value == 0.0))
            .collect();
        debug!("Rating submission for {}: {:?}", submission.item_id, values);

        let policy = self.policy;
        let record = self
            .pipeline
            .update(
                &submission.item_id,
                &self.field,
                RatingRecord::from_value,
                |record| {
                    apply_rating(record, &values, policy);
                    Ok(())
                },
            )
            .await?;

        info!(
            "Saved {} rating value(s) for item {} (total submissions: {})",
            values.len(),
            submission.item_id,
            record.total_submissions
        );
        Ok(record)
    }
}
