//! Review appending.

use super::pipeline::FieldPipeline;
use crate::error::SubmissionError;
use crate::models::{Review, ReviewList};
use crate::store::FieldRef;
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

/// A decoded review submission.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSubmission {
    pub item_id: String,
    pub text: String,
    pub author: Option<String>,
    pub score: Option<f64>,
}

/// Appends reviews to the stored reviews field.
pub struct ReviewAppender {
    pipeline: Arc<FieldPipeline>,
    field: FieldRef,
}

impl ReviewAppender {
    pub fn new(pipeline: Arc<FieldPipeline>, field: FieldRef) -> Self {
        Self { pipeline, field }
    }

    /// Append one review and return it as stored.
    ///
    /// The timestamp is assigned here, inside the update, so list order and
    /// timestamp order agree when updates are serialized.
    pub async fn append(&self, submission: &ReviewSubmission) -> Result<Review, SubmissionError> {
        if submission.item_id.trim().is_empty() {
            return Err(SubmissionError::validation("Missing product_id"));
        }
        if submission.text.trim().is_empty() {
            return Err(SubmissionError::validation("Missing review text"));
        }

        let mut created = None;
        let list = self
            .pipeline
            .update(
                &submission.item_id,
                &self.field,
                ReviewList::from_value,
                |list| {
                    let review = Review::new(
                        submission.author.as_deref(),
                        &submission.text,
                        submission.score,
                        Utc::now(),
                    );
                    list.push(&review)?;
                    created = Some(review);
                    Ok(())
                },
            )
            .await?;

        let review = created
            .ok_or_else(|| SubmissionError::Unexpected("review was not created".to_string()))?;
        info!(
            "Saved review by {} for item {} ({} review(s) total)",
            review.author,
            submission.item_id,
            list.len()
        );
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ANONYMOUS_AUTHOR;
    use crate::store::{InMemoryFieldStore, ItemLocks};
    use serde_json::{json, Value};

    fn field() -> FieldRef {
        FieldRef::new("custom", "custom_reviews")
    }

    fn appender(store: Arc<InMemoryFieldStore>) -> ReviewAppender {
        let pipeline = Arc::new(FieldPipeline::new(store, Some(Arc::new(ItemLocks::new()))));
        ReviewAppender::new(pipeline, field())
    }

    fn review(text: &str, author: Option<&str>) -> ReviewSubmission {
        ReviewSubmission {
            item_id: "1".to_string(),
            text: text.to_string(),
            author: author.map(String::from),
            score: None,
        }
    }

    fn stored(store: &InMemoryFieldStore) -> Vec<Value> {
        serde_json::from_str(&store.get("1", &field()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_appends_after_prior_review() {
        let store = Arc::new(InMemoryFieldStore::new());
        store.seed("1", &field(), r#"[{"author": "A", "text": "ok"}]"#);
        let app = appender(store.clone());

        let before = Utc::now();
        let saved = app.append(&review("great", Some("B"))).await.unwrap();
        let after = Utc::now();

        let list = stored(&store);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0], json!({"author": "A", "text": "ok"}));
        assert_eq!(list[1]["author"], json!("B"));
        assert_eq!(list[1]["text"], json!("great"));
        assert_eq!(list[1]["score"], Value::Null);
        assert!(saved.submitted_at >= before && saved.submitted_at <= after);
        assert!(list[1]["submitted_at"].is_string());
    }

    #[tokio::test]
    async fn test_length_grows_by_one_per_append() {
        let store = Arc::new(InMemoryFieldStore::new());
        let app = appender(store.clone());

        for i in 0..5 {
            app.append(&review(&format!("review {}", i), None)).await.unwrap();
        }

        let list = stored(&store);
        assert_eq!(list.len(), 5);
        for (i, entry) in list.iter().enumerate() {
            assert_eq!(entry["text"], json!(format!("review {}", i)));
            assert_eq!(entry["author"], json!(ANONYMOUS_AUTHOR));
        }
    }

    #[tokio::test]
    async fn test_duplicates_are_kept() {
        let store = Arc::new(InMemoryFieldStore::new());
        let app = appender(store.clone());

        app.append(&review("same", Some("A"))).await.unwrap();
        app.append(&review("same", Some("A"))).await.unwrap();

        assert_eq!(stored(&store).len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_prior_list_is_replaced() {
        for prior in ["{\"author\": \"A\"}", "oops", "42"] {
            let store = Arc::new(InMemoryFieldStore::new());
            store.seed("1", &field(), prior);
            let app = appender(store.clone());

            app.append(&review("fresh", None)).await.unwrap();
            assert_eq!(stored(&store).len(), 1);
        }
    }

    #[tokio::test]
    async fn test_score_is_kept() {
        let store = Arc::new(InMemoryFieldStore::new());
        let app = appender(store.clone());
        let mut sub = review("nice", Some("C"));
        sub.score = Some(4.5);

        let saved = app.append(&sub).await.unwrap();
        assert_eq!(saved.score, Some(4.5));
        assert_eq!(stored(&store)[0]["score"], json!(4.5));
    }

    #[tokio::test]
    async fn test_validation_happens_before_store_calls() {
        let store = Arc::new(InMemoryFieldStore::new());
        let app = appender(store.clone());

        let err = app.append(&review("   ", Some("A"))).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing review text");

        let mut sub = review("text", None);
        sub.item_id = String::new();
        let err = app.append(&sub).await.unwrap_err();
        assert_eq!(err.to_string(), "Missing product_id");

        assert_eq!(store.read_count(), 0);
        assert_eq!(store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_read_failure_aborts() {
        let store = Arc::new(InMemoryFieldStore::new());
        store.fail_reads("timeout");
        let app = appender(store.clone());

        assert!(matches!(
            app.append(&review("hello", None)).await,
            Err(SubmissionError::RemoteRead(_))
        ));
        assert_eq!(store.write_count(), 0);
    }
}
