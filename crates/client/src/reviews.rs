//! Review score adjustment.
//!
//! A score moves by a signed step and must stay within 1 to 5. Out-of-range changes are
//! rejected before any request goes out. A successful write refetches the movie's detail
//! entry so the new score and average show up.

use marquee_query::{Mutation, MutationHooks};
use marquee_shared::models::Review;
use marquee_shared::ClientError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::catalog::Catalog;

pub const MIN_SCORE: i32 = 1;
pub const MAX_SCORE: i32 = 5;

#[derive(Serialize)]
struct ScoreBody {
    data: ScoreData,
}

#[derive(Serialize)]
struct ScoreData {
    score: i32,
}

/// A score write that the backend accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreChange {
    pub review_id: i64,
    pub movie_id: i64,
    pub score: i32,
}

/// The score `review` would have after moving by `delta`.
pub fn next_score(review: &Review, delta: i32) -> Result<i32, ClientError> {
    let score = review.score.saturating_add(delta);
    if !(MIN_SCORE..=MAX_SCORE).contains(&score) {
        return Err(ClientError::Validation(format!(
            "score must be between {MIN_SCORE} and {MAX_SCORE}, got {score}"
        )));
    }
    Ok(score)
}

#[derive(Clone)]
pub struct ReviewScores {
    catalog: Catalog,
    mutation: Mutation,
}

impl ReviewScores {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog,
            mutation: Mutation::new(),
        }
    }

    pub fn is_updating(&self) -> bool {
        self.mutation.is_pending()
    }

    pub fn last_error(&self) -> Option<ClientError> {
        self.mutation.error()
    }

    /// Sends `PUT /reviews/{id}` with the adjusted score and, on success, invalidates the
    /// movie's detail entry. Failures are returned as-is; nothing is retried.
    pub async fn submit_score_change(&self, review: &Review, delta: i32) -> Result<ScoreChange, ClientError> {
        let score = next_score(review, delta)?;
        let change = ScoreChange {
            review_id: review.review_id,
            movie_id: review.movie_id,
            score,
        };

        let http = self.catalog.http().clone();
        let path = format!("/reviews/{}", review.review_id);
        let body = ScoreBody {
            data: ScoreData { score },
        };
        let write = async move {
            http.put_json(&path, &body, &CancellationToken::new()).await?;
            Ok::<_, ClientError>(change)
        };

        let catalog = self.catalog.clone();
        let hooks = MutationHooks::new().on_success(move |change: &ScoreChange| {
            let refetched = catalog.invalidate_movie(change.movie_id);
            tracing::info!(
                review_id = change.review_id,
                movie_id = change.movie_id,
                score = change.score,
                refetched = refetched,
                "review score updated"
            );
        });

        self.mutation.mutate(write, hooks).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::{get, put};
    use axum::{Json, Router};
    use marquee_query::QueryStatus;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use super::*;
    use crate::catalog::tests::{catalog_for, movie_json, serve};

    fn review(score: i32) -> Review {
        Review {
            review_id: 10,
            movie_id: 7,
            score,
            content: String::new(),
            critic: None,
        }
    }

    #[test]
    fn scores_stay_within_bounds() {
        assert_eq!(next_score(&review(3), 1).unwrap(), 4);
        assert_eq!(next_score(&review(2), -1).unwrap(), 1);
        assert_eq!(next_score(&review(5), 1).unwrap_err().code(), "VALIDATION_ERROR");
        assert_eq!(next_score(&review(1), -1).unwrap_err().code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn out_of_range_change_sends_nothing() {
        let puts = Arc::new(AtomicUsize::new(0));
        let counter = puts.clone();
        let base = serve(Router::new().route(
            "/reviews/{id}",
            put(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Json(json!({})) }
            }),
        ))
        .await;

        let scores = ReviewScores::new(catalog_for(&base));
        let err = scores.submit_score_change(&review(5), 1).await.unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(puts.load(Ordering::SeqCst), 0);
        assert!(scores.last_error().is_none());
    }

    #[tokio::test]
    async fn success_writes_score_and_refetches_detail() {
        let bodies: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let recorded = bodies.clone();
        let detail_hits = Arc::new(AtomicUsize::new(0));
        let hits = detail_hits.clone();

        let base = serve(
            Router::new()
                .route(
                    "/reviews/{id}",
                    put(move |Path(id): Path<i64>, Json(body): Json<Value>| {
                        recorded.lock().push(body.clone());
                        async move { Json(json!({ "data": { "review_id": id, "score": body["data"]["score"] } })) }
                    }),
                )
                .route(
                    "/movies/{id}",
                    get(move |Path(id): Path<i64>| {
                        hits.fetch_add(1, Ordering::SeqCst);
                        async move { Json(movie_json(id, "Heat")) }
                    }),
                )
                .route("/movies/{id}/reviews", get(|| async { Json(json!([])) }))
                .route("/movies/{id}/theaters", get(|| async { Json(json!([])) })),
        )
        .await;

        let catalog = catalog_for(&base);
        let mut detail = catalog.subscribe_movie(7);
        assert_eq!(detail.settled().await.status, QueryStatus::Success);

        let scores = ReviewScores::new(catalog.clone());
        let change = scores.submit_score_change(&review(3), 1).await.unwrap();
        assert_eq!(
            change,
            ScoreChange {
                review_id: 10,
                movie_id: 7,
                score: 4
            }
        );
        assert_eq!(bodies.lock()[0], json!({ "data": { "score": 4 } }));

        detail.settled().await;
        assert_eq!(detail_hits.load(Ordering::SeqCst), 2);
        assert!(!scores.is_updating());
    }

    #[tokio::test]
    async fn failed_write_surfaces_error_without_refetch() {
        let base = serve(Router::new().route(
            "/reviews/{id}",
            put(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "score rejected") }),
        ))
        .await;

        let scores = ReviewScores::new(catalog_for(&base));
        let err = scores.submit_score_change(&review(2), 1).await.unwrap_err();
        assert_eq!(
            err,
            ClientError::Http {
                status: 422,
                body: "score rejected".into()
            }
        );
        assert_eq!(scores.last_error(), Some(err));
    }
}
