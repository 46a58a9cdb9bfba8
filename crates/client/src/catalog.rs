//! Resource registry for the catalog backend.
//!
//! [`Catalog`] binds each cache key family to the fetch that fills it:
//!
//! | key                                | request                                     |
//! |------------------------------------|---------------------------------------------|
//! | `["movies","list",params]`         | `GET /movies?{params}`                      |
//! | `["movies","detail",id]`           | `GET /movies/{id}`, `/reviews`, `/theaters` |
//! | `["movies","showing"]`             | `GET /movies?is_showing=true`               |
//! | `["theaters","list"]`              | `GET /theaters`                             |
//!
//! It is built once at startup and cloned into whatever needs it; clones share the caches.

use std::sync::Arc;

use marquee_query::{CacheOptions, Query, QueryCache, Subscription};
use marquee_shared::config::ClientConfig;
use marquee_shared::http::HttpClient;
use marquee_shared::models::{Envelope, Movie, MoviePage, Review, Theater};
use marquee_shared::ClientError;
use tokio_util::sync::CancellationToken;

use crate::params::ListParams;

pub mod movie_keys {
    use marquee_query::CacheKey;

    use crate::params::ListParams;

    pub fn all() -> CacheKey {
        CacheKey::new("movies")
    }

    pub fn lists() -> CacheKey {
        all().with("list")
    }

    pub fn list(params: &ListParams) -> CacheKey {
        lists().with(params.key_segment())
    }

    pub fn details() -> CacheKey {
        all().with("detail")
    }

    pub fn detail(id: i64) -> CacheKey {
        details().with(id)
    }

    pub fn showing() -> CacheKey {
        all().with("showing")
    }
}

pub mod theater_keys {
    use marquee_query::CacheKey;

    pub fn all() -> CacheKey {
        CacheKey::new("theaters")
    }

    pub fn list() -> CacheKey {
        all().with("list")
    }
}

#[derive(Clone)]
pub struct Catalog {
    http: Arc<HttpClient>,
    movie_lists: QueryCache<MoviePage>,
    movie_details: QueryCache<Movie>,
    showing: QueryCache<Vec<Movie>>,
    theaters: QueryCache<Vec<Theater>>,
}

impl Catalog {
    pub fn new(http: Arc<HttpClient>, options: CacheOptions) -> Self {
        Self {
            http,
            movie_lists: QueryCache::new(options.clone()),
            movie_details: QueryCache::new(options.clone()),
            showing: QueryCache::new(options.clone()),
            theaters: QueryCache::new(options),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let http = Arc::new(HttpClient::new(config)?);
        let options = CacheOptions {
            stale_time: config.stale_time,
            gc_time: config.gc_time,
            ..CacheOptions::default()
        };
        Ok(Self::new(http, options))
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    pub fn movies_list(&self, params: &ListParams) -> Query<MoviePage> {
        let http = self.http.clone();
        let params = params.clone();
        Query::new(movie_keys::list(&params), move |cancel| {
            let http = http.clone();
            let params = params.clone();
            async move { fetch_movies(&http, &params, &cancel).await }
        })
    }

    pub fn movie_detail(&self, id: i64) -> Query<Movie> {
        let http = self.http.clone();
        Query::new(movie_keys::detail(id), move |cancel| {
            let http = http.clone();
            async move { fetch_movie_detail(&http, id, &cancel).await }
        })
    }

    pub fn movies_showing(&self) -> Query<Vec<Movie>> {
        let http = self.http.clone();
        Query::new(movie_keys::showing(), move |cancel| {
            let http = http.clone();
            async move {
                let page = fetch_movies(&http, &ListParams::showing(), &cancel).await?;
                Ok::<_, ClientError>(page.movies)
            }
        })
    }

    pub fn theaters_list(&self) -> Query<Vec<Theater>> {
        let http = self.http.clone();
        Query::new(theater_keys::list(), move |cancel| {
            let http = http.clone();
            async move {
                let body = http.get_json("/theaters", &[], &cancel).await?;
                Ok::<_, ClientError>(Envelope::<Vec<Theater>>::from_body_or_default(body)?.data)
            }
        })
    }

    pub fn subscribe_movies(&self, params: &ListParams) -> Subscription<MoviePage> {
        self.movie_lists.subscribe(self.movies_list(params))
    }

    pub fn subscribe_movie(&self, id: i64) -> Subscription<Movie> {
        self.movie_details.subscribe(self.movie_detail(id))
    }

    pub fn subscribe_showing(&self) -> Subscription<Vec<Movie>> {
        self.showing.subscribe(self.movies_showing())
    }

    pub fn subscribe_theaters(&self) -> Subscription<Vec<Theater>> {
        self.theaters.subscribe(self.theaters_list())
    }

    /// Refetches one movie's detail entry.
    pub fn invalidate_movie(&self, id: i64) -> usize {
        self.movie_details.invalidate(&movie_keys::detail(id))
    }

    pub fn invalidate_theaters(&self) -> usize {
        self.theaters.invalidate(&theater_keys::all())
    }
}

async fn fetch_movies(
    http: &HttpClient,
    params: &ListParams,
    cancel: &CancellationToken,
) -> Result<MoviePage, ClientError> {
    let body = http.get_json("/movies", &params.query_pairs(), cancel).await?;
    let envelope = Envelope::<Vec<Movie>>::from_body_or_default(body)?;
    Ok(MoviePage {
        movies: envelope.data,
        pagination: envelope.pagination,
    })
}

/// Base record, then reviews, then theaters. A failure at any step fails the whole fetch.
async fn fetch_movie_detail(
    http: &HttpClient,
    id: i64,
    cancel: &CancellationToken,
) -> Result<Movie, ClientError> {
    let body = http.get_json(&format!("/movies/{id}"), &[], cancel).await?;
    let mut movie = Envelope::<Movie>::from_body(body, "movie")?.data;

    let body = http
        .get_json(&format!("/movies/{}/reviews", movie.movie_id), &[], cancel)
        .await?;
    movie.reviews = Envelope::<Vec<Review>>::from_body_or_default(body)?.data;

    let body = http
        .get_json(&format!("/movies/{}/theaters", movie.movie_id), &[], cancel)
        .await?;
    movie.theaters = Envelope::<Vec<Theater>>::from_body_or_default(body)?.data;

    tracing::debug!(
        movie_id = movie.movie_id,
        reviews = movie.reviews.len(),
        theaters = movie.theaters.len(),
        "movie detail assembled"
    );

    Ok(movie)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use axum::extract::{Path, RawQuery};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use marquee_query::QueryStatus;
    use marquee_shared::config::parse_base_url;
    use serde_json::{json, Value};

    use super::*;
    use crate::params::{SortField, SortOrder};

    pub(crate) async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    pub(crate) fn catalog_for(base: &str) -> Catalog {
        let config = ClientConfig {
            api_base_url: parse_base_url(base).unwrap(),
            request_timeout: Duration::from_secs(5),
            ..ClientConfig::default()
        };
        Catalog::from_config(&config).unwrap()
    }

    pub(crate) fn movie_json(id: i64, title: &str) -> Value {
        json!({
            "movie_id": id,
            "title": title,
            "description": "",
            "image_url": "",
            "runtime_in_minutes": 120,
            "rating": "PG",
            "is_showing": true
        })
    }

    #[test]
    fn key_families_nest_under_their_roots() {
        let params = ListParams {
            page: Some(1),
            ..ListParams::default()
        };
        assert!(movie_keys::list(&params).starts_with(&movie_keys::lists()));
        assert!(movie_keys::detail(4).starts_with(&movie_keys::all()));
        assert!(movie_keys::showing().starts_with(&movie_keys::all()));
        assert!(!theater_keys::list().starts_with(&movie_keys::all()));
        assert_eq!(movie_keys::detail(4).to_string(), r#"["movies","detail",4]"#);
    }

    #[tokio::test]
    async fn list_sends_query_and_reads_envelope() {
        let base = serve(Router::new().route(
            "/movies",
            get(|RawQuery(q): RawQuery| async move {
                Json(json!({
                    "data": [movie_json(1, q.as_deref().unwrap_or(""))],
                    "pagination": {
                        "page": 2, "limit": 5, "totalPages": 4, "totalCount": 18,
                        "hasNextPage": true, "hasPreviousPage": true
                    }
                }))
            }),
        ))
        .await;

        let catalog = catalog_for(&base);
        let params = ListParams {
            page: Some(2),
            limit: Some(5),
            sort_by: Some(SortField::Rating),
            sort_order: Some(SortOrder::Desc),
            title: Some("heat".into()),
            ..ListParams::default()
        };
        let mut sub = catalog.subscribe_movies(&params);
        let entry = sub.settled().await;

        assert_eq!(entry.status, QueryStatus::Success);
        let page = entry.data.unwrap();
        assert_eq!(
            page.movies[0].title,
            "page=2&limit=5&sortBy=rating&sortOrder=desc&title=heat"
        );
        assert_eq!(page.pagination.unwrap().total_pages, 4);
    }

    #[tokio::test]
    async fn bare_list_payload_has_no_pagination() {
        let base = serve(Router::new().route(
            "/movies",
            get(|| async { Json(json!([movie_json(1, "Heat"), movie_json(2, "Up")])) }),
        ))
        .await;

        let mut sub = catalog_for(&base).subscribe_movies(&ListParams::default());
        let page = sub.settled().await.data.unwrap();
        assert_eq!(page.movies.len(), 2);
        assert!(page.pagination.is_none());
    }

    #[tokio::test]
    async fn showing_asks_only_for_showing_movies() {
        let base = serve(Router::new().route(
            "/movies",
            get(|RawQuery(q): RawQuery| async move {
                assert_eq!(q.as_deref(), Some("is_showing=true"));
                Json(json!({ "data": [movie_json(3, "Alien")] }))
            }),
        ))
        .await;

        let mut sub = catalog_for(&base).subscribe_showing();
        let entry = sub.settled().await;
        assert_eq!(entry.status, QueryStatus::Success);
        assert_eq!(entry.data.unwrap()[0].movie_id, 3);
    }

    #[tokio::test]
    async fn detail_merges_reviews_and_theaters() {
        let base = serve(
            Router::new()
                .route(
                    "/movies/{id}",
                    get(|Path(id): Path<i64>| async move { Json(json!({ "data": movie_json(id, "Heat") })) }),
                )
                .route(
                    "/movies/{id}/reviews",
                    get(|Path(id): Path<i64>| async move {
                        Json(json!({ "data": [{
                            "review_id": 10, "movie_id": id, "score": 4, "content": "tense",
                            "critic": { "preferred_name": "Ana", "surname": "Ruiz", "organization_name": "Daily" }
                        }] }))
                    }),
                )
                .route(
                    "/movies/{id}/theaters",
                    get(|| async { Json(json!([{ "theater_id": 2, "name": "Rex", "city": "Austin" }])) }),
                ),
        )
        .await;

        let mut sub = catalog_for(&base).subscribe_movie(7);
        let movie = sub.settled().await.data.unwrap();
        assert_eq!(movie.movie_id, 7);
        assert_eq!(movie.reviews.len(), 1);
        assert_eq!(movie.reviews[0].critic.as_ref().unwrap().preferred_name, "Ana");
        assert_eq!(movie.theaters[0].name(), Some("Rex"));
        assert_eq!(movie.theaters[0].details["city"], "Austin");
    }

    #[tokio::test]
    async fn failed_base_request_skips_dependents() {
        let dependents = Arc::new(AtomicUsize::new(0));
        let reviews_hits = dependents.clone();
        let theaters_hits = dependents.clone();
        let base = serve(
            Router::new()
                .route("/movies/{id}", get(|| async { (StatusCode::NOT_FOUND, "no such movie") }))
                .route(
                    "/movies/{id}/reviews",
                    get(move || {
                        reviews_hits.fetch_add(1, Ordering::SeqCst);
                        async { Json(json!([])) }
                    }),
                )
                .route(
                    "/movies/{id}/theaters",
                    get(move || {
                        theaters_hits.fetch_add(1, Ordering::SeqCst);
                        async { Json(json!([])) }
                    }),
                ),
        )
        .await;

        let mut sub = catalog_for(&base).subscribe_movie(99);
        let entry = sub.settled().await;
        assert_eq!(entry.status, QueryStatus::Error);
        assert_eq!(entry.error.unwrap().status(), Some(404));
        assert_eq!(dependents.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_dependent_fails_the_whole_detail() {
        let base = serve(
            Router::new()
                .route("/movies/{id}", get(|| async { Json(movie_json(5, "Up")) }))
                .route("/movies/{id}/reviews", get(|| async { Json(json!([])) }))
                .route(
                    "/movies/{id}/theaters",
                    get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
                ),
        )
        .await;

        let catalog = catalog_for(&base);
        let mut sub = catalog.subscribe_movie(5);
        let entry = sub.settled().await;
        assert_eq!(entry.status, QueryStatus::Error);
        assert!(entry.data.is_none());
        assert_eq!(entry.error.unwrap().status(), Some(502));
    }

    #[tokio::test]
    async fn empty_base_movie_is_a_decode_error() {
        let base = serve(Router::new().route(
            "/movies/{id}",
            get(|| async { StatusCode::NO_CONTENT }),
        ))
        .await;

        let mut sub = catalog_for(&base).subscribe_movie(1);
        let entry = sub.settled().await;
        assert_eq!(entry.error.unwrap().code(), "DECODE_ERROR");
    }

    #[tokio::test]
    async fn theaters_list_and_invalidation_refetches() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let base = serve(Router::new().route(
            "/theaters",
            get(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) as i64;
                async move { Json(json!({ "data": [{ "theater_id": n, "name": "Rex" }] })) }
            }),
        ))
        .await;

        let catalog = catalog_for(&base);
        let mut sub = catalog.subscribe_theaters();
        let first = sub.settled().await;
        assert_eq!(first.data.unwrap()[0].theater_id, 0);

        assert_eq!(catalog.invalidate_theaters(), 1);
        let second = sub.settled().await;
        assert_eq!(second.data.unwrap()[0].theater_id, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_detail_stops_before_theaters_and_restores_idle() {
        let reviews_started = Arc::new(tokio::sync::Notify::new());
        let theaters_hits = Arc::new(AtomicUsize::new(0));
        let started = reviews_started.clone();
        let counter = theaters_hits.clone();
        let base = serve(
            Router::new()
                .route(
                    "/movies/{id}",
                    get(|Path(id): Path<i64>| async move { Json(json!({ "data": movie_json(id, "Heat") })) }),
                )
                .route(
                    "/movies/{id}/reviews",
                    get(move || {
                        started.notify_one();
                        async {
                            tokio::time::sleep(Duration::from_millis(300)).await;
                            Json(json!([]))
                        }
                    }),
                )
                .route(
                    "/movies/{id}/theaters",
                    get(move || {
                        counter.fetch_add(1, Ordering::SeqCst);
                        async { Json(json!([])) }
                    }),
                ),
        )
        .await;

        let catalog = catalog_for(&base);
        let sub = catalog.subscribe_movie(7);
        reviews_started.notified().await;
        assert!(sub.cancel());

        let entry = sub.snapshot();
        assert_eq!(entry.status, QueryStatus::Idle);
        assert!(!entry.is_fetching);
        assert!(entry.error.is_none());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let entry = sub.snapshot();
        assert_eq!(entry.status, QueryStatus::Idle);
        assert!(entry.data.is_none());
        assert!(entry.error.is_none());
        assert_eq!(theaters_hits.load(Ordering::SeqCst), 0);
        assert!(!sub.cancel());
    }
}
