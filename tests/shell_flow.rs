use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use cinebox::api::{AuthApi, FavoritesApi, MoviesApi, ReviewsApi};
use cinebox::app::{build_router, AppState};
use cinebox::catalog::query::SearchParams;
use cinebox::error::{ApiError, ApiResult};
use cinebox::models::{
    Comment, MoviePage, MovieRecord, MovieSummary, RatingStats, RawMovie, Session, UserProfile,
};
use cinebox::session::SessionStore;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;

const MOVIE_ID: &str = "65f1a2b3c4d5e6f708091a2b";

fn record(id: &str, title: &str, genres: &[&str]) -> MovieRecord {
    let raw: RawMovie = serde_json::from_value(json!({
        "_id": id,
        "originalTitle": title,
        "averageRating": 7.9,
        "releaseDate": "2016-11-11",
        "genres": genres,
        "runtime": 116,
        "trailer": "https://www.youtube.com/watch?v=tFMo3UJ4B4g",
        "spokenLanguages": ["English"],
    }))
    .unwrap();
    MovieRecord::from_raw(raw)
}

#[derive(Default)]
struct FakeBackend {
    stats_calls: AtomicUsize,
    ratings: Mutex<Vec<(String, u8)>>,
    comments: Mutex<Vec<String>>,
    favorites: Mutex<HashSet<String>>,
    reject_token: AtomicBool,
}

impl FakeBackend {
    fn auth_check(&self) -> ApiResult<()> {
        if self.reject_token.load(Ordering::SeqCst) {
            Err(ApiError::Unauthorized)
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl MoviesApi for FakeBackend {
    async fn list_movies(&self) -> ApiResult<Vec<MovieSummary>> {
        Ok(vec![
            record("1", "Arrival", &["Science Fiction"]).summary,
            record("2", "Free Solo", &["Documentary"]).summary,
            record("3", "Untagged", &["Biography"]).summary,
        ])
    }

    async fn search_movies(&self, _params: &SearchParams) -> ApiResult<MoviePage> {
        Ok(MoviePage {
            movies: vec![record(MOVIE_ID, "Arrival", &["Drama"]).summary],
            total_pages: Some(1),
            total_movies: Some(1),
        })
    }

    async fn fetch_movie(&self, id: &str) -> ApiResult<MovieRecord> {
        if id == MOVIE_ID {
            Ok(record(MOVIE_ID, "Arrival", &["Drama", "Sci-Fi"]))
        } else {
            Err(ApiError::NotFound { status: 404 })
        }
    }
}

#[async_trait::async_trait]
impl ReviewsApi for FakeBackend {
    async fn rating_stats(&self, _movie_id: &str) -> ApiResult<RatingStats> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        let mut stats = RatingStats::default();
        stats.total_ratings = self.ratings.lock().unwrap().len() as u64;
        Ok(stats)
    }

    async fn comments(&self, _movie_id: &str) -> ApiResult<Vec<Comment>> {
        Ok(vec![Comment {
            id: "c1".into(),
            author: "Grace".into(),
            body: "Loved it".into(),
            created_at: Some("2024-01-01T00:00:00Z".into()),
        }])
    }

    async fn user_rating(&self, _token: &str, _movie_id: &str) -> ApiResult<Option<u8>> {
        self.auth_check()?;
        Ok(None)
    }

    async fn submit_rating(&self, _token: &str, movie_id: &str, rating: u8) -> ApiResult<()> {
        self.auth_check()?;
        self.ratings
            .lock()
            .unwrap()
            .push((movie_id.to_string(), rating));
        Ok(())
    }

    async fn submit_comment(&self, _token: &str, _movie_id: &str, text: &str) -> ApiResult<Comment> {
        self.auth_check()?;
        self.comments.lock().unwrap().push(text.to_string());
        Ok(Comment {
            id: "c-new".into(),
            author: "Anonymous".into(),
            body: text.to_string(),
            created_at: None,
        })
    }
}

#[async_trait::async_trait]
impl FavoritesApi for FakeBackend {
    async fn favorites(&self, _token: &str) -> ApiResult<Vec<MovieSummary>> {
        self.auth_check()?;
        let ids = self.favorites.lock().unwrap().clone();
        Ok(ids
            .iter()
            .map(|id| record(id, "Arrival", &["Drama"]).summary)
            .collect())
    }

    async fn add_favorite(&self, _token: &str, movie_id: &str) -> ApiResult<()> {
        self.auth_check()?;
        self.favorites.lock().unwrap().insert(movie_id.to_string());
        Ok(())
    }

    async fn remove_favorite(&self, _token: &str, movie_id: &str) -> ApiResult<()> {
        self.auth_check()?;
        self.favorites.lock().unwrap().remove(movie_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl AuthApi for FakeBackend {
    async fn sign_in(&self, email: &str, password: &str) -> ApiResult<Session> {
        if password != "secret" {
            return Err(ApiError::Rejected {
                message: "Invalid credentials".into(),
            });
        }
        Ok(Session {
            token: "tok-1".into(),
            user: UserProfile {
                id: "u1".into(),
                name: "Ada".into(),
                email: email.to_string(),
            },
        })
    }

    async fn sign_up(&self, _name: &str, _email: &str, _password: &str) -> ApiResult<()> {
        Ok(())
    }

    async fn verify_email(&self, token: &str) -> ApiResult<bool> {
        Ok(token == "good")
    }

    async fn resend_verification(&self, _email: &str) -> ApiResult<()> {
        Ok(())
    }

    async fn fetch_user(&self, _token: &str, user_id: &str) -> ApiResult<UserProfile> {
        self.auth_check()?;
        Ok(UserProfile {
            id: user_id.to_string(),
            name: "Ada Lovelace".into(),
            email: String::new(),
        })
    }
}

struct Harness {
    app: Router,
    state: AppState,
    backend: Arc<FakeBackend>,
    session: SessionStore,
}

fn harness() -> Harness {
    let backend = Arc::new(FakeBackend::default());
    let session = SessionStore::in_memory();
    let state = AppState::new(
        session.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        backend.clone(),
        25,
    );
    Harness {
        app: build_router(state.clone()),
        state,
        backend,
        session,
    }
}

fn signed_in() -> Harness {
    let h = harness();
    h.session
        .save(&Session {
            token: "tok-1".into(),
            user: UserProfile {
                id: "u1".into(),
                name: "Ada".into(),
                email: "ada@example.com".into(),
            },
        })
        .unwrap();
    h
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let res = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let location = res
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, location, json)
}

#[tokio::test]
async fn health_and_unknown_routes() {
    let h = harness();
    let res = h
        .app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (status, _, body) = call(&h.app, "GET", "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Page not found");
}

#[tokio::test]
async fn protected_routes_redirect_without_session() {
    let h = harness();
    for uri in [
        "/profile".to_string(),
        "/favorites".to_string(),
        format!("/movie/{MOVIE_ID}"),
    ] {
        let (status, location, _) = call(&h.app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location.as_deref(), Some("/signin"), "{uri}");
    }
}

#[tokio::test]
async fn sign_in_validates_then_stores_session() {
    let h = harness();

    let (status, _, body) = call(
        &h.app,
        "POST",
        "/signin",
        Some(json!({ "email": "not-an-email", "password": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["email"], "Please enter a valid email address");
    assert_eq!(body["fields"]["password"], "Password is required");

    let (status, _, body) = call(
        &h.app,
        "POST",
        "/signin",
        Some(json!({ "email": "ada@example.com", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid credentials");
    assert!(!h.session.is_authenticated());

    let (status, _, body) = call(
        &h.app,
        "POST",
        "/signin",
        Some(json!({ "email": "ada@example.com", "password": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["redirect"], "/movies");
    assert_eq!(h.session.token().as_deref(), Some("tok-1"));

    let (status, location, _) = call(&h.app, "GET", "/signin", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/movies"));
    let (_, location, _) = call(&h.app, "GET", "/signup", None).await;
    assert_eq!(location.as_deref(), Some("/"));
}

#[tokio::test]
async fn sign_up_steps() {
    let h = harness();
    let (status, _, body) = call(
        &h.app,
        "POST",
        "/signup/profile",
        Some(json!({ "name": "", "email": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["fields"]["name"], "Name is required");

    let (status, _, body) = call(
        &h.app,
        "POST",
        "/signup",
        Some(json!({
            "name": "Ada",
            "email": "ada@example.com",
            "password": "abcdef",
            "confirmPassword": "abcdef"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["redirect"], "/verificationpending");
    assert!(!h.session.is_authenticated());
}

#[tokio::test]
async fn email_verification_states() {
    let h = harness();
    let (_, _, body) = call(&h.app, "GET", "/verify/good", None).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["redirect"], "/signin");
    assert_eq!(body["redirectAfterSecs"], 4);

    let (_, _, body) = call(&h.app, "GET", "/verify/bad", None).await;
    assert_eq!(body["status"], "error");

    let (status, _, body) = call(&h.app, "GET", "/verify", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No verification token provided.");
}

#[tokio::test]
async fn detail_page_loads_every_section() {
    let h = signed_in();
    h.session.cache_rating(MOVIE_ID, 3);

    let (status, _, body) = call(&h.app, "GET", &format!("/movie/{MOVIE_ID}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["page"];
    assert_eq!(page["movie"]["state"], "ready");
    assert_eq!(page["movie"]["value"]["title"], "Arrival");
    assert_eq!(page["stats"]["state"], "ready");
    assert_eq!(page["comments"]["value"][0]["author"], "Grace");
    assert_eq!(page["userRating"], 3);
    assert_eq!(page["isFavorite"], false);
    assert_eq!(page["trailer"]["state"], "embed");
    assert_eq!(body["facts"]["duration"], "1h 56m");
    assert_eq!(body["facts"]["userScore"], "79%");
}

#[tokio::test]
async fn invalid_movie_id_skips_review_fetches() {
    let h = signed_in();
    let (status, _, body) = call(&h.app, "GET", "/movie/not-an-id", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"]["stats"]["value"], "Invalid movie ID");
    assert_eq!(body["page"]["movie"]["value"], "Movie not found");
    assert_eq!(h.backend.stats_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rating_is_validated_before_any_request() {
    let h = signed_in();
    call(&h.app, "GET", &format!("/movie/{MOVIE_ID}"), None).await;
    let uri = format!("/movie/{MOVIE_ID}/rating");

    for bad in [json!(0), json!(6), json!(2.5)] {
        let (status, _, body) = call(&h.app, "POST", &uri, Some(json!({ "rating": bad }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "Please select a rating between 1 and 5");
    }
    assert!(h.backend.ratings.lock().unwrap().is_empty());
    assert_eq!(h.backend.stats_calls.load(Ordering::SeqCst), 1);

    let (status, _, body) = call(&h.app, "POST", &uri, Some(json!({ "rating": 4 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], 4);
    assert_eq!(body["stats"]["value"]["totalRatings"], 1);
    assert_eq!(h.backend.stats_calls.load(Ordering::SeqCst), 2);
    assert_eq!(h.session.cached_rating(MOVIE_ID), Some(4));

    let open = h.state.detail.current(MOVIE_ID).await.unwrap();
    assert_eq!(open.user_rating, Some(4));
}

#[tokio::test]
async fn comments_are_prepended_with_session_name() {
    let h = signed_in();
    call(&h.app, "GET", &format!("/movie/{MOVIE_ID}"), None).await;
    let uri = format!("/movie/{MOVIE_ID}/comments");

    let (status, _, _) = call(&h.app, "POST", &uri, Some(json!({ "comment": "   " }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(h.backend.comments.lock().unwrap().is_empty());

    let (status, _, body) = call(&h.app, "POST", &uri, Some(json!({ "comment": "Great film" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["author"], "Ada");
    assert_eq!(body["posted"], "Just now");

    let open = h.state.detail.current(MOVIE_ID).await.unwrap();
    let comments = open.comments.ready().unwrap();
    assert_eq!(comments.len(), 2);
    assert_eq!(comments[0].body, "Great film");
    assert_eq!(comments[0].author, "Ada");
}

#[tokio::test]
async fn favorite_toggle_waits_for_confirmation() {
    let h = signed_in();
    call(&h.app, "GET", &format!("/movie/{MOVIE_ID}"), None).await;
    let uri = format!("/movie/{MOVIE_ID}/favorite");

    let (_, _, body) = call(&h.app, "POST", &uri, None).await;
    assert_eq!(body["isFavorite"], true);
    assert!(h.backend.favorites.lock().unwrap().contains(MOVIE_ID));

    let (_, _, body) = call(&h.app, "POST", &uri, None).await;
    assert_eq!(body["isFavorite"], false);
    assert!(h.backend.favorites.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unauthorized_reply_clears_session() {
    let h = signed_in();
    h.backend.reject_token.store(true, Ordering::SeqCst);

    let (status, location, _) =
        call(&h.app, "POST", &format!("/movie/{MOVIE_ID}/favorite"), None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/signin"));
    assert!(!h.session.is_authenticated());
}

#[tokio::test]
async fn favorites_page_expires_session_on_unauthorized() {
    let h = signed_in();
    h.backend.reject_token.store(true, Ordering::SeqCst);
    let (status, location, _) = call(&h.app, "GET", "/favorites", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/signin"));
    assert!(h.session.current().is_none());
}

#[tokio::test]
async fn profile_merges_backend_fields() {
    let h = signed_in();
    let (status, _, body) = call(&h.app, "GET", "/profile", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Ada Lovelace");
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(h.session.current().unwrap().user.name, "Ada Lovelace");
}

#[tokio::test]
async fn trailer_resolves_embed_url() {
    let h = signed_in();
    let (_, _, body) = call(&h.app, "GET", &format!("/movie/{MOVIE_ID}/trailer"), None).await;
    assert_eq!(
        body["url"],
        "https://www.youtube.com/embed/tFMo3UJ4B4g?autoplay=1&rel=0&modestbranding=1"
    );
}

#[tokio::test]
async fn logout_clears_session_and_goes_home() {
    let h = signed_in();
    let (status, location, _) = call(&h.app, "POST", "/logout", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
    assert_eq!(location.as_deref(), Some("/"));
    assert!(!h.session.is_authenticated());

    let (status, _, _) = call(&h.app, "GET", "/profile", None).await;
    assert_eq!(status, StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn home_rows_group_the_catalog() {
    let h = harness();
    let (status, _, body) = call(&h.app, "GET", "/movies", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 6);

    let titles_in = |key: &str| -> Vec<String> {
        rows.iter()
            .find(|r| r["key"] == key)
            .unwrap()["movies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["title"].as_str().unwrap().to_string())
            .collect()
    };
    assert_eq!(titles_in("scifi"), ["Arrival"]);
    assert_eq!(titles_in("documentary"), ["Free Solo"]);
    assert_eq!(titles_in("drama"), ["Untagged"]);

    let (_, _, body) = call(&h.app, "GET", "/movies?category=real-life-educational", None).await;
    assert_eq!(body["rows"].as_array().unwrap().len(), 1);
    assert_eq!(body["category"], "Real Life Educational");
}

#[tokio::test]
async fn catalog_routes_drive_the_controller() {
    let h = harness();
    let (status, _, body) = call(&h.app, "GET", "/allmovies", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["movies"].as_array().unwrap().len(), 1);
    assert_eq!(body["sortOption"], "releaseDate-desc");
    assert_eq!(body["hasMoreMovies"], false);

    let (_, _, body) = call(
        &h.app,
        "POST",
        "/allmovies/sort",
        Some(json!({ "option": "averageRating-asc" })),
    )
    .await;
    assert_eq!(body["sortOption"], "averageRating-asc");

    let (_, _, body) = call(
        &h.app,
        "POST",
        "/allmovies/filters",
        Some(json!({ "genres": ["Drama"], "minRating": 9, "maxRating": 2 })),
    )
    .await;
    assert_eq!(body["filters"]["minRating"], 2.0);
    assert_eq!(body["filters"]["maxRating"], 9.0);
    assert_eq!(body["sortOption"], "averageRating-asc");
    assert_eq!(body["activeFilters"], 2);

    let (_, _, body) = call(&h.app, "POST", "/allmovies/reset", None).await;
    assert_eq!(body["sortOption"], "releaseDate-desc");
    assert_eq!(body["activeFilters"], 0);

    let (status, _, body) = call(&h.app, "POST", "/allmovies/retry", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert!(body["error"].is_null());
}
