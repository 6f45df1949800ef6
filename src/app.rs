use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::account::AccountController;
use crate::api::{AuthApi, FavoritesApi, MboxClient, MoviesApi, ReviewsApi};
use crate::auth::{
    validate_profile_step, AuthController, FormFailure, SignInForm, SignUpForm, AFTER_SIGN_IN,
    SIGN_IN_PATH,
};
use crate::catalog::group::{group_movies, CategoryKey};
use crate::catalog::query::FilterState;
use crate::catalog::sort::Sort;
use crate::catalog::{CatalogController, CatalogError};
use crate::config::Config;
use crate::debounce::Debouncer;
use crate::detail::{CommentCard, DetailController, DetailError, MovieFacts};
use crate::error::{ApiError, FailureKind};
use crate::format::{category_name_to_slug, category_slug_to_name, MovieCard};
use crate::guard::{require_session, SessionGuard};
use crate::session::SessionStore;
use crate::storage::LocalStore;

const MAX_BODY_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub session: SessionStore,
    pub movies: Arc<dyn MoviesApi>,
    pub catalog: Arc<CatalogController>,
    pub detail: Arc<DetailController>,
    pub auth: Arc<AuthController>,
    pub account: Arc<AccountController>,
    pub guard: SessionGuard,
    pub typing: Debouncer,
}

impl AppState {
    pub fn new(
        session: SessionStore,
        movies: Arc<dyn MoviesApi>,
        reviews: Arc<dyn ReviewsApi>,
        favorites: Arc<dyn FavoritesApi>,
        auth: Arc<dyn AuthApi>,
        page_size: u32,
    ) -> Self {
        Self {
            catalog: Arc::new(CatalogController::new(movies.clone(), page_size)),
            detail: Arc::new(DetailController::new(
                movies.clone(),
                reviews,
                favorites.clone(),
                session.clone(),
            )),
            auth: Arc::new(AuthController::new(auth.clone(), session.clone())),
            account: Arc::new(AccountController::new(auth, favorites, session.clone())),
            guard: SessionGuard::new(session.clone()),
            typing: Debouncer::default(),
            movies,
            session,
        }
    }

    /// Every API seam backed by one reqwest client.
    pub fn from_client(client: MboxClient, session: SessionStore, page_size: u32) -> Self {
        let client = Arc::new(client);
        Self::new(
            session,
            client.clone(),
            client.clone(),
            client.clone(),
            client,
            page_size,
        )
    }
}

pub async fn run_server(config: Config) -> Result<()> {
    let store = LocalStore::open(&config.storage_path)?;
    info!("Using local storage at {:?}", config.storage_path);
    let session = SessionStore::new(Arc::new(store));
    if let Some(current) = session.current() {
        info!(user_id = %current.user.id, "Restored stored session");
    }

    let client = MboxClient::from_config(&config)?;
    info!("Backend at {}", config.api_base);
    let state = AppState::from_client(client, session, config.page_size);

    let app = build_router(state);

    info!("Listening on {}", config.bind);
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/profile", get(profile))
        .route("/favorites", get(favorites))
        .route("/movie/:movie_id", get(movie_detail))
        .route("/movie/:movie_id/rating", post(rate_movie))
        .route("/movie/:movie_id/comments", post(comment_on_movie))
        .route("/movie/:movie_id/favorite", post(toggle_favorite))
        .route("/movie/:movie_id/trailer", get(trailer))
        .route_layer(middleware::from_fn_with_state(
            state.guard.clone(),
            require_session,
        ));

    Router::new()
        .route("/health", get(health))
        .route("/", get(landing))
        .route("/movies", get(home_rows))
        .route("/allmovies", get(catalog_view))
        .route("/allmovies/search", post(catalog_search))
        .route("/allmovies/typing", post(catalog_typing))
        .route("/allmovies/filters", post(catalog_filters))
        .route("/allmovies/sort", post(catalog_sort))
        .route("/allmovies/show-all", post(catalog_show_all))
        .route("/allmovies/load-more", post(catalog_load_more))
        .route("/allmovies/reset", post(catalog_reset))
        .route("/allmovies/retry", post(catalog_retry))
        .route("/community", get(community))
        .route("/signin", get(sign_in_page).post(sign_in))
        .route("/signup", get(sign_up_page).post(sign_up))
        .route("/signup/profile", post(sign_up_profile))
        .route("/verificationpending", get(verification_pending))
        .route("/verify", get(verify_without_token).post(resend_verification))
        .route("/verify/:token", get(verify_email))
        .route("/logout", post(logout))
        .merge(protected)
        .fallback(not_found)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Page not found", "home": "/" })),
    )
        .into_response()
}

async fn landing(State(state): State<AppState>) -> Response {
    let user = state.session.current().map(|s| s.user);
    Json(json!({
        "page": "landing",
        "authenticated": user.is_some(),
        "user": user,
    }))
    .into_response()
}

async fn community(State(state): State<AppState>) -> Response {
    Json(json!({
        "page": "community",
        "authenticated": state.session.is_authenticated(),
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct RowsQuery {
    category: Option<String>,
}

/// Home page rows, optionally narrowed to one category slug.
async fn home_rows(State(state): State<AppState>, Query(q): Query<RowsQuery>) -> Response {
    let movies = match state.movies.list_movies().await {
        Ok(movies) => movies,
        Err(e) => {
            warn!("Failed to load home rows: {}", e);
            return failure_response(&e);
        }
    };
    let wanted = q
        .category
        .as_deref()
        .map(str::trim)
        .filter(|slug| !slug.is_empty())
        .map(str::to_lowercase);
    let rows: Vec<_> = group_movies(&movies)
        .into_iter()
        .filter(|row| wanted.as_deref().map_or(true, |slug| slug_of(row.key) == slug))
        .map(|row| {
            json!({
                "key": row.key,
                "slug": slug_of(row.key),
                "title": row.title,
                "movies": row.movies.iter().map(MovieCard::from_summary).collect::<Vec<_>>(),
            })
        })
        .collect();
    Json(json!({
        "category": category_slug_to_name(wanted.as_deref()),
        "rows": rows,
    }))
    .into_response()
}

fn slug_of(key: CategoryKey) -> String {
    category_name_to_slug(Some(key.label()))
}

async fn catalog_view(State(state): State<AppState>) -> Response {
    if let Err(e) = state.catalog.load_initial().await {
        warn!("Initial catalog load failed: {}", e);
    }
    catalog_response(&state, None).await
}

#[derive(Debug, Deserialize)]
struct SearchBody {
    #[serde(default)]
    text: String,
}

async fn catalog_search(State(state): State<AppState>, Json(body): Json<SearchBody>) -> Response {
    let result = state.catalog.search(&body.text).await;
    catalog_response(&state, result.err()).await
}

/// Search-as-you-type: records the text and runs the search once typing pauses.
async fn catalog_typing(State(state): State<AppState>, Json(body): Json<SearchBody>) -> Response {
    state.catalog.set_search_text(&body.text).await;
    let catalog = state.catalog.clone();
    let text = body.text;
    drop(state.typing.call(move || async move {
        if let Err(e) = catalog.search(&text).await {
            warn!("Debounced search failed: {}", e);
        }
    }));
    StatusCode::ACCEPTED.into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FiltersBody {
    #[serde(default)]
    genres: Vec<String>,
    min_rating: Option<f64>,
    max_rating: Option<f64>,
    year_min: Option<i32>,
    year_max: Option<i32>,
    is_adult: Option<bool>,
    sort: Option<String>,
}

async fn catalog_filters(State(state): State<AppState>, Json(body): Json<FiltersBody>) -> Response {
    let current = state.catalog.view().await.filters;
    let mut filters = FilterState::default();
    filters.set_genres(body.genres);
    let (min, max) = filters.rating_range();
    filters.set_rating_range(body.min_rating.unwrap_or(min), body.max_rating.unwrap_or(max));
    let (low, high) = filters.year_range();
    filters.set_year_range(body.year_min.unwrap_or(low), body.year_max.unwrap_or(high));
    filters.set_adult(body.is_adult);
    filters.set_sort(match body.sort.as_deref() {
        Some(option) => Sort::parse_option(option),
        None => current.sort(),
    });

    let result = state.catalog.apply_filters(filters).await;
    catalog_response(&state, result.err()).await
}

#[derive(Debug, Deserialize)]
struct SortBody {
    #[serde(default)]
    option: String,
}

async fn catalog_sort(State(state): State<AppState>, Json(body): Json<SortBody>) -> Response {
    let result = state
        .catalog
        .change_sort(Sort::parse_option(&body.option))
        .await;
    catalog_response(&state, result.err()).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ShowAllBody {
    show_all: bool,
}

async fn catalog_show_all(State(state): State<AppState>, Json(body): Json<ShowAllBody>) -> Response {
    let result = state.catalog.set_show_all(body.show_all).await;
    catalog_response(&state, result.err()).await
}

async fn catalog_load_more(State(state): State<AppState>) -> Response {
    let result = state.catalog.load_more().await;
    catalog_response(&state, result.err()).await
}

async fn catalog_reset(State(state): State<AppState>) -> Response {
    let result = state.catalog.reset_to_defaults().await;
    catalog_response(&state, result.err()).await
}

async fn catalog_retry(State(state): State<AppState>) -> Response {
    let result = state.catalog.retry().await;
    catalog_response(&state, result.err()).await
}

/// The listing view. A failed fetch still answers 200 with the error in the
/// body unless the reset cap was hit.
async fn catalog_response(state: &AppState, err: Option<CatalogError>) -> Response {
    let view = state.catalog.view().await;
    let status = match err {
        Some(CatalogError::TooManyResets) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    };
    (status, Json(view)).into_response()
}

async fn sign_in_page(State(state): State<AppState>) -> Response {
    if state.session.is_authenticated() {
        return Redirect::to(AFTER_SIGN_IN).into_response();
    }
    Json(json!({ "page": "signin" })).into_response()
}

async fn sign_in(State(state): State<AppState>, Json(form): Json<SignInForm>) -> Response {
    match state.auth.sign_in(&form).await {
        Ok(session) => Json(json!({
            "redirect": AFTER_SIGN_IN,
            "user": session.user,
        }))
        .into_response(),
        Err(failure) => form_failure_response(failure, StatusCode::UNAUTHORIZED),
    }
}

async fn sign_up_page(State(state): State<AppState>) -> Response {
    if state.session.is_authenticated() {
        return Redirect::to("/").into_response();
    }
    Json(json!({ "page": "signup", "step": 1 })).into_response()
}

async fn sign_up_profile(Json(form): Json<SignUpForm>) -> Response {
    match validate_profile_step(&form) {
        Ok(()) => Json(json!({ "page": "signup", "step": 2 })).into_response(),
        Err(fields) => {
            form_failure_response(FormFailure::Invalid { fields }, StatusCode::BAD_REQUEST)
        }
    }
}

async fn sign_up(State(state): State<AppState>, Json(form): Json<SignUpForm>) -> Response {
    match state.auth.sign_up(&form).await {
        Ok(accepted) => (StatusCode::CREATED, Json(accepted)).into_response(),
        Err(failure) => form_failure_response(failure, StatusCode::BAD_REQUEST),
    }
}

#[derive(Debug, Deserialize)]
struct PendingQuery {
    email: Option<String>,
}

async fn verification_pending(Query(q): Query<PendingQuery>) -> Response {
    Json(json!({
        "page": "verificationpending",
        "email": q.email,
        "message": "We've sent a verification link to your email. Please check your inbox to activate your account.",
    }))
    .into_response()
}

async fn verify_email(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    Json(state.auth.verify_email(Some(&token)).await).into_response()
}

async fn verify_without_token(State(state): State<AppState>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(state.auth.verify_email(None).await),
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct ResendBody {
    #[serde(default)]
    email: String,
}

async fn resend_verification(State(state): State<AppState>, Json(body): Json<ResendBody>) -> Response {
    match state.auth.resend_verification(&body.email).await {
        Ok(()) => Json(json!({ "sent": true })).into_response(),
        Err(failure) => form_failure_response(failure, StatusCode::BAD_GATEWAY),
    }
}

async fn logout(State(state): State<AppState>) -> Response {
    match state.auth.logout() {
        Ok(target) => {
            state.detail.close().await;
            Redirect::to(target).into_response()
        }
        Err(e) => {
            error!("Failed to clear session: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn profile(State(state): State<AppState>) -> Response {
    let view = state.account.profile().await;
    if view.session_expired {
        return Redirect::to(SIGN_IN_PATH).into_response();
    }
    Json(view).into_response()
}

async fn favorites(State(state): State<AppState>) -> Response {
    let view = state.account.favorites().await;
    if view.session_expired {
        return Redirect::to(SIGN_IN_PATH).into_response();
    }
    let cards: Vec<MovieCard> = view.movies.iter().map(MovieCard::from_summary).collect();
    Json(json!({ "movies": cards, "error": view.error })).into_response()
}

async fn movie_detail(State(state): State<AppState>, Path(movie_id): Path<String>) -> Response {
    let page = state.detail.load(&movie_id).await;
    if page.session_expired {
        return Redirect::to(SIGN_IN_PATH).into_response();
    }
    let now = Utc::now();
    let facts = page
        .movie
        .ready()
        .map(|movie| MovieFacts::new(movie, page.stats.ready()));
    let comments: Vec<CommentCard> = page
        .comments
        .ready()
        .map(|list| list.iter().map(|c| CommentCard::new(c, now)).collect())
        .unwrap_or_default();
    Json(json!({
        "page": page,
        "facts": facts,
        "commentCards": comments,
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
struct RatingBody {
    rating: f64,
}

async fn rate_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
    Json(body): Json<RatingBody>,
) -> Response {
    match state.detail.submit_rating(&movie_id, body.rating).await {
        Ok(update) => Json(update).into_response(),
        Err(e) => detail_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct CommentBody {
    #[serde(default)]
    comment: String,
}

async fn comment_on_movie(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
    Json(body): Json<CommentBody>,
) -> Response {
    match state.detail.submit_comment(&movie_id, &body.comment).await {
        Ok(comment) => (
            StatusCode::CREATED,
            Json(CommentCard::new(&comment, Utc::now())),
        )
            .into_response(),
        Err(e) => detail_error_response(e),
    }
}

async fn toggle_favorite(State(state): State<AppState>, Path(movie_id): Path<String>) -> Response {
    match state.detail.toggle_favorite(&movie_id).await {
        Ok(is_favorite) => Json(json!({ "isFavorite": is_favorite })).into_response(),
        Err(e) => detail_error_response(e),
    }
}

async fn trailer(State(state): State<AppState>, Path(movie_id): Path<String>) -> Response {
    let page = match state.detail.current(&movie_id).await {
        Some(page) => page,
        None => state.detail.load(&movie_id).await,
    };
    Json(page.trailer).into_response()
}

fn detail_error_response(err: DetailError) -> Response {
    if err.needs_sign_in() {
        return Redirect::to(SIGN_IN_PATH).into_response();
    }
    match err {
        DetailError::Api(api) => failure_response(&api),
        other => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "error": other.to_string() })),
        )
            .into_response(),
    }
}

fn form_failure_response(failure: FormFailure, status: StatusCode) -> Response {
    let status = match failure {
        FormFailure::Invalid { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        FormFailure::Form { .. } => status,
    };
    (status, Json(failure)).into_response()
}

fn failure_response(err: &ApiError) -> Response {
    let status = match err.kind() {
        FailureKind::NotFound => StatusCode::NOT_FOUND,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::Network | FailureKind::Server | FailureKind::Unknown => {
            StatusCode::BAD_GATEWAY
        }
    };
    (
        status,
        Json(json!({ "error": err.user_message(), "kind": err.kind() })),
    )
        .into_response()
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        }
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        }
    }
}
