//! Single movie page: the record itself, rating statistics, comments, and
//! the signed-in user's own rating and favorite flag.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{FavoritesApi, MoviesApi, ReviewsApi};
use crate::error::ApiError;
use crate::format::{
    array_to_string, content_rating, format_duration, format_movie_date, format_number,
    format_time_ago, rating_tone, user_score, year_from_date, RatingTone,
};
use crate::models::{Comment, MovieRecord, RatingStats, Session};
use crate::session::SessionStore;

const INVALID_ID_MESSAGE: &str = "Invalid movie ID";

static MOVIE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

static TRAILER_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?:youtube\.com/watch\?v=)([\w-]+)",
        r"(?:youtu\.be/)([\w-]+)",
        r"(?:youtube\.com/embed/)([\w-]+)",
        r"(?:youtube\.com/v/)([\w-]+)",
        r"(?:youtube\.com/shorts/)([\w-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

pub fn is_valid_movie_id(id: &str) -> bool {
    MOVIE_ID.is_match(id)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetailError {
    #[error("Please select a rating between 1 and 5")]
    InvalidRating,

    #[error("Comment cannot be empty")]
    EmptyComment,

    #[error("Invalid movie ID")]
    InvalidMovieId,

    #[error("Please sign in to continue")]
    SignInRequired,

    #[error("Session expired. Please log in again.")]
    SessionExpired,

    #[error(transparent)]
    Api(ApiError),
}

impl DetailError {
    /// Both variants send the user back to the sign-in page.
    pub fn needs_sign_in(&self) -> bool {
        matches!(self, DetailError::SignInRequired | DetailError::SessionExpired)
    }
}

/// Result of one independent fetch on the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Fetched<T> {
    Ready(T),
    Failed(String),
}

impl<T> Fetched<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Fetched::Ready(value) => Some(value),
            Fetched::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TrailerEmbed {
    Embed { url: String },
    Unavailable,
}

/// Resolves a YouTube link in any of the common shapes to an autoplay embed URL.
pub fn trailer_embed(trailer: Option<&str>) -> TrailerEmbed {
    let Some(url) = trailer.map(str::trim).filter(|u| !u.is_empty()) else {
        return TrailerEmbed::Unavailable;
    };
    let video_id = TRAILER_PATTERNS
        .iter()
        .find_map(|re| re.captures(url).and_then(|c| c.get(1)))
        .map(|m| m.as_str());
    match video_id {
        Some(id) => TrailerEmbed::Embed {
            url: format!("https://www.youtube.com/embed/{id}?autoplay=1&rel=0&modestbranding=1"),
        },
        None => {
            debug!("No video id in trailer url {}", url);
            TrailerEmbed::Unavailable
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailPage {
    pub movie_id: String,
    pub movie: Fetched<MovieRecord>,
    pub stats: Fetched<RatingStats>,
    pub comments: Fetched<Vec<Comment>>,
    pub user_rating: Option<u8>,
    pub is_favorite: bool,
    pub trailer: TrailerEmbed,
    /// Set when a personal fetch came back unauthorized and the session was cleared.
    pub session_expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingUpdate {
    pub rating: u8,
    pub stats: Fetched<RatingStats>,
}

/// Display strings derived from a loaded page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieFacts {
    pub release: String,
    pub year: String,
    pub duration: String,
    /// The 0-10 catalog rating as a percentage. Unrelated to the star average.
    pub user_score: String,
    pub tone: RatingTone,
    pub content_rating: &'static str,
    pub genres: String,
    pub languages: String,
    pub countries: String,
    pub cast: String,
    pub directors: String,
    pub total_ratings: String,
    pub star_shares: BTreeMap<u8, u32>,
}

impl MovieFacts {
    pub fn new(movie: &MovieRecord, stats: Option<&RatingStats>) -> Self {
        let summary = &movie.summary;
        let stats = stats.cloned().unwrap_or_default();
        Self {
            release: format_movie_date(summary.release_date.as_deref()),
            year: year_from_date(summary.release_date.as_deref()),
            duration: format_duration(summary.runtime),
            user_score: user_score(summary.rating),
            tone: rating_tone(summary.rating),
            content_rating: content_rating(movie.is_adult),
            genres: array_to_string(&summary.genres, "Not specified"),
            languages: array_to_string(&movie.spoken_languages, "Not specified"),
            countries: array_to_string(&movie.countries_of_origin, "Not specified"),
            cast: array_to_string(&movie.cast, "Not specified"),
            directors: array_to_string(&movie.directors, "Not specified"),
            total_ratings: format_number(stats.total_ratings),
            star_shares: (1..=5).map(|star| (star, stats.share_percent(star))).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentCard {
    #[serde(flatten)]
    pub comment: Comment,
    pub posted: String,
}

impl CommentCard {
    pub fn new(comment: &Comment, now: DateTime<Utc>) -> Self {
        let posted = comment
            .created_at
            .as_deref()
            .map(|at| format_time_ago(at, now))
            .unwrap_or_else(|| "Just now".to_string());
        Self {
            comment: comment.clone(),
            posted,
        }
    }
}

#[derive(Debug, Default)]
struct Personal {
    rating: Option<u8>,
    favorite: bool,
    expired: bool,
}

pub struct DetailController {
    movies: Arc<dyn MoviesApi>,
    reviews: Arc<dyn ReviewsApi>,
    favorites: Arc<dyn FavoritesApi>,
    session: SessionStore,
    open: Mutex<Option<DetailPage>>,
}

impl DetailController {
    pub fn new(
        movies: Arc<dyn MoviesApi>,
        reviews: Arc<dyn ReviewsApi>,
        favorites: Arc<dyn FavoritesApi>,
        session: SessionStore,
    ) -> Self {
        Self {
            movies,
            reviews,
            favorites,
            session,
            open: Mutex::new(None),
        }
    }

    /// Opens a movie page, running its four fetches concurrently. Each
    /// section records its own failure without affecting the others.
    pub async fn load(&self, movie_id: &str) -> DetailPage {
        let valid = is_valid_movie_id(movie_id);
        if !valid {
            warn!(movie_id = %movie_id, "Skipping review fetches for invalid movie id");
        }
        let session = self.session.current();

        let (movie, stats, comments, personal) = tokio::join!(
            self.fetch_movie(movie_id),
            self.fetch_stats(movie_id, valid),
            self.fetch_comments(movie_id, valid),
            self.fetch_personal(session.as_ref(), movie_id, valid),
        );

        if personal.expired {
            self.session.expire();
        }
        let trailer = trailer_embed(
            movie
                .ready()
                .and_then(|m| m.trailer.as_deref()),
        );
        let page = DetailPage {
            movie_id: movie_id.to_string(),
            movie,
            stats,
            comments,
            user_rating: personal.rating,
            is_favorite: personal.favorite,
            trailer,
            session_expired: personal.expired,
        };
        *self.open.lock().await = Some(page.clone());
        page
    }

    /// The page last opened, if it is still `movie_id`.
    pub async fn current(&self, movie_id: &str) -> Option<DetailPage> {
        self.open
            .lock()
            .await
            .as_ref()
            .filter(|p| p.movie_id == movie_id)
            .cloned()
    }

    pub async fn close(&self) {
        *self.open.lock().await = None;
    }

    /// Submits a 1-5 star rating. Anything else is refused before any request.
    pub async fn submit_rating(
        &self,
        movie_id: &str,
        rating: f64,
    ) -> Result<RatingUpdate, DetailError> {
        let stars = validate_rating(rating)?;
        if !is_valid_movie_id(movie_id) {
            return Err(DetailError::InvalidMovieId);
        }
        let session = self.session.current().ok_or(DetailError::SignInRequired)?;

        self.reviews
            .submit_rating(&session.token, movie_id, stars)
            .await
            .map_err(|e| self.classify(e))?;
        info!(movie_id = %movie_id, rating = stars, "Rating submitted");
        self.session.cache_rating(movie_id, stars);

        let stats = self.fetch_stats(movie_id, true).await;
        let mut open = self.open.lock().await;
        if let Some(page) = open.as_mut().filter(|p| p.movie_id == movie_id) {
            page.user_rating = Some(stars);
            page.stats = stats.clone();
        }
        Ok(RatingUpdate {
            rating: stars,
            stats,
        })
    }

    /// Posts a comment and puts it at the top of the open page's list.
    pub async fn submit_comment(&self, movie_id: &str, text: &str) -> Result<Comment, DetailError> {
        let body = text.trim();
        if body.is_empty() {
            return Err(DetailError::EmptyComment);
        }
        if !is_valid_movie_id(movie_id) {
            return Err(DetailError::InvalidMovieId);
        }
        let session = self.session.current().ok_or(DetailError::SignInRequired)?;

        let mut comment = self
            .reviews
            .submit_comment(&session.token, movie_id, body)
            .await
            .map_err(|e| self.classify(e))?;
        comment.author = Some(session.user.name.trim())
            .filter(|n| !n.is_empty())
            .unwrap_or("Anonymous")
            .to_string();
        if comment.body.is_empty() {
            comment.body = body.to_string();
        }
        if comment.created_at.is_none() {
            comment.created_at = Some(Utc::now().to_rfc3339());
        }
        info!(movie_id = %movie_id, "Comment posted");

        let mut open = self.open.lock().await;
        if let Some(page) = open.as_mut().filter(|p| p.movie_id == movie_id) {
            match &mut page.comments {
                Fetched::Ready(list) => list.insert(0, comment.clone()),
                failed => *failed = Fetched::Ready(vec![comment.clone()]),
            }
        }
        Ok(comment)
    }

    /// Adds or removes the movie from favorites and returns the new state.
    /// The flag only changes once the backend has confirmed.
    pub async fn toggle_favorite(&self, movie_id: &str) -> Result<bool, DetailError> {
        let session = self.session.current().ok_or(DetailError::SignInRequired)?;
        if !is_valid_movie_id(movie_id) {
            return Err(DetailError::InvalidMovieId);
        }

        let known = self.current(movie_id).await.map(|p| p.is_favorite);
        let currently = match known {
            Some(flag) => flag,
            None => self
                .favorites
                .favorites(&session.token)
                .await
                .map_err(|e| self.classify(e))?
                .iter()
                .any(|m| m.id == movie_id),
        };

        let result = if currently {
            self.favorites.remove_favorite(&session.token, movie_id).await
        } else {
            self.favorites.add_favorite(&session.token, movie_id).await
        };
        result.map_err(|e| self.classify(e))?;

        let now = !currently;
        info!(movie_id = %movie_id, favorite = now, "Favorite updated");
        let mut open = self.open.lock().await;
        if let Some(page) = open.as_mut().filter(|p| p.movie_id == movie_id) {
            page.is_favorite = now;
        }
        Ok(now)
    }

    fn classify(&self, err: ApiError) -> DetailError {
        if err.is_unauthorized() {
            warn!("Backend rejected the session token");
            self.session.expire();
            DetailError::SessionExpired
        } else {
            DetailError::Api(err)
        }
    }

    async fn fetch_movie(&self, movie_id: &str) -> Fetched<MovieRecord> {
        match self.movies.fetch_movie(movie_id).await {
            Ok(movie) => Fetched::Ready(movie),
            Err(ApiError::NotFound { .. }) => Fetched::Failed("Movie not found".to_string()),
            Err(e) => {
                warn!(movie_id = %movie_id, "Failed to load movie: {}", e);
                Fetched::Failed(e.user_message())
            }
        }
    }

    async fn fetch_stats(&self, movie_id: &str, valid: bool) -> Fetched<RatingStats> {
        if !valid {
            return Fetched::Failed(INVALID_ID_MESSAGE.to_string());
        }
        match self.reviews.rating_stats(movie_id).await {
            Ok(stats) => Fetched::Ready(stats),
            Err(e) => {
                warn!(movie_id = %movie_id, "Failed to load rating stats: {}", e);
                Fetched::Failed(e.user_message())
            }
        }
    }

    async fn fetch_comments(&self, movie_id: &str, valid: bool) -> Fetched<Vec<Comment>> {
        if !valid {
            return Fetched::Failed(INVALID_ID_MESSAGE.to_string());
        }
        match self.reviews.comments(movie_id).await {
            Ok(comments) => Fetched::Ready(comments),
            Err(e) => {
                warn!(movie_id = %movie_id, "Failed to load comments: {}", e);
                Fetched::Failed(e.user_message())
            }
        }
    }

    async fn fetch_personal(
        &self,
        session: Option<&Session>,
        movie_id: &str,
        valid: bool,
    ) -> Personal {
        let Some(session) = session.filter(|_| valid) else {
            return Personal::default();
        };
        let (rating, favorites) = tokio::join!(
            self.reviews.user_rating(&session.token, movie_id),
            self.favorites.favorites(&session.token),
        );

        let mut personal = Personal::default();
        personal.rating = match rating {
            Ok(Some(stars)) => Some(stars),
            Ok(None) => self.session.cached_rating(movie_id),
            Err(e) => {
                personal.expired |= e.is_unauthorized();
                debug!(movie_id = %movie_id, "User rating unavailable, using cache: {}", e);
                self.session.cached_rating(movie_id)
            }
        };
        match favorites {
            Ok(list) => personal.favorite = list.iter().any(|m| m.id == movie_id),
            Err(e) => {
                personal.expired |= e.is_unauthorized();
                warn!("Failed to load favorite status: {}", e);
            }
        }
        personal
    }
}

fn validate_rating(rating: f64) -> Result<u8, DetailError> {
    if rating.is_finite() && rating.fract() == 0.0 && (1.0..=5.0).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(DetailError::InvalidRating)
    }
}
