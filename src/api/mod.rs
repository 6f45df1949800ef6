use async_trait::async_trait;

mod auth;
mod client;
mod favorites;
mod movies;
mod reviews;

pub use client::MboxClient;

use crate::catalog::query::SearchParams;
use crate::error::ApiResult;
use crate::models::{Comment, MoviePage, MovieRecord, MovieSummary, RatingStats, Session, UserProfile};

#[async_trait]
pub trait MoviesApi: Send + Sync {
    /// The whole catalog, used for the categorized rows.
    async fn list_movies(&self) -> ApiResult<Vec<MovieSummary>>;
    async fn search_movies(&self, params: &SearchParams) -> ApiResult<MoviePage>;
    async fn fetch_movie(&self, id: &str) -> ApiResult<MovieRecord>;
}

#[async_trait]
pub trait ReviewsApi: Send + Sync {
    async fn rating_stats(&self, movie_id: &str) -> ApiResult<RatingStats>;
    async fn comments(&self, movie_id: &str) -> ApiResult<Vec<Comment>>;
    async fn user_rating(&self, token: &str, movie_id: &str) -> ApiResult<Option<u8>>;
    async fn submit_rating(&self, token: &str, movie_id: &str, rating: u8) -> ApiResult<()>;
    async fn submit_comment(&self, token: &str, movie_id: &str, text: &str) -> ApiResult<Comment>;
}

#[async_trait]
pub trait FavoritesApi: Send + Sync {
    async fn favorites(&self, token: &str) -> ApiResult<Vec<MovieSummary>>;
    async fn add_favorite(&self, token: &str, movie_id: &str) -> ApiResult<()>;
    async fn remove_favorite(&self, token: &str, movie_id: &str) -> ApiResult<()>;
}

#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> ApiResult<Session>;
    async fn sign_up(&self, name: &str, email: &str, password: &str) -> ApiResult<()>;
    /// `Ok(true)` when the backend confirmed the address.
    async fn verify_email(&self, token: &str) -> ApiResult<bool>;
    async fn resend_verification(&self, email: &str) -> ApiResult<()>;
    async fn fetch_user(&self, token: &str, user_id: &str) -> ApiResult<UserProfile>;
}
