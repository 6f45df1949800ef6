use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::client::{Envelope, MboxClient};
use super::ReviewsApi;
use crate::error::{ApiError, ApiResult};
use crate::models::{Comment, RatingStats, RawComment, RawRatingStats};

const REVIEWS_PATH: &str = "/review-comments";

#[derive(Debug, Deserialize)]
struct UserRating {
    rating: Option<f64>,
}

impl MboxClient {
    fn movie_review_url(&self, movie_id: &str, tail: &str) -> String {
        format!(
            "{}/movie/{}/{}",
            self.url(REVIEWS_PATH),
            urlencoding::encode(movie_id),
            tail
        )
    }
}

#[async_trait]
impl ReviewsApi for MboxClient {
    async fn rating_stats(&self, movie_id: &str) -> ApiResult<RatingStats> {
        let url = self.movie_review_url(movie_id, "stats");
        let envelope: Envelope<RawRatingStats> = self.get_json(self.client.get(&url)).await?;
        Ok(envelope.into_data()?.unwrap_or_default().into())
    }

    async fn comments(&self, movie_id: &str) -> ApiResult<Vec<Comment>> {
        let url = self.movie_review_url(movie_id, "comments");
        let envelope: Envelope<Vec<RawComment>> = self.get_json(self.client.get(&url)).await?;
        Ok(envelope
            .into_data()?
            .unwrap_or_default()
            .into_iter()
            .map(Comment::from)
            .collect())
    }

    async fn user_rating(&self, token: &str, movie_id: &str) -> ApiResult<Option<u8>> {
        let url = self.movie_review_url(movie_id, "user-rating");
        let envelope: Envelope<UserRating> = self
            .get_json(self.client.get(&url).bearer_auth(token))
            .await?;
        Ok(envelope
            .into_data()?
            .and_then(|r| r.rating)
            .filter(|r| r.is_finite() && (1.0..=5.0).contains(r))
            .map(|r| r as u8))
    }

    async fn submit_rating(&self, token: &str, movie_id: &str, rating: u8) -> ApiResult<()> {
        let url = format!("{}/rating", self.url(REVIEWS_PATH));
        let envelope: Envelope<serde_json::Value> = self
            .get_json(
                self.client
                    .post(&url)
                    .bearer_auth(token)
                    .json(&json!({ "movieId": movie_id, "rating": rating })),
            )
            .await?;
        envelope.into_data()?;
        Ok(())
    }

    async fn submit_comment(&self, token: &str, movie_id: &str, text: &str) -> ApiResult<Comment> {
        let url = format!("{}/comment", self.url(REVIEWS_PATH));
        let envelope: Envelope<RawComment> = self
            .get_json(
                self.client
                    .post(&url)
                    .bearer_auth(token)
                    .json(&json!({ "movieId": movie_id, "comment": text })),
            )
            .await?;
        let raw = envelope
            .into_data()?
            .ok_or_else(|| ApiError::Malformed("comment reply without data".into()))?;
        Ok(Comment::from(raw))
    }
}
