use async_trait::async_trait;
use serde_json::json;

use super::client::{Envelope, MboxClient};
use super::FavoritesApi;
use crate::error::ApiResult;
use crate::models::{MovieSummary, RawMovie};

const FAVORITES_PATH: &str = "/api/favorites";

#[async_trait]
impl FavoritesApi for MboxClient {
    async fn favorites(&self, token: &str) -> ApiResult<Vec<MovieSummary>> {
        let url = self.url(FAVORITES_PATH);
        let envelope: Envelope<Vec<RawMovie>> = self
            .get_json(self.client.get(&url).bearer_auth(token))
            .await?;
        Ok(envelope
            .into_data()?
            .unwrap_or_default()
            .into_iter()
            .map(MovieSummary::from)
            .collect())
    }

    async fn add_favorite(&self, token: &str, movie_id: &str) -> ApiResult<()> {
        let url = self.url(FAVORITES_PATH);
        let envelope: Envelope<serde_json::Value> = self
            .get_json(
                self.client
                    .post(&url)
                    .bearer_auth(token)
                    .json(&json!({ "movieId": movie_id })),
            )
            .await?;
        envelope.into_data()?;
        Ok(())
    }

    async fn remove_favorite(&self, token: &str, movie_id: &str) -> ApiResult<()> {
        let url = format!(
            "{}/{}",
            self.url(FAVORITES_PATH),
            urlencoding::encode(movie_id)
        );
        let envelope: Envelope<serde_json::Value> = self
            .get_json(self.client.delete(&url).bearer_auth(token))
            .await?;
        envelope.into_data()?;
        Ok(())
    }
}
