use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::client::{decode, is_success, rejected, Envelope, MboxClient};
use super::MoviesApi;
use crate::catalog::query::SearchParams;
use crate::error::{ApiError, ApiResult};
use crate::models::{MoviePage, MovieRecord, MovieSummary, RawMovie};

const MOVIES_PATH: &str = "/api/movies";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPagination {
    total_pages: Option<u32>,
    total_movies: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    status: Option<String>,
    message: Option<String>,
    data: Option<Vec<RawMovie>>,
    pagination: Option<RawPagination>,
}

#[async_trait]
impl MoviesApi for MboxClient {
    async fn list_movies(&self) -> ApiResult<Vec<MovieSummary>> {
        let url = self.url(MOVIES_PATH);
        let envelope: Envelope<Vec<RawMovie>> = self.get_json(self.client.get(&url)).await?;
        let raw = envelope
            .into_data()?
            .ok_or_else(|| ApiError::Malformed("movie list without data".into()))?;
        Ok(raw.into_iter().map(MovieSummary::from).collect())
    }

    async fn search_movies(&self, params: &SearchParams) -> ApiResult<MoviePage> {
        let url = format!(
            "{}/search?{}",
            self.url(MOVIES_PATH),
            params.query_string()
        );
        debug!(page = params.page, "Searching movies");
        let body = self.send(self.client.get(&url)).await?;
        let parsed: SearchResponse = decode(&body)?;
        if !is_success(parsed.status.as_deref()) {
            return Err(rejected(parsed.message));
        }
        let raw = parsed
            .data
            .ok_or_else(|| ApiError::Rejected {
                message: parsed
                    .message
                    .unwrap_or_else(|| "API returned no data".to_string()),
            })?;
        Ok(MoviePage {
            movies: raw.into_iter().map(MovieSummary::from).collect(),
            total_pages: parsed.pagination.as_ref().and_then(|p| p.total_pages),
            total_movies: parsed.pagination.as_ref().and_then(|p| p.total_movies),
        })
    }

    async fn fetch_movie(&self, id: &str) -> ApiResult<MovieRecord> {
        let url = format!("{}/{}", self.url(MOVIES_PATH), urlencoding::encode(id));
        let envelope: Envelope<RawMovie> = self.get_json(self.client.get(&url)).await?;
        let raw = envelope.into_data()?.ok_or(ApiError::Rejected {
            message: "Movie not found".to_string(),
        })?;
        Ok(MovieRecord::from_raw(raw))
    }
}
