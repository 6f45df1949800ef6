use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::format::{parse_sub_genres, placeholder_image};

/// Backend movie document as it arrives on the wire. Loose fields stay as
/// `Value` here and are normalized by [`MovieRecord::from_raw`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMovie {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub imdb_id: Option<String>,
    pub imb_id: Option<String>,
    pub original_title: Option<String>,
    pub title: Option<String>,
    pub primary_image: Option<String>,
    pub average_rating: Option<f64>,
    pub release_date: Option<String>,
    pub description: Option<String>,
    pub overview: Option<String>,
    #[serde(default)]
    pub genres: Value,
    #[serde(default)]
    pub sub_genres: Value,
    pub runtime: Option<f64>,
    pub duration: Option<f64>,
    pub trailer: Option<String>,
    pub is_adult: Option<bool>,
    #[serde(default)]
    pub spoken_languages: Value,
    #[serde(default)]
    pub countries_of_origin: Value,
    #[serde(default)]
    pub cast: Value,
    #[serde(default)]
    pub directors: Value,
}

/// Display shape used by catalog grids, carousels and favorites.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub id: String,
    pub title: String,
    pub poster: String,
    pub rating: f64,
    pub release_date: Option<String>,
    pub description: String,
    pub genres: Vec<String>,
    pub sub_genres: Vec<String>,
    pub runtime: u32,
}

/// Full movie as shown on the detail page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRecord {
    #[serde(flatten)]
    pub summary: MovieSummary,
    pub trailer: Option<String>,
    pub is_adult: bool,
    pub spoken_languages: Vec<String>,
    pub countries_of_origin: Vec<String>,
    pub cast: Vec<String>,
    pub directors: Vec<String>,
}

impl MovieRecord {
    pub fn from_raw(raw: RawMovie) -> Self {
        let title = raw
            .original_title
            .clone()
            .or_else(|| raw.title.clone())
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| "Untitled Movie".to_string());
        let poster = raw
            .primary_image
            .clone()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| placeholder_image(&title, 300, 450));
        let id = raw
            .id
            .clone()
            .or_else(|| raw.imdb_id.clone())
            .or_else(|| raw.imb_id.clone())
            .unwrap_or_default();
        let runtime = raw
            .runtime
            .or(raw.duration)
            .filter(|r| r.is_finite() && *r > 0.0)
            .map(|r| r.round() as u32)
            .unwrap_or(0);

        let summary = MovieSummary {
            id,
            title,
            poster,
            rating: raw
                .average_rating
                .filter(|r| r.is_finite())
                .unwrap_or(0.0),
            release_date: raw.release_date.filter(|d| !d.trim().is_empty()),
            description: raw.description.or(raw.overview).unwrap_or_default(),
            genres: string_list(&raw.genres),
            sub_genres: parse_sub_genres(&raw.sub_genres),
            runtime,
        };

        Self {
            summary,
            trailer: raw.trailer.filter(|t| !t.trim().is_empty()),
            is_adult: raw.is_adult.unwrap_or(false),
            spoken_languages: string_list(&raw.spoken_languages),
            countries_of_origin: string_list(&raw.countries_of_origin),
            cast: string_list(&raw.cast),
            directors: string_list(&raw.directors),
        }
    }
}

impl From<RawMovie> for MovieSummary {
    fn from(raw: RawMovie) -> Self {
        MovieRecord::from_raw(raw).summary
    }
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Object(o) => o.get("name").and_then(|n| n.as_str()).map(str::to_string),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Aggregate star ratings for one movie.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingStats {
    pub average_rating: f64,
    pub total_ratings: u64,
    pub distribution: BTreeMap<u8, u64>,
}

impl Default for RatingStats {
    fn default() -> Self {
        Self {
            average_rating: 0.0,
            total_ratings: 0,
            distribution: (1..=5).map(|star| (star, 0)).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRatingStats {
    pub average_rating: Option<f64>,
    pub total_ratings: Option<u64>,
    #[serde(default)]
    pub rating_distribution: Value,
}

impl From<RawRatingStats> for RatingStats {
    fn from(raw: RawRatingStats) -> Self {
        // The distribution arrives either as an object or wrapped in a one-element array.
        let object = match &raw.rating_distribution {
            Value::Array(items) => items.first().and_then(|v| v.as_object()),
            Value::Object(map) => Some(map),
            _ => None,
        };
        let mut distribution: BTreeMap<u8, u64> = (1..=5).map(|star| (star, 0)).collect();
        if let Some(map) = object {
            for (key, count) in map {
                let Ok(star) = key.trim().parse::<u8>() else {
                    continue;
                };
                if !(1..=5).contains(&star) {
                    continue;
                }
                let count = count
                    .as_u64()
                    .or_else(|| count.as_f64().map(|f| f.max(0.0) as u64))
                    .unwrap_or(0);
                distribution.insert(star, count);
            }
        }
        Self {
            average_rating: raw.average_rating.filter(|r| r.is_finite()).unwrap_or(0.0),
            total_ratings: raw.total_ratings.unwrap_or(0),
            distribution,
        }
    }
}

impl RatingStats {
    /// Share of all ratings given to `star`, as a whole percentage.
    pub fn share_percent(&self, star: u8) -> u32 {
        let count = self.distribution.get(&star).copied().unwrap_or(0);
        if self.total_ratings == 0 {
            return 0;
        }
        ((count as f64 / self.total_ratings as f64) * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawCommentAuthor {
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub comment: Option<String>,
    /// Populated author object on reads; a bare id string on some writes.
    #[serde(default)]
    pub user_id: Value,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: Option<String>,
}

impl From<RawComment> for Comment {
    fn from(raw: RawComment) -> Self {
        let author = serde_json::from_value::<RawCommentAuthor>(raw.user_id)
            .ok()
            .and_then(|u| u.name.or(u.username))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "Anonymous".to_string());
        Self {
            id: raw.id.unwrap_or_default(),
            author,
            body: raw.comment.unwrap_or_default(),
            created_at: raw.created_at,
        }
    }
}

/// Minimal profile kept alongside the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawUser {
    #[serde(rename = "_id", alias = "id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl From<RawUser> for UserProfile {
    fn from(raw: RawUser) -> Self {
        Self {
            id: raw.id.unwrap_or_default(),
            name: raw.name.or(raw.username).unwrap_or_default(),
            email: raw.email.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_movies: u64,
    pub page_size: u32,
}

impl Pagination {
    pub fn first(page_size: u32) -> Self {
        Self {
            current_page: 1,
            total_pages: 1,
            total_movies: 0,
            page_size,
        }
    }

    pub fn has_more(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// One page of search results plus the backend's page counters.
#[derive(Debug, Clone, PartialEq)]
pub struct MoviePage {
    pub movies: Vec<MovieSummary>,
    pub total_pages: Option<u32>,
    pub total_movies: Option<u64>,
}
