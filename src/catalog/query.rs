use chrono::{Datelike, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use super::sort::Sort;
use crate::format::parse_release_date;
use crate::models::MovieSummary;

pub const MIN_YEAR: i32 = 1900;
pub const MIN_RATING: f64 = 0.0;
pub const MAX_RATING: f64 = 10.0;
/// Page size used when the listing shows every movie at once.
pub const SHOW_ALL_LIMIT: u32 = 1000;

pub fn current_year() -> i32 {
    Utc::now().year()
}

/// Strips brackets and quotes that leak from JSON-encoded genre values.
pub fn clean_filter_value(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | '"'))
        .collect::<String>()
        .trim()
        .to_lowercase()
}

/// Filter selections for the catalog. Setters keep both ranges ordered and in bounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    genres: BTreeSet<String>,
    min_rating: f64,
    max_rating: f64,
    release_year_range: (i32, i32),
    #[serde(flatten)]
    sort: Sort,
    is_adult: Option<bool>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            genres: BTreeSet::new(),
            min_rating: MIN_RATING,
            max_rating: MAX_RATING,
            release_year_range: (MIN_YEAR, current_year()),
            sort: Sort::default(),
            is_adult: None,
        }
    }
}

impl FilterState {
    pub fn genres(&self) -> &BTreeSet<String> {
        &self.genres
    }

    pub fn rating_range(&self) -> (f64, f64) {
        (self.min_rating, self.max_rating)
    }

    pub fn year_range(&self) -> (i32, i32) {
        self.release_year_range
    }

    pub fn sort(&self) -> Sort {
        self.sort
    }

    pub fn is_adult(&self) -> Option<bool> {
        self.is_adult
    }

    /// Adds the genre if absent, removes it if present.
    pub fn toggle_genre(&mut self, genre: &str) {
        let cleaned = clean_filter_value(genre);
        if cleaned.is_empty() {
            return;
        }
        if !self.genres.remove(&cleaned) {
            self.genres.insert(cleaned);
        }
    }

    pub fn set_genres<I, S>(&mut self, genres: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.genres = genres
            .into_iter()
            .map(|g| clean_filter_value(g.as_ref()))
            .filter(|g| !g.is_empty())
            .collect();
    }

    pub fn set_rating_range(&mut self, min: f64, max: f64) {
        let clamp = |v: f64| {
            if v.is_finite() {
                v.clamp(MIN_RATING, MAX_RATING)
            } else {
                MIN_RATING
            }
        };
        let (a, b) = (clamp(min), clamp(max));
        self.min_rating = a.min(b);
        self.max_rating = a.max(b);
    }

    pub fn set_year_range(&mut self, low: i32, high: i32) {
        let top = current_year();
        let (a, b) = (low.clamp(MIN_YEAR, top), high.clamp(MIN_YEAR, top));
        self.release_year_range = (a.min(b), a.max(b));
    }

    pub fn set_sort(&mut self, sort: Sort) {
        self.sort = sort;
    }

    pub fn set_adult(&mut self, is_adult: Option<bool>) {
        self.is_adult = is_adult;
    }

    pub fn has_default_years(&self) -> bool {
        self.release_year_range == (MIN_YEAR, current_year())
    }

    /// Number of filter groups that differ from the defaults (sort excluded).
    pub fn active_count(&self) -> usize {
        let mut count = 0;
        if !self.genres.is_empty() {
            count += 1;
        }
        if !self.has_default_years() {
            count += 1;
        }
        if self.min_rating > MIN_RATING || self.max_rating < MAX_RATING {
            count += 1;
        }
        if self.is_adult.is_some() {
            count += 1;
        }
        count
    }
}

/// Backend search request derived from the catalog state.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    pub page: u32,
    pub limit: u32,
    pub keyword: Option<String>,
    pub genres: Vec<String>,
    pub year_range: Option<(i32, i32)>,
    pub min_rating: Option<f64>,
    pub max_rating: Option<f64>,
    pub is_adult: Option<bool>,
    pub sort: Sort,
}

impl SearchParams {
    /// Only values that differ from the defaults are sent.
    pub fn build(search_text: &str, filters: &FilterState, page: u32, limit: u32) -> Self {
        let keyword = Some(search_text.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string);
        let (lo, hi) = filters.year_range();
        let year_range = (!filters.has_default_years()).then_some((lo.min(hi), lo.max(hi)));
        let (min, max) = filters.rating_range();
        let (min, max) = (min.min(max), min.max(max));

        Self {
            page: page.max(1),
            limit: limit.max(1),
            keyword,
            genres: filters.genres().iter().cloned().collect(),
            year_range,
            min_rating: (min > MIN_RATING).then_some(min),
            max_rating: (max < MAX_RATING).then_some(max),
            is_adult: filters.is_adult(),
            sort: filters.sort(),
        }
    }

    /// The unfiltered first page, sorted by latest release.
    pub fn defaults(limit: u32) -> Self {
        Self::build("", &FilterState::default(), 1, limit)
    }

    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(keyword) = &self.keyword {
            pairs.push(("keyword", keyword.clone()));
        }
        if !self.genres.is_empty() {
            pairs.push(("genres", self.genres.join(",")));
        }
        if let Some((lo, hi)) = self.year_range {
            pairs.push(("releaseYearMin", lo.to_string()));
            pairs.push(("releaseYearMax", hi.to_string()));
        }
        if let Some(min) = self.min_rating {
            pairs.push(("minRating", min.to_string()));
        }
        if let Some(max) = self.max_rating {
            pairs.push(("maxRating", max.to_string()));
        }
        if let Some(adult) = self.is_adult {
            pairs.push(("isAdult", adult.to_string()));
        }
        pairs.push(("sortBy", self.sort.sort_by.as_str().to_string()));
        pairs.push(("sortOrder", self.sort.sort_order.as_str().to_string()));
        pairs
    }

    pub fn query_string(&self) -> String {
        self.query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(&v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Genre and year choices observed in a page of results.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub genres: Vec<String>,
    pub years: Vec<i32>,
}

impl FilterOptions {
    pub fn from_movies(movies: &[MovieSummary]) -> Self {
        let mut genres = BTreeSet::new();
        let mut years = BTreeSet::new();
        for movie in movies {
            for g in movie.genres.iter().chain(movie.sub_genres.iter()) {
                let cleaned = clean_filter_value(g);
                if !cleaned.is_empty() {
                    genres.insert(cleaned);
                }
            }
            if let Some(date) = movie.release_date.as_deref().and_then(parse_release_date) {
                years.insert(date.year());
            }
        }
        Self {
            genres: genres.into_iter().collect(),
            years: years.into_iter().rev().collect(),
        }
    }
}
