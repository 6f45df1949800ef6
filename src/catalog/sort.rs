use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::format::release_timestamp;
use crate::models::MovieSummary;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortKey {
    #[default]
    ReleaseDate,
    OriginalTitle,
    AverageRating,
}

impl SortKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::ReleaseDate => "releaseDate",
            SortKey::OriginalTitle => "originalTitle",
            SortKey::AverageRating => "averageRating",
        }
    }

    fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "releaseDate" => Some(SortKey::ReleaseDate),
            "originalTitle" => Some(SortKey::OriginalTitle),
            "averageRating" => Some(SortKey::AverageRating),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Sort key and direction. The default is latest release first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    pub sort_by: SortKey,
    pub sort_order: SortOrder,
}

pub const SORT_OPTIONS: [(&str, &str); 6] = [
    ("releaseDate-desc", "Latest Release"),
    ("releaseDate-asc", "Oldest Release"),
    ("originalTitle-asc", "Title (A-Z)"),
    ("originalTitle-desc", "Title (Z-A)"),
    ("averageRating-desc", "Highest Rating"),
    ("averageRating-asc", "Lowest Rating"),
];

impl Sort {
    pub fn new(sort_by: SortKey, sort_order: SortOrder) -> Self {
        Self {
            sort_by,
            sort_order,
        }
    }

    /// Parses a `key-order` option such as `averageRating-desc`. Unknown keys
    /// or orders fall back to latest release first.
    pub fn parse_option(option: &str) -> Self {
        let Some((key, order)) = option.split_once('-') else {
            return Self::default();
        };
        match (SortKey::parse(key), SortOrder::parse(order)) {
            (Some(k), Some(o)) => Self::new(k, o),
            _ => Self::default(),
        }
    }

    pub fn option_value(&self) -> String {
        format!("{}-{}", self.sort_by.as_str(), self.sort_order.as_str())
    }
}

/// Local re-ordering of a fetched page. Stable; movies without a parsable
/// release date sort after dated ones in either direction.
pub fn sort_movies(movies: &mut [MovieSummary], sort: Sort) {
    let desc = sort.sort_order == SortOrder::Desc;
    match sort.sort_by {
        SortKey::ReleaseDate => movies.sort_by(|a, b| {
            let da = release_timestamp(a.release_date.as_deref());
            let db = release_timestamp(b.release_date.as_deref());
            match (da, db) {
                (Some(x), Some(y)) => directed(x.cmp(&y), desc),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            }
        }),
        SortKey::OriginalTitle => movies.sort_by(|a, b| {
            let ta = a.title.to_lowercase();
            let tb = b.title.to_lowercase();
            directed(ta.cmp(&tb), desc)
        }),
        SortKey::AverageRating => movies.sort_by(|a, b| {
            directed(
                a.rating.partial_cmp(&b.rating).unwrap_or(Ordering::Equal),
                desc,
            )
        }),
    }
}

fn directed(ord: Ordering, desc: bool) -> Ordering {
    if desc {
        ord.reverse()
    } else {
        ord
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn movie(title: &str, date: Option<&str>, rating: f64) -> MovieSummary {
        MovieSummary {
            id: title.to_lowercase(),
            title: title.to_string(),
            poster: String::new(),
            rating,
            release_date: date.map(str::to_string),
            description: String::new(),
            genres: Vec::new(),
            sub_genres: Vec::new(),
            runtime: 0,
        }
    }

    fn titles(movies: &[MovieSummary]) -> Vec<&str> {
        movies.iter().map(|m| m.title.as_str()).collect()
    }

    #[test]
    fn release_date_descending() {
        let mut movies = vec![
            movie("A", Some("2020-01-01"), 0.0),
            movie("B", Some("2019-01-01"), 0.0),
            movie("C", Some("2022-01-01"), 0.0),
        ];
        sort_movies(&mut movies, Sort::parse_option("releaseDate-desc"));
        assert_eq!(titles(&movies), vec!["C", "A", "B"]);
    }

    #[test]
    fn title_ascending_ignores_case() {
        let mut movies = vec![movie("Zeta", None, 0.0), movie("alpha", None, 0.0)];
        sort_movies(&mut movies, Sort::parse_option("originalTitle-asc"));
        assert_eq!(titles(&movies), vec!["alpha", "Zeta"]);

        let mut movies = vec![movie("Zeta", None, 0.0), movie("Alpha", None, 0.0)];
        sort_movies(&mut movies, Sort::parse_option("originalTitle-asc"));
        assert_eq!(titles(&movies), vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn rating_both_directions() {
        let mut movies = vec![
            movie("Low", None, 3.1),
            movie("High", None, 8.7),
            movie("Mid", None, 6.0),
        ];
        sort_movies(&mut movies, Sort::parse_option("averageRating-desc"));
        assert_eq!(titles(&movies), vec!["High", "Mid", "Low"]);
        sort_movies(&mut movies, Sort::parse_option("averageRating-asc"));
        assert_eq!(titles(&movies), vec!["Low", "Mid", "High"]);
    }

    #[test]
    fn unknown_option_means_latest_release() {
        assert_eq!(Sort::parse_option("popularity-desc"), Sort::default());
        assert_eq!(Sort::parse_option("garbage"), Sort::default());
        assert_eq!(Sort::default().option_value(), "releaseDate-desc");
    }

    #[test]
    fn undated_movies_go_last() {
        let mut movies = vec![
            movie("Undated", None, 0.0),
            movie("Old", Some("1999-05-01"), 0.0),
        ];
        sort_movies(&mut movies, Sort::parse_option("releaseDate-asc"));
        assert_eq!(titles(&movies), vec!["Old", "Undated"]);
    }
}
