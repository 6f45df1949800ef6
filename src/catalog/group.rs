use once_cell::sync::Lazy;
use serde::Serialize;

use crate::models::MovieSummary;

pub const MAX_PER_CATEGORY: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKey {
    Drama,
    Comedy,
    Action,
    Thriller,
    Scifi,
    Documentary,
}

/// Movies matching no category land here.
pub const DEFAULT_CATEGORY: CategoryKey = CategoryKey::Drama;

impl CategoryKey {
    pub const ALL: [CategoryKey; 6] = [
        CategoryKey::Drama,
        CategoryKey::Comedy,
        CategoryKey::Action,
        CategoryKey::Thriller,
        CategoryKey::Scifi,
        CategoryKey::Documentary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CategoryKey::Drama => "Drama & Emotion",
            CategoryKey::Comedy => "Comedy & Lighthearted",
            CategoryKey::Action => "Action & Adventure",
            CategoryKey::Thriller => "Thriller & Suspense",
            CategoryKey::Scifi => "Sci-Fi & Fantasy",
            CategoryKey::Documentary => "Real Life & Educational",
        }
    }

    fn index(&self) -> usize {
        match self {
            CategoryKey::Drama => 0,
            CategoryKey::Comedy => 1,
            CategoryKey::Action => 2,
            CategoryKey::Thriller => 3,
            CategoryKey::Scifi => 4,
            CategoryKey::Documentary => 5,
        }
    }
}

static CATEGORY_GENRES: Lazy<Vec<(CategoryKey, Vec<String>)>> = Lazy::new(|| {
    let table: [(CategoryKey, &[&str]); 6] = [
        (CategoryKey::Drama, &["Drama", "Romance", "Family", "Soap"]),
        (
            CategoryKey::Comedy,
            &["Comedy", "Animation", "Kids", "Talk", "Horror"],
        ),
        (
            CategoryKey::Action,
            &["Action", "Adventure", "Action & Adventure", "War & Politics"],
        ),
        (CategoryKey::Thriller, &["Thriller", "Mystery", "Crime"]),
        (
            CategoryKey::Scifi,
            &["Science Fiction", "Fantasy", "Sci-Fi & Fantasy", "Western"],
        ),
        (
            CategoryKey::Documentary,
            &[
                "Documentary",
                "History",
                "Music",
                "Reality",
                "News",
                "War",
                "TV Movie",
            ],
        ),
    ];
    table
        .into_iter()
        .map(|(key, labels)| (key, labels.iter().map(|l| l.to_lowercase()).collect()))
        .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRow {
    pub key: CategoryKey,
    pub title: &'static str,
    pub movies: Vec<MovieSummary>,
}

/// Buckets movies into the six fixed categories, in input order.
///
/// A movie goes to the first category whose labels occur (case-insensitively)
/// in one of its genres or sub-genres and which still has room; if none
/// accepts it, it goes to [`DEFAULT_CATEGORY`] when that has room.
pub fn group_movies(movies: &[MovieSummary]) -> Vec<CategoryRow> {
    let mut rows: Vec<CategoryRow> = CategoryKey::ALL
        .iter()
        .map(|key| CategoryRow {
            key: *key,
            title: key.label(),
            movies: Vec::new(),
        })
        .collect();

    for movie in movies {
        let tags: Vec<String> = movie
            .sub_genres
            .iter()
            .chain(movie.genres.iter())
            .map(|t| clean_tag(t))
            .collect();

        let mut placed = false;
        for (key, labels) in CATEGORY_GENRES.iter() {
            let matches = tags
                .iter()
                .any(|tag| labels.iter().any(|label| tag.contains(label.as_str())));
            if !matches {
                continue;
            }
            let row = &mut rows[key.index()];
            if row.movies.len() < MAX_PER_CATEGORY && !row.movies.iter().any(|m| m.id == movie.id)
            {
                row.movies.push(movie.clone());
                placed = true;
                break;
            }
        }

        if !placed {
            let row = &mut rows[DEFAULT_CATEGORY.index()];
            if row.movies.len() < MAX_PER_CATEGORY && !row.movies.iter().any(|m| m.id == movie.id)
            {
                row.movies.push(movie.clone());
            }
        }
    }

    rows
}

fn clean_tag(tag: &str) -> String {
    tag.chars()
        .filter(|c| !matches!(c, '"' | '\'' | '[' | ']'))
        .collect::<String>()
        .to_lowercase()
}
