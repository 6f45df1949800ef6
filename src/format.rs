//! Small display helpers shared by the catalog, detail and account views.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::models::MovieSummary;

/// Parses the date shapes the backend sends: plain `YYYY-MM-DD` or a full RFC 3339 timestamp.
pub fn parse_release_date(input: &str) -> Option<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc).date_naive());
    }
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Milliseconds since the epoch at midnight UTC, used for ordering.
pub fn release_timestamp(input: Option<&str>) -> Option<i64> {
    let date = parse_release_date(input?)?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp_millis())
}

pub fn format_movie_date(input: Option<&str>) -> String {
    let Some(raw) = input.filter(|s| !s.trim().is_empty()) else {
        return "Release date unknown".to_string();
    };
    match parse_release_date(raw) {
        Some(date) => date.format("%b %-d, %Y").to_string(),
        None => "Invalid date".to_string(),
    }
}

pub fn year_from_date(input: Option<&str>) -> String {
    input
        .and_then(parse_release_date)
        .map(|d| d.year().to_string())
        .unwrap_or_else(|| "Unknown year".to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingTone {
    Unrated,
    Excellent,
    Fair,
    Poor,
}

pub fn rating_tone(rating: f64) -> RatingTone {
    if rating <= 0.0 || !rating.is_finite() {
        RatingTone::Unrated
    } else if rating >= 8.0 {
        RatingTone::Excellent
    } else if rating >= 5.0 {
        RatingTone::Fair
    } else {
        RatingTone::Poor
    }
}

/// Normalizes sub-genres that may arrive as a plain string, a JSON-encoded
/// array, an array of strings (some of them JSON-encoded), or named objects.
pub fn parse_sub_genres(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::String(s) if s.is_empty() => Vec::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(inner) if looks_like_array(inner) => {
                        match serde_json::from_str::<Vec<Value>>(inner) {
                            Ok(nested) => nested
                                .iter()
                                .map(value_text)
                                .collect::<Vec<_>>()
                                .join(", "),
                            Err(_) => inner.clone(),
                        }
                    }
                    other => value_text(other),
                })
                .collect(),
            Ok(other) => vec![value_text(&other)],
            Err(_) => vec![s.clone()],
        },
        Value::Array(items) => items
            .iter()
            .flat_map(|item| match item {
                Value::String(inner) if looks_like_array(inner) => {
                    match serde_json::from_str::<Vec<Value>>(inner) {
                        Ok(nested) => nested.iter().map(value_text).collect(),
                        Err(_) => vec![inner.clone()],
                    }
                }
                Value::Object(map) => vec![map
                    .get("name")
                    .and_then(|n| n.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| item.to_string())],
                other => vec![value_text(other)],
            })
            .collect(),
        other => vec![value_text(other)],
    }
}

fn looks_like_array(s: &str) -> bool {
    s.starts_with('[') && s.ends_with(']')
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn format_duration(minutes: u32) -> String {
    if minutes == 0 {
        return "Duration unknown".to_string();
    }
    let hours = minutes / 60;
    let mins = minutes % 60;
    match (hours, mins) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{head}...")
}

pub fn array_to_string(items: &[String], default_text: &str) -> String {
    if items.is_empty() {
        return default_text.to_string();
    }
    items.join(", ")
}

pub fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn placeholder_image(title: &str, width: u32, height: u32) -> String {
    let initials: String = title
        .split(' ')
        .filter(|w| !w.is_empty())
        .take(2)
        .filter_map(|w| w.chars().next())
        .collect::<String>()
        .to_uppercase();
    format!(
        "/api/placeholder/{width}/{height}?text={}",
        urlencoding::encode(&initials)
    )
}

pub fn category_slug_to_name(slug: Option<&str>) -> String {
    let Some(slug) = slug.filter(|s| !s.is_empty()) else {
        return "All Movies".to_string();
    };
    slug.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn category_name_to_slug(name: Option<&str>) -> String {
    let Some(name) = name.filter(|s| !s.is_empty()) else {
        return "all-movies".to_string();
    };
    let kept: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Relative age of a comment, e.g. `5m ago`; older than a week shows the date.
pub fn format_time_ago(created_at: &str, now: DateTime<Utc>) -> String {
    let Ok(created) = DateTime::parse_from_rfc3339(created_at.trim()) else {
        return format_movie_date(Some(created_at));
    };
    let created = created.with_timezone(&Utc);
    let elapsed = now.signed_duration_since(created);
    let hours = elapsed.num_hours();
    if hours < 1 {
        let minutes = elapsed.num_minutes();
        if minutes < 1 {
            "Just now".to_string()
        } else {
            format!("{minutes}m ago")
        }
    } else if hours < 24 {
        format!("{hours}h ago")
    } else if hours / 24 < 7 {
        format!("{}d ago", hours / 24)
    } else {
        created.format("%-m/%-d/%Y").to_string()
    }
}

/// A 0-10 rating as a rounded percentage string.
pub fn user_score(rating: f64) -> String {
    if rating <= 0.0 || !rating.is_finite() {
        return "0%".to_string();
    }
    format!("{}%", ((rating / 10.0) * 100.0).round() as i64)
}

pub fn content_rating(is_adult: bool) -> &'static str {
    if is_adult {
        "AC"
    } else {
        "FC"
    }
}

/// Grid and carousel tile for one movie.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieCard {
    pub id: String,
    pub title: String,
    pub poster: String,
    pub rating: f64,
    pub tone: RatingTone,
    pub release: String,
    pub year: String,
    pub blurb: String,
}

pub const BLURB_CHARS: usize = 150;

impl MovieCard {
    pub fn from_summary(movie: &MovieSummary) -> Self {
        Self {
            id: movie.id.clone(),
            title: movie.title.clone(),
            poster: movie.poster.clone(),
            rating: movie.rating,
            tone: rating_tone(movie.rating),
            release: format_movie_date(movie.release_date.as_deref()),
            year: year_from_date(movie.release_date.as_deref()),
            blurb: truncate_text(&movie.description, BLURB_CHARS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn formats_release_dates() {
        assert_eq!(format_movie_date(Some("2016-11-11")), "Nov 11, 2016");
        assert_eq!(
            format_movie_date(Some("2021-03-05T00:00:00.000Z")),
            "Mar 5, 2021"
        );
        assert_eq!(format_movie_date(None), "Release date unknown");
        assert_eq!(format_movie_date(Some("soon")), "Invalid date");
    }

    #[test]
    fn sub_genres_from_every_encoding() {
        assert_eq!(
            parse_sub_genres(&json!("[\"Heist\", \"Caper\"]")),
            vec!["Heist", "Caper"]
        );
        assert_eq!(parse_sub_genres(&json!("Slasher")), vec!["Slasher"]);
        assert_eq!(
            parse_sub_genres(&json!(["[\"Space Opera\",\"Epic\"]", "Cyberpunk"])),
            vec!["Space Opera", "Epic", "Cyberpunk"]
        );
        assert_eq!(
            parse_sub_genres(&json!([{"name": "Noir"}, 7])),
            vec!["Noir", "7"]
        );
        assert_eq!(
            parse_sub_genres(&json!("[\"[\\\"A\\\",\\\"B\\\"]\"]")),
            vec!["A, B"]
        );
        assert!(parse_sub_genres(&Value::Null).is_empty());
        assert!(parse_sub_genres(&json!("")).is_empty());
    }

    #[test]
    fn durations() {
        assert_eq!(format_duration(0), "Duration unknown");
        assert_eq!(format_duration(45), "45m");
        assert_eq!(format_duration(120), "2h");
        assert_eq!(format_duration(116), "1h 56m");
    }

    #[test]
    fn rating_tones() {
        assert_eq!(rating_tone(0.0), RatingTone::Unrated);
        assert_eq!(rating_tone(8.1), RatingTone::Excellent);
        assert_eq!(rating_tone(6.5), RatingTone::Fair);
        assert_eq!(rating_tone(3.0), RatingTone::Poor);
    }

    #[test]
    fn numbers_and_text() {
        assert_eq!(format_number(1234567), "1,234,567");
        assert_eq!(format_number(999), "999");
        assert_eq!(truncate_text("abcdef", 3), "abc...");
        assert_eq!(truncate_text("abc", 3), "abc");
        assert_eq!(array_to_string(&[], "Not specified"), "Not specified");
        assert_eq!(user_score(7.86), "79%");
        assert_eq!(content_rating(true), "AC");
    }

    #[test]
    fn slugs() {
        assert_eq!(category_name_to_slug(Some("Sci-Fi & Fantasy")), "sci-fi-fantasy");
        assert_eq!(category_slug_to_name(Some("real-life")), "Real Life");
        assert_eq!(category_slug_to_name(None), "All Movies");
    }

    #[test]
    fn time_ago_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap();
        assert_eq!(format_time_ago("2024-06-10T11:59:40Z", now), "Just now");
        assert_eq!(format_time_ago("2024-06-10T11:15:00Z", now), "45m ago");
        assert_eq!(format_time_ago("2024-06-10T07:00:00Z", now), "5h ago");
        assert_eq!(format_time_ago("2024-06-07T12:00:00Z", now), "3d ago");
        assert_eq!(format_time_ago("2024-05-01T12:00:00Z", now), "5/1/2024");
    }
}
