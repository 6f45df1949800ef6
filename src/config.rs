use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_STORAGE_PATH: &str = "cinebox-storage.json";
const DEFAULT_BIND: &str = "0.0.0.0:3150";
pub const DEFAULT_PAGE_SIZE: u32 = 25;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Variables the server refuses to start without.
pub const REQUIRED_VARS: &[&str] = &["CINEBOX_API_BASE"];

/// Names from `REQUIRED_VARS` that are unset or blank, as seen by `lookup`.
pub fn missing_vars(lookup: impl Fn(&str) -> Option<String>) -> Vec<&'static str> {
    REQUIRED_VARS
        .iter()
        .copied()
        .filter(|&key| lookup(key).map_or(true, |v| v.trim().is_empty()))
        .collect()
}

/// Runtime settings for the shell, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base: String,
    pub storage_path: PathBuf,
    pub bind: SocketAddr,
    pub page_size: u32,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_base = env::var("CINEBOX_API_BASE").context("CINEBOX_API_BASE not set")?;
        let storage_path = env::var("CINEBOX_STORAGE_PATH")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string());
        let bind = env::var("CINEBOX_BIND")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .context("CINEBOX_BIND is not a valid socket address")?;
        let page_size = match env::var("CINEBOX_PAGE_SIZE") {
            Ok(v) => v
                .trim()
                .parse::<u32>()
                .context("CINEBOX_PAGE_SIZE is not a number")?
                .clamp(1, 1000),
            Err(_) => DEFAULT_PAGE_SIZE,
        };
        let timeout_secs = match env::var("CINEBOX_HTTP_TIMEOUT_SECS") {
            Ok(v) => v
                .trim()
                .parse::<u64>()
                .context("CINEBOX_HTTP_TIMEOUT_SECS is not a number")?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            api_base: normalize_base(&api_base),
            storage_path: PathBuf::from(storage_path),
            bind,
            page_size,
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
        })
    }

    pub fn for_base(api_base: &str) -> Self {
        Self {
            api_base: normalize_base(api_base),
            storage_path: PathBuf::from(DEFAULT_STORAGE_PATH),
            bind: SocketAddr::from(([127, 0, 0, 1], 3150)),
            page_size: DEFAULT_PAGE_SIZE,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn normalize_base(base: &str) -> String {
    base.trim().trim_end_matches('/').to_string()
}
