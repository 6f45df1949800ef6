use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::{Session, UserProfile};
use crate::storage::LocalStore;

const TOKEN_KEY: &str = "token";
const USER_KEY: &str = "userData";

/// The signed-in session, backed by the local store.
///
/// Built once at startup and shared by every view that needs to know who
/// the user is.
#[derive(Debug, Clone)]
pub struct SessionStore {
    store: Arc<LocalStore>,
}

impl SessionStore {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(LocalStore::in_memory()))
    }

    /// Both a token and a readable profile must be present.
    pub fn current(&self) -> Option<Session> {
        let token = self.store.get(TOKEN_KEY).filter(|t| !t.trim().is_empty())?;
        let raw_user = self.store.get(USER_KEY)?;
        match serde_json::from_str::<UserProfile>(&raw_user) {
            Ok(user) => Some(Session { token, user }),
            Err(e) => {
                warn!("Stored user profile is unreadable: {}", e);
                None
            }
        }
    }

    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|t| !t.trim().is_empty())
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        let user = serde_json::to_string(&session.user).context("Failed to encode user profile")?;
        self.store.set(TOKEN_KEY, &session.token)?;
        self.store.set(USER_KEY, &user)?;
        info!(user_id = %session.user.id, "Session stored");
        Ok(())
    }

    pub fn update_profile(&self, user: &UserProfile) -> Result<()> {
        let encoded = serde_json::to_string(user).context("Failed to encode user profile")?;
        self.store.set(USER_KEY, &encoded)
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(TOKEN_KEY)?;
        self.store.remove(USER_KEY)?;
        info!("Session cleared");
        Ok(())
    }

    /// Clears the session after an unauthorized response, logging instead of failing.
    pub fn expire(&self) {
        if let Err(e) = self.clear() {
            warn!("Failed to clear expired session: {:?}", e);
        }
    }

    pub fn cached_rating(&self, movie_id: &str) -> Option<u8> {
        self.store
            .get(&rating_key(movie_id))
            .and_then(|v| v.trim().parse::<u8>().ok())
            .filter(|r| (1..=5).contains(r))
    }

    pub fn cache_rating(&self, movie_id: &str, rating: u8) {
        if let Err(e) = self.store.set(&rating_key(movie_id), &rating.to_string()) {
            warn!("Failed to cache rating for {}: {:?}", movie_id, e);
        }
    }
}

fn rating_key(movie_id: &str) -> String {
    format!("userRating_{movie_id}")
}
