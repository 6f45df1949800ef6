//! Profile and favorites pages for the signed-in user.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{AuthApi, FavoritesApi};
use crate::models::{MovieSummary, UserProfile};
use crate::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileView {
    pub user: Option<UserProfile>,
    pub error: Option<String>,
    pub session_expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoritesView {
    pub movies: Vec<MovieSummary>,
    pub error: Option<String>,
    pub session_expired: bool,
}

pub struct AccountController {
    auth: Arc<dyn AuthApi>,
    favorites: Arc<dyn FavoritesApi>,
    session: SessionStore,
}

impl AccountController {
    pub fn new(auth: Arc<dyn AuthApi>, favorites: Arc<dyn FavoritesApi>, session: SessionStore) -> Self {
        Self {
            auth,
            favorites,
            session,
        }
    }

    /// Shows the stored profile, refreshed from the backend when possible.
    /// A failed refresh keeps the stored copy on screen with the error.
    pub async fn profile(&self) -> ProfileView {
        let Some(session) = self.session.current() else {
            return ProfileView {
                user: None,
                error: Some("Authentication token not found. Please log in again.".to_string()),
                session_expired: true,
            };
        };
        let stored = session.user;
        if stored.id.is_empty() {
            return ProfileView {
                user: Some(stored),
                error: None,
                session_expired: false,
            };
        }

        match self.auth.fetch_user(&session.token, &stored.id).await {
            Ok(fresh) => {
                let merged = merge_profile(stored, fresh);
                if let Err(e) = self.session.update_profile(&merged) {
                    warn!("Failed to store refreshed profile: {:?}", e);
                }
                ProfileView {
                    user: Some(merged),
                    error: None,
                    session_expired: false,
                }
            }
            Err(e) if e.is_unauthorized() => {
                self.session.expire();
                ProfileView {
                    user: None,
                    error: Some(e.user_message()),
                    session_expired: true,
                }
            }
            Err(e) => {
                warn!(user_id = %stored.id, "Failed to fetch profile: {}", e);
                ProfileView {
                    user: Some(stored),
                    error: Some(e.user_message()),
                    session_expired: false,
                }
            }
        }
    }

    pub async fn favorites(&self) -> FavoritesView {
        let Some(token) = self.session.token() else {
            return FavoritesView {
                movies: Vec::new(),
                error: Some("Please log in to view your favorites.".to_string()),
                session_expired: true,
            };
        };
        match self.favorites.favorites(&token).await {
            Ok(movies) => {
                info!(count = movies.len(), "Favorites loaded");
                FavoritesView {
                    movies,
                    error: None,
                    session_expired: false,
                }
            }
            Err(e) if e.is_unauthorized() => {
                self.session.expire();
                FavoritesView {
                    movies: Vec::new(),
                    error: Some(e.user_message()),
                    session_expired: true,
                }
            }
            Err(e) => {
                warn!("Failed to fetch favorites: {}", e);
                FavoritesView {
                    movies: Vec::new(),
                    error: Some(e.user_message()),
                    session_expired: false,
                }
            }
        }
    }
}

/// Non-empty backend fields win; the stored id is kept.
fn merge_profile(stored: UserProfile, fresh: UserProfile) -> UserProfile {
    let pick = |new: String, old: String| if new.trim().is_empty() { old } else { new };
    UserProfile {
        id: stored.id,
        name: pick(fresh.name, stored.name),
        email: pick(fresh.email, stored.email),
    }
}
