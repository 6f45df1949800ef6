use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::auth::SIGN_IN_PATH;
use crate::models::Session;
use crate::session::SessionStore;

/// Gates protected routes on a stored session.
#[derive(Debug, Clone)]
pub struct SessionGuard {
    session: SessionStore,
    redirect_to: String,
}

impl SessionGuard {
    pub fn new(session: SessionStore) -> Self {
        Self {
            session,
            redirect_to: SIGN_IN_PATH.to_string(),
        }
    }

    pub fn with_redirect(mut self, path: impl Into<String>) -> Self {
        self.redirect_to = path.into();
        self
    }

    pub fn redirect_target(&self) -> &str {
        &self.redirect_to
    }

    /// The session when both token and profile are stored.
    pub fn check(&self) -> Option<Session> {
        self.session.current()
    }
}

/// Middleware for `route_layer`: passes the request through with the
/// [`Session`] in its extensions, or answers with a redirect.
pub async fn require_session(
    State(guard): State<SessionGuard>,
    mut request: Request,
    next: Next,
) -> Response {
    match guard.check() {
        Some(session) => {
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        None => {
            debug!(path = %request.uri().path(), "No session, redirecting");
            Redirect::to(&guard.redirect_to).into_response()
        }
    }
}
