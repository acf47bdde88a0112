use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post, put},
};

/// Authenticated Router Module
///
/// Routes available to any signed-in user. The router is wrapped in the auth middleware
/// by `create_router`, and each handler takes `AuthUser` again to learn who is calling.
/// Update, delete and publish are owner-only; the handlers answer 403 for anyone else.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /auth/me
        .route("/auth/me", get(handlers::get_me))
        // POST /sessions
        // The caller becomes the creator; status defaults to draft.
        .route("/sessions", post(handlers::create_session))
        // PUT/DELETE /sessions/{id}
        .route(
            "/sessions/{id}",
            put(handlers::update_session).delete(handlers::delete_session),
        )
        // PATCH /sessions/{id}/publish
        .route("/sessions/{id}/publish", patch(handlers::publish_session))
        // POST /sessions/{id}/like and /bookmark
        // Toggles: a second call by the same user undoes the first.
        .route("/sessions/{id}/like", post(handlers::like_session))
        .route("/sessions/{id}/bookmark", post(handlers::bookmark_session))
        // GET /sessions/my/sessions
        // Drafts included.
        .route("/sessions/my/sessions", get(handlers::get_my_sessions))
        // GET /sessions/debug/sessions
        .route("/sessions/debug/sessions", get(handlers::debug_sessions))
        // --- Profile ---
        .route("/users/likes", get(handlers::get_liked_sessions))
        .route("/users/bookmarks", get(handlers::get_bookmarked_sessions))
}
