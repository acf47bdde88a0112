use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a token. Every session read here goes through a
/// repository query that only returns `published` sessions. The fetch by id also
/// serves a draft when the optional bearer token belongs to its creator.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // POST /auth/register
        .route("/auth/register", post(handlers::register))
        // POST /auth/login
        // Unknown email and wrong password both yield 401 "Invalid credentials".
        .route("/auth/login", post(handlers::login))
        // GET /sessions?category=&level=&search=&page=&limit=
        .route("/sessions", get(handlers::list_sessions))
        // GET /sessions/search?q=...
        .route("/sessions/search", get(handlers::search_sessions))
        // GET /sessions/categories
        .route("/sessions/categories", get(handlers::get_categories))
        // GET /sessions/levels
        .route("/sessions/levels", get(handlers::get_levels))
        // GET /sessions/{id}
        // Counts a view on every successful fetch. Drafts: creator only, else 404.
        .route("/sessions/{id}", get(handlers::get_session))
}
