use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints reachable without authentication: identity entry points, the news
/// feed and news pages, and the notes landing page.
///
/// `POST /news/{id}/` lives here because it shares its path with the public news
/// page; its handler sends anonymous visitors to login itself.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Identity ---
        .route("/auth/login/", get(handlers::login_page))
        .route("/auth/logout/", get(handlers::logout_page))
        .route(
            "/auth/signup/",
            get(handlers::signup_page).post(handlers::signup),
        )
        // --- News ---
        // GET /news/
        // The home feed, newest first, capped at NEWS_COUNT_ON_HOME_PAGE.
        .route("/news/", get(handlers::news_home))
        // GET/POST /news/{id}/
        // The news page with its comment thread; POST adds a moderated comment.
        .route(
            "/news/{id}/",
            get(handlers::news_detail).post(handlers::add_comment),
        )
        // --- Notes ---
        .route("/", get(handlers::notes_home))
}
