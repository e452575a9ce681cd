use crate::{AppState, handlers};
use axum::{Router, routing::post};

/// Admin Router Module
///
/// Nested under `/admin`. Handlers check `role == "admin"` and answer 403 otherwise.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // POST /admin/news/
        // News items are created administratively and never edited afterwards.
        .route("/news/", post(handlers::create_news))
}
