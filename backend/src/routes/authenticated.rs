use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Every route here sits behind the `login_required` layer, so anonymous visitors
/// are redirected to the login page with `next` before any handler runs.
///
/// Single-resource pages (note detail/edit/delete, comment edit/delete) are
/// owner-only: the handlers run the ownership check and answer 404 to other users.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // --- Notes ---
        // GET /notes/
        // The requesting user's notes only.
        .route("/notes/", get(handlers::list_notes))
        // GET/POST /add/
        // Note form; POST creates the note and redirects to /done/.
        .route("/add/", get(handlers::add_note_page).post(handlers::add_note))
        // GET /done/
        .route("/done/", get(handlers::notes_done))
        // GET /note/{slug}/
        .route("/note/{slug}/", get(handlers::note_detail))
        // GET/POST /edit/{slug}/
        // Redirects to the note's detail page on success.
        .route(
            "/edit/{slug}/",
            get(handlers::edit_note_page).post(handlers::edit_note),
        )
        // GET/POST/DELETE /delete/{slug}/
        // GET is the confirmation; POST and DELETE both delete.
        .route(
            "/delete/{slug}/",
            get(handlers::delete_note_page)
                .post(handlers::delete_note)
                .delete(handlers::delete_note),
        )
        // --- Comments ---
        // GET/POST /news/edit_comment/{id}/
        // Redirects to /news/{news_id}/#comments on success.
        .route(
            "/news/edit_comment/{id}/",
            get(handlers::edit_comment_page).post(handlers::edit_comment),
        )
        // GET/POST/DELETE /news/delete_comment/{id}/
        .route(
            "/news/delete_comment/{id}/",
            get(handlers::delete_comment_page)
                .post(handlers::delete_comment)
                .delete(handlers::delete_comment),
        )
}
