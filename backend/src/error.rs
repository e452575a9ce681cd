use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::FormErrors;

/// RepoError
///
/// Failures of a repository write. Reads log and degrade to `None`/empty instead.
#[derive(Debug, Error)]
pub enum RepoError {
    /// A uniqueness constraint was hit (note slug, username).
    #[error("unique constraint violated on {0}")]
    Conflict(&'static str),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// AppError
///
/// Every expected way a request can be refused. None of them is a crash, and all
/// are raised before anything is written.
#[derive(Debug, Error)]
pub enum AppError {
    /// Anonymous access to an authenticated or owner-only page.
    /// `location` is the full login URL, `next` included.
    #[error("authentication required")]
    AuthRequired { location: String },
    /// Unknown resource, or a resource owned by someone else. The two are
    /// indistinguishable.
    #[error("not found")]
    NotFound,
    /// Role check failed on an admin route.
    #[error("forbidden")]
    Forbidden,
    /// The submitted form was rejected (banned words, duplicate slug, blank field).
    #[error("invalid form")]
    Form(FormErrors),
    /// The request body could not be read as the expected form.
    #[error(transparent)]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Repository(#[from] RepoError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::AuthRequired { location } => {
                (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
            }
            AppError::NotFound => StatusCode::NOT_FOUND.into_response(),
            AppError::Forbidden => StatusCode::FORBIDDEN.into_response(),
            AppError::Form(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            AppError::Body(rejection) => rejection.into_response(),
            AppError::Repository(e) => {
                // Log the storage error but return a generic internal error.
                tracing::error!("repository error: {:?}", e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
