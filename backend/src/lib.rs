use std::sync::Arc;

use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Decision core: ownership, moderation, display ordering.
pub mod access;
pub mod listing;
pub mod moderation;
pub mod notes;

// Service plumbing.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;

// Routing segregation (Public, Authenticated, Admin).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use moderation::ContentFilter;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document for every handler and schema, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login_page, handlers::logout_page, handlers::signup_page, handlers::signup,
        handlers::news_home, handlers::news_detail, handlers::add_comment,
        handlers::edit_comment_page, handlers::edit_comment,
        handlers::delete_comment_page, handlers::delete_comment, handlers::create_news,
        handlers::notes_home, handlers::list_notes, handlers::add_note_page, handlers::add_note,
        handlers::notes_done, handlers::note_detail, handlers::edit_note_page,
        handlers::edit_note, handlers::delete_note_page, handlers::delete_note
    ),
    components(
        schemas(
            models::User, models::News, models::Comment, models::Note,
            models::CommentForm, models::NoteForm, models::CreateNewsRequest,
            models::SignupRequest, models::NewsDetail, models::CommentPage,
            models::NotePage, models::LoginPage, models::FormErrors,
        )
    ),
    tags(
        (name = "ya-portal", description = "News with moderated comments, and private notes")
    )
)]
struct ApiDoc;

/// AppState
///
/// Single, cloneable container for everything handlers need, shared by all requests.
#[derive(Clone)]
pub struct AppState {
    /// Persistence layer (Postgres or in-memory).
    pub repo: RepositoryState,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
    /// Comment moderation, built once from the configured word list.
    pub filter: Arc<ContentFilter>,
}

impl AppState {
    /// Builds the state, compiling the moderation filter from `config`.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Result<Self, regex::Error> {
        let filter = Arc::new(ContentFilter::from_config(&config)?);
        Ok(Self {
            repo,
            config,
            filter,
        })
    }
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors (Actor, AuthUser) pull single components from the shared AppState.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// login_required
///
/// Middleware for `authenticated_routes`. Extracting `AuthUser` redirects anonymous
/// visitors to the login page (with `next`) before the handler runs.
async fn login_required(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name for request correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                login_required,
            )),
        )
        .nest("/admin", admin::admin_routes())
        .with_state(state);

    // 3. Observability and Correlation Layers
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. A UUID for every incoming request.
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. One span per request, carrying the request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, uri and the `x-request-id` header, so every
/// log line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
