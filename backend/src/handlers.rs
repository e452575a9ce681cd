use crate::{
    AppState,
    access::{Actor, authorize_lookup},
    auth::{AuthUser, requested_path},
    error::{AppError, RepoError},
    listing::{sort_comments, sort_news},
    models::{
        Comment, CommentForm, CommentPage, CreateNewsRequest, FormErrors, LoginPage, News,
        NewsDetail, Note, NoteForm, NotePage, SignupRequest, User,
    },
    notes::{self, clean_note_form},
};
use axum::{
    Json,
    extract::{OriginalUri, Path, Query, State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

/// Success page every note write lands on.
pub const NOTES_DONE_URL: &str = "/done/";

pub const USERNAME_TAKEN: &str = "Пользователь с таким именем уже существует.";

/// LoginQuery
///
/// Query parameters of the login entry point.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct LoginQuery {
    /// Where to send the user after authenticating.
    pub next: Option<String>,
}

// --- Helpers ---

/// A `302 Found` to `location`.
pub fn found(location: impl Into<String>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.into())]).into_response()
}

/// Comment thread anchor on the news page.
pub fn news_comments_url(news_id: i64) -> String {
    format!("/news/{news_id}/#comments")
}

pub fn note_detail_url(slug: &str) -> String {
    format!("/note/{slug}/")
}

/// Runs the moderation filter and the required-field check on a comment form.
fn clean_comment_form(state: &AppState, form: CommentForm) -> Result<String, AppError> {
    let text = form.text.trim();
    if text.is_empty() {
        return Err(AppError::Form(FormErrors::field("text", notes::REQUIRED)));
    }
    if let Err(rejected) = state.filter.validate(text) {
        tracing::info!("comment rejected by moderation filter");
        return Err(AppError::Form(FormErrors::field("text", rejected.reason)));
    }
    Ok(text.to_string())
}

/// Loads a comment and applies the ownership rule to it.
async fn owned_comment(
    state: &AppState,
    actor: Actor,
    uri: &OriginalUri,
    id: i64,
) -> Result<(AuthUser, Comment), AppError> {
    let comment = state.repo.get_comment(id).await;
    authorize_lookup(&actor, comment.as_ref().map(|c| c.author_id))
        .into_result(&state.config.login_url, &requested_path(uri))?;
    match (actor, comment) {
        (Actor::User(user), Some(comment)) => Ok((user, comment)),
        _ => Err(AppError::NotFound),
    }
}

/// Loads a note and applies the ownership rule to it.
async fn owned_note(
    state: &AppState,
    actor: Actor,
    uri: &OriginalUri,
    slug: &str,
) -> Result<(AuthUser, Note), AppError> {
    let note = state.repo.get_note(slug).await;
    authorize_lookup(&actor, note.as_ref().map(|n| n.author_id))
        .into_result(&state.config.login_url, &requested_path(uri))?;
    match (actor, note) {
        (Actor::User(user), Some(note)) => Ok((user, note)),
        _ => Err(AppError::NotFound),
    }
}

/// A slug conflict from storage becomes a form error on `slug`.
fn slug_conflict(e: RepoError, slug: &str) -> AppError {
    match e {
        RepoError::Conflict(_) => AppError::Form(FormErrors::field("slug", notes::slug_taken(slug))),
        other => AppError::Repository(other),
    }
}

// --- Identity Pages ---

/// login_page
///
/// [Public Route] Entry point of the external identity provider. Echoes `next`.
#[utoipa::path(
    get,
    path = "/auth/login/",
    params(LoginQuery),
    responses((status = 200, description = "Login entry point", body = LoginPage))
)]
pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Json<LoginPage> {
    Json(LoginPage {
        login_url: state.config.login_url.clone(),
        next: query.next,
    })
}

/// logout_page
///
/// [Public Route] Tokens are held by the client; nothing to revoke server side.
#[utoipa::path(get, path = "/auth/logout/", responses((status = 200, description = "Logged out")))]
pub async fn logout_page() -> StatusCode {
    StatusCode::OK
}

/// signup_page
///
/// [Public Route] Empty signup form.
#[utoipa::path(
    get,
    path = "/auth/signup/",
    responses((status = 200, description = "Signup form", body = SignupRequest))
)]
pub async fn signup_page() -> Json<SignupRequest> {
    Json(SignupRequest::default())
}

/// signup
///
/// [Public Route] Creates the local profile of a new identity with the `user` role.
#[utoipa::path(
    post,
    path = "/auth/signup/",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Registered", body = User),
        (status = 400, description = "Invalid or taken username", body = FormErrors)
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let username = payload.username.trim().to_string();
    if username.is_empty() {
        return Err(AppError::Form(FormErrors::field("username", notes::REQUIRED)));
    }

    let user = User {
        id: Uuid::new_v4(),
        username,
        role: "user".to_string(),
    };

    match state.repo.create_user(user).await {
        Ok(created) => {
            tracing::info!(user_id = %created.id, "user registered");
            Ok((StatusCode::CREATED, Json(created)))
        }
        Err(RepoError::Conflict(_)) => Err(AppError::Form(FormErrors::field("username", USERNAME_TAKEN))),
        Err(e) => Err(e.into()),
    }
}

// --- News ---

/// news_home
///
/// [Public Route] The news feed: most recent first, capped at the configured page size.
#[utoipa::path(
    get,
    path = "/news/",
    responses((status = 200, description = "News feed", body = [News]))
)]
pub async fn news_home(State(state): State<AppState>) -> Json<Vec<News>> {
    let news = state.repo.list_news().await;
    Json(sort_news(news, state.config.news_count_on_home_page))
}

/// news_detail
///
/// [Public Route] A news item with its comments, oldest first. The comment form is
/// only included for authenticated visitors.
#[utoipa::path(
    get,
    path = "/news/{id}/",
    params(("id" = i64, Path, description = "News ID")),
    responses(
        (status = 200, description = "Found", body = NewsDetail),
        (status = 404, description = "Not Found")
    )
)]
pub async fn news_detail(
    actor: Actor,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<NewsDetail>, AppError> {
    let news = state.repo.get_news(id).await.ok_or(AppError::NotFound)?;
    let comments = sort_comments(state.repo.list_comments(id).await);
    let form = actor.is_authenticated().then(CommentForm::default);

    Ok(Json(NewsDetail {
        news,
        comments,
        form,
    }))
}

/// add_comment
///
/// [Authenticated Action] Posts a comment on a news item. Anonymous visitors are sent
/// to login; text containing a banned word is refused with the moderation warning
/// and nothing is stored.
#[utoipa::path(
    post,
    path = "/news/{id}/",
    params(("id" = i64, Path, description = "News ID")),
    request_body = CommentForm,
    responses(
        (status = 302, description = "Created; redirects to the comment thread or to login"),
        (status = 400, description = "Rejected", body = FormErrors),
        (status = 404, description = "Not Found"),
        (status = 415, description = "Body is not JSON (authenticated visitors only)")
    )
)]
pub async fn add_comment(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(news_id): Path<i64>,
    form: Result<Json<CommentForm>, JsonRejection>,
) -> Result<Response, AppError> {
    // The route is public: the login check has to win over a malformed body.
    let user = actor.require_user(&state.config.login_url, &requested_path(&uri))?;
    let Json(form) = form?;
    if state.repo.get_news(news_id).await.is_none() {
        return Err(AppError::NotFound);
    }
    let text = clean_comment_form(&state, form)?;

    let comment = state.repo.add_comment(news_id, user.id, text).await?;
    tracing::info!(comment_id = comment.id, news_id, "comment created");

    Ok(found(news_comments_url(news_id)))
}

/// edit_comment_page
///
/// [Owner Route] The comment edit form, pre-filled.
#[utoipa::path(
    get,
    path = "/news/edit_comment/{id}/",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Edit form", body = CommentPage),
        (status = 302, description = "Login required"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn edit_comment_page(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(id): Path<i64>,
) -> Result<Json<CommentPage>, AppError> {
    let (_, comment) = owned_comment(&state, actor, &uri, id).await?;
    let form = CommentForm {
        text: comment.text.clone(),
    };
    Ok(Json(CommentPage { comment, form }))
}

/// edit_comment
///
/// [Owner Route] Replaces a comment's text. The new text goes through moderation.
#[utoipa::path(
    post,
    path = "/news/edit_comment/{id}/",
    params(("id" = i64, Path, description = "Comment ID")),
    request_body = CommentForm,
    responses(
        (status = 302, description = "Updated; redirects to the comment thread"),
        (status = 400, description = "Rejected", body = FormErrors),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn edit_comment(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(id): Path<i64>,
    Json(form): Json<CommentForm>,
) -> Result<Response, AppError> {
    let (user, comment) = owned_comment(&state, actor, &uri, id).await?;
    let text = clean_comment_form(&state, form)?;

    let updated = state
        .repo
        .update_comment(comment.id, user.id, text)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(found(news_comments_url(updated.news_id)))
}

/// delete_comment_page
///
/// [Owner Route] Delete confirmation.
#[utoipa::path(
    get,
    path = "/news/delete_comment/{id}/",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 200, description = "Comment to delete", body = Comment),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn delete_comment_page(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(id): Path<i64>,
) -> Result<Json<Comment>, AppError> {
    let (_, comment) = owned_comment(&state, actor, &uri, id).await?;
    Ok(Json(comment))
}

/// delete_comment
///
/// [Owner Route] Deletes a comment. Accepts both POST and DELETE.
#[utoipa::path(
    delete,
    path = "/news/delete_comment/{id}/",
    params(("id" = i64, Path, description = "Comment ID")),
    responses(
        (status = 302, description = "Deleted; redirects to the comment thread"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn delete_comment(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    let (user, comment) = owned_comment(&state, actor, &uri, id).await?;

    if !state.repo.delete_comment(comment.id, user.id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(comment_id = comment.id, "comment deleted");

    Ok(found(news_comments_url(comment.news_id)))
}

/// create_news
///
/// [Admin Route] Publishes a news item.
#[utoipa::path(
    post,
    path = "/admin/news/",
    request_body = CreateNewsRequest,
    responses(
        (status = 201, description = "Published", body = News),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_news(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateNewsRequest>,
) -> Result<(StatusCode, Json<News>), AppError> {
    if role != "admin" {
        return Err(AppError::Forbidden);
    }

    let mut errors = FormErrors::default();
    if payload.title.trim().is_empty() {
        errors.add("title", notes::REQUIRED);
    }
    if payload.text.trim().is_empty() {
        errors.add("text", notes::REQUIRED);
    }
    if !errors.is_empty() {
        return Err(AppError::Form(errors));
    }

    let news = state.repo.create_news(payload).await?;
    tracing::info!(news_id = news.id, "news published");
    Ok((StatusCode::CREATED, Json(news)))
}

// --- Notes ---

/// notes_home
///
/// [Public Route] Landing page of the notes application.
#[utoipa::path(get, path = "/", responses((status = 200, description = "Home")))]
pub async fn notes_home(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "notes": "/notes/",
        "add": "/add/",
        "login": state.config.login_url,
    }))
}

/// list_notes
///
/// [Authenticated Route] The requesting user's own notes.
#[utoipa::path(
    get,
    path = "/notes/",
    responses(
        (status = 200, description = "My notes", body = [Note]),
        (status = 302, description = "Login required")
    )
)]
pub async fn list_notes(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<Note>> {
    Json(state.repo.list_notes(id).await)
}

/// add_note_page
///
/// [Authenticated Route] Empty note form.
#[utoipa::path(
    get,
    path = "/add/",
    responses((status = 200, description = "Note form", body = NoteForm))
)]
pub async fn add_note_page(_user: AuthUser) -> Json<NoteForm> {
    Json(NoteForm::default())
}

/// add_note
///
/// [Authenticated Route] Creates a note owned by the requesting user. The slug is
/// generated from the title when left blank and must be unique.
#[utoipa::path(
    post,
    path = "/add/",
    request_body = NoteForm,
    responses(
        (status = 302, description = "Created; redirects to the success page"),
        (status = 400, description = "Invalid form or slug taken", body = FormErrors)
    )
)]
pub async fn add_note(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(form): Json<NoteForm>,
) -> Result<Response, AppError> {
    let note = clean_note_form(form).map_err(AppError::Form)?;

    if state.repo.get_note(&note.slug).await.is_some() {
        return Err(AppError::Form(FormErrors::field("slug", notes::slug_taken(&note.slug))));
    }

    let slug = note.slug.clone();
    let created = state
        .repo
        .create_note(id, note)
        .await
        .map_err(|e| slug_conflict(e, &slug))?;
    tracing::info!(note_id = created.id, slug = %created.slug, "note created");

    Ok(found(NOTES_DONE_URL))
}

/// notes_done
///
/// [Authenticated Route] Success page after a note is added, edited or deleted.
#[utoipa::path(get, path = "/done/", responses((status = 200, description = "Success")))]
pub async fn notes_done(_user: AuthUser) -> StatusCode {
    StatusCode::OK
}

/// note_detail
///
/// [Owner Route] A single note. Other users get 404.
#[utoipa::path(
    get,
    path = "/note/{slug}/",
    params(("slug" = String, Path, description = "Note slug")),
    responses(
        (status = 200, description = "Found", body = Note),
        (status = 302, description = "Login required"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn note_detail(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(slug): Path<String>,
) -> Result<Json<Note>, AppError> {
    let (_, note) = owned_note(&state, actor, &uri, &slug).await?;
    Ok(Json(note))
}

/// edit_note_page
///
/// [Owner Route] The note edit form, pre-filled.
#[utoipa::path(
    get,
    path = "/edit/{slug}/",
    params(("slug" = String, Path, description = "Note slug")),
    responses(
        (status = 200, description = "Edit form", body = NotePage),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn edit_note_page(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(slug): Path<String>,
) -> Result<Json<NotePage>, AppError> {
    let (_, note) = owned_note(&state, actor, &uri, &slug).await?;
    let form = NoteForm {
        title: note.title.clone(),
        text: note.text.clone(),
        slug: Some(note.slug.clone()),
    };
    Ok(Json(NotePage { note, form }))
}

/// edit_note
///
/// [Owner Route] Updates a note and redirects to its (possibly renamed) detail page.
#[utoipa::path(
    post,
    path = "/edit/{slug}/",
    params(("slug" = String, Path, description = "Note slug")),
    request_body = NoteForm,
    responses(
        (status = 302, description = "Updated; redirects to the note"),
        (status = 400, description = "Invalid form or slug taken", body = FormErrors),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn edit_note(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(slug): Path<String>,
    Json(form): Json<NoteForm>,
) -> Result<Response, AppError> {
    let (user, note) = owned_note(&state, actor, &uri, &slug).await?;
    let changes = clean_note_form(form).map_err(AppError::Form)?;

    if let Some(existing) = state.repo.get_note(&changes.slug).await {
        if existing.id != note.id {
            return Err(AppError::Form(FormErrors::field("slug", notes::slug_taken(&changes.slug))));
        }
    }

    let new_slug = changes.slug.clone();
    let updated = state
        .repo
        .update_note(note.id, user.id, changes)
        .await
        .map_err(|e| slug_conflict(e, &new_slug))?
        .ok_or(AppError::NotFound)?;

    Ok(found(note_detail_url(&updated.slug)))
}

/// delete_note_page
///
/// [Owner Route] Delete confirmation.
#[utoipa::path(
    get,
    path = "/delete/{slug}/",
    params(("slug" = String, Path, description = "Note slug")),
    responses(
        (status = 200, description = "Note to delete", body = Note),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn delete_note_page(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(slug): Path<String>,
) -> Result<Json<Note>, AppError> {
    let (_, note) = owned_note(&state, actor, &uri, &slug).await?;
    Ok(Json(note))
}

/// delete_note
///
/// [Owner Route] Deletes a note. Accepts both POST and DELETE.
#[utoipa::path(
    delete,
    path = "/delete/{slug}/",
    params(("slug" = String, Path, description = "Note slug")),
    responses(
        (status = 302, description = "Deleted; redirects to the success page"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn delete_note(
    actor: Actor,
    State(state): State<AppState>,
    uri: OriginalUri,
    Path(slug): Path<String>,
) -> Result<Response, AppError> {
    let (user, note) = owned_note(&state, actor, &uri, &slug).await?;

    if !state.repo.delete_note(note.id, user.id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(note_id = note.id, "note deleted");

    Ok(found(NOTES_DONE_URL))
}
