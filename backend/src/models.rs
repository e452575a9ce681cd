use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::listing::Chronological;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// The profile record of an identity issued by the external provider (`public.users`).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    // Primary key, equal to the `sub` claim of the user's tokens.
    pub id: Uuid,
    pub username: String,
    // 'user' or 'admin'.
    pub role: String,
}

/// News
///
/// A news item from `public.news`. Created by administrators, read by everyone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct News {
    pub id: i64,
    pub title: String,
    pub text: String,
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
}

/// Comment
///
/// A comment from `public.comments`. `news_id` and `author_id` never change after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    // FK to public.news.id
    pub news_id: i64,
    // FK to public.users.id (Owner).
    pub author_id: Uuid,
    pub text: String,
    #[ts(type = "string")]
    pub created: DateTime<Utc>,
}

/// Note
///
/// A private note from `public.notes`, addressed by its unique slug.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Note {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub slug: String,
    // FK to public.users.id (Owner).
    pub author_id: Uuid,
}

impl Chronological for News {
    fn timestamp(&self) -> DateTime<Utc> {
        self.date
    }
}

impl Chronological for Comment {
    fn timestamp(&self) -> DateTime<Utc> {
        self.created
    }
}

// --- Request Payloads (Forms) ---

/// CommentForm
///
/// Input for creating or editing a comment. Only the text is user-controlled.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct CommentForm {
    pub text: String,
}

/// NoteForm
///
/// Input for creating or editing a note. A blank or missing `slug` is generated
/// from the title.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct NoteForm {
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

/// NewNote
///
/// A validated note ready to be written: the slug is already resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNote {
    pub title: String,
    pub text: String,
    pub slug: String,
}

/// CreateNewsRequest
///
/// Admin payload for publishing a news item. `date` defaults to now.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateNewsRequest {
    pub title: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub date: Option<DateTime<Utc>>,
}

/// SignupRequest
///
/// Creates the local profile of an identity. Credentials stay with the provider.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SignupRequest {
    pub username: String,
}

// --- Page Payloads (Output) ---

/// NewsDetail
///
/// The news page: the item, its comment thread oldest first, and an empty comment
/// form which is only offered to authenticated visitors.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NewsDetail {
    pub news: News,
    pub comments: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<CommentForm>,
}

/// CommentPage
///
/// Edit page of a comment, with the form pre-filled from the stored text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct CommentPage {
    pub comment: Comment,
    pub form: CommentForm,
}

/// NotePage
///
/// Edit page of a note, with the form pre-filled from the stored note.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct NotePage {
    pub note: Note,
    pub form: NoteForm,
}

/// LoginPage
///
/// Describes where to authenticate and where to come back to afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginPage {
    pub login_url: String,
    pub next: Option<String>,
}

/// FormErrors
///
/// Field-keyed validation messages, returned with 400 when a form is rejected.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct FormErrors {
    pub errors: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    /// A single message on a single field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Messages attached to `field`, empty when the field is clean.
    pub fn messages(&self, field: &str) -> &[String] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}
