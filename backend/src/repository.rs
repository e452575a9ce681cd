use crate::error::RepoError;
use crate::models::{Comment, CreateNewsRequest, NewNote, News, Note, User};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Repository Trait
///
/// Abstract contract for all persistence operations, so handlers never know whether
/// they talk to Postgres or to the in-memory store.
///
/// List methods return rows in insertion order; display ordering is applied by the
/// caller. Owner-scoped writes take the owner's id and touch nothing when it does
/// not match, so ownership is enforced here as well as in the handlers.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> Option<User>;
    // Conflict when the username is taken.
    async fn create_user(&self, user: User) -> Result<User, RepoError>;

    // --- News ---
    async fn list_news(&self) -> Vec<News>;
    async fn get_news(&self, id: i64) -> Option<News>;
    async fn create_news(&self, req: CreateNewsRequest) -> Result<News, RepoError>;

    // --- Comments ---
    async fn list_comments(&self, news_id: i64) -> Vec<Comment>;
    async fn get_comment(&self, id: i64) -> Option<Comment>;
    async fn add_comment(&self, news_id: i64, author_id: Uuid, text: String) -> Result<Comment, RepoError>;
    // Owner-Only: only the text changes; news and author are fixed at creation.
    async fn update_comment(&self, id: i64, author_id: Uuid, text: String) -> Result<Option<Comment>, RepoError>;
    // Owner-Only: true if a row was deleted.
    async fn delete_comment(&self, id: i64, author_id: Uuid) -> Result<bool, RepoError>;

    // --- Notes ---
    async fn list_notes(&self, author_id: Uuid) -> Vec<Note>;
    async fn get_note(&self, slug: &str) -> Option<Note>;
    // Conflict when the slug is taken.
    async fn create_note(&self, author_id: Uuid, note: NewNote) -> Result<Note, RepoError>;
    // Owner-Only. Conflict when the new slug belongs to another note.
    async fn update_note(&self, id: i64, author_id: Uuid, note: NewNote) -> Result<Option<Note>, RepoError>;
    // Owner-Only: true if a row was deleted.
    async fn delete_note(&self, id: i64, author_id: Uuid) -> Result<bool, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Maps a unique violation onto `RepoError::Conflict(field)`.
fn classify(e: sqlx::Error, field: &'static str) -> RepoError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return RepoError::Conflict(field);
        }
    }
    RepoError::Database(e)
}

/// PostgresRepository
///
/// The `Repository` backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the embedded migrations in `migrations/`.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        sqlx::query_as::<_, User>("SELECT id, username, role FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_user error: {:?}", e);
                None
            })
    }

    async fn create_user(&self, user: User) -> Result<User, RepoError> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, role) VALUES ($1, $2, $3) RETURNING id, username, role",
        )
        .bind(user.id)
        .bind(user.username)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "username"))
    }

    async fn list_news(&self) -> Vec<News> {
        match sqlx::query_as::<_, News>("SELECT id, title, text, date FROM news ORDER BY id")
            .fetch_all(&self.pool)
            .await
        {
            Ok(news) => news,
            Err(e) => {
                tracing::error!("list_news error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_news(&self, id: i64) -> Option<News> {
        sqlx::query_as::<_, News>("SELECT id, title, text, date FROM news WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_news error: {:?}", e);
                None
            })
    }

    async fn create_news(&self, req: CreateNewsRequest) -> Result<News, RepoError> {
        let news = sqlx::query_as::<_, News>(
            "INSERT INTO news (title, text, date) VALUES ($1, $2, $3) RETURNING id, title, text, date",
        )
        .bind(req.title)
        .bind(req.text)
        .bind(req.date.unwrap_or_else(Utc::now))
        .fetch_one(&self.pool)
        .await?;
        Ok(news)
    }

    async fn list_comments(&self, news_id: i64) -> Vec<Comment> {
        match sqlx::query_as::<_, Comment>(
            "SELECT id, news_id, author_id, text, created FROM comments WHERE news_id = $1 ORDER BY id",
        )
        .bind(news_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(comments) => comments,
            Err(e) => {
                tracing::error!("list_comments error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_comment(&self, id: i64) -> Option<Comment> {
        sqlx::query_as::<_, Comment>(
            "SELECT id, news_id, author_id, text, created FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("get_comment error: {:?}", e);
            None
        })
    }

    async fn add_comment(&self, news_id: i64, author_id: Uuid, text: String) -> Result<Comment, RepoError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"INSERT INTO comments (news_id, author_id, text, created) VALUES ($1, $2, $3, NOW())
               RETURNING id, news_id, author_id, text, created"#,
        )
        .bind(news_id)
        .bind(author_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, author_id: Uuid, text: String) -> Result<Option<Comment>, RepoError> {
        let comment = sqlx::query_as::<_, Comment>(
            r#"UPDATE comments SET text = $3 WHERE id = $1 AND author_id = $2
               RETURNING id, news_id, author_id, text, created"#,
        )
        .bind(id)
        .bind(author_id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete_comment(&self, id: i64, author_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_notes(&self, author_id: Uuid) -> Vec<Note> {
        match sqlx::query_as::<_, Note>(
            "SELECT id, title, text, slug, author_id FROM notes WHERE author_id = $1 ORDER BY id",
        )
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(notes) => notes,
            Err(e) => {
                tracing::error!("list_notes error: {:?}", e);
                vec![]
            }
        }
    }

    async fn get_note(&self, slug: &str) -> Option<Note> {
        sqlx::query_as::<_, Note>("SELECT id, title, text, slug, author_id FROM notes WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("get_note error: {:?}", e);
                None
            })
    }

    async fn create_note(&self, author_id: Uuid, note: NewNote) -> Result<Note, RepoError> {
        sqlx::query_as::<_, Note>(
            r#"INSERT INTO notes (title, text, slug, author_id) VALUES ($1, $2, $3, $4)
               RETURNING id, title, text, slug, author_id"#,
        )
        .bind(note.title)
        .bind(note.text)
        .bind(note.slug)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| classify(e, "slug"))
    }

    async fn update_note(&self, id: i64, author_id: Uuid, note: NewNote) -> Result<Option<Note>, RepoError> {
        sqlx::query_as::<_, Note>(
            r#"UPDATE notes SET title = $3, text = $4, slug = $5
               WHERE id = $1 AND author_id = $2
               RETURNING id, title, text, slug, author_id"#,
        )
        .bind(id)
        .bind(author_id)
        .bind(note.title)
        .bind(note.text)
        .bind(note.slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "slug"))
    }

    async fn delete_note(&self, id: i64, author_id: Uuid) -> Result<bool, RepoError> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    news: Vec<News>,
    comments: Vec<Comment>,
    notes: Vec<Note>,
    last_news_id: i64,
    last_comment_id: i64,
    last_note_id: i64,
}

/// InMemoryRepository
///
/// A `Repository` kept in process memory. Used by the test suites and for running
/// the service without a database. One lock guards all tables, so every write,
/// including its uniqueness check, is atomic.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a news item as given, keeping its date. Ids must be unique.
    pub async fn insert_news(&self, news: News) -> News {
        let mut tables = self.tables.write().await;
        tables.last_news_id = tables.last_news_id.max(news.id);
        tables.news.push(news.clone());
        news
    }

    /// Stores a comment as given, keeping its creation time. Ids must be unique.
    pub async fn insert_comment(&self, comment: Comment) -> Comment {
        let mut tables = self.tables.write().await;
        tables.last_comment_id = tables.last_comment_id.max(comment.id);
        tables.comments.push(comment.clone());
        comment
    }

    pub async fn comment_count(&self) -> usize {
        self.tables.read().await.comments.len()
    }

    pub async fn note_count(&self) -> usize {
        self.tables.read().await.notes.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_user(&self, id: Uuid) -> Option<User> {
        let tables = self.tables.read().await;
        tables.users.iter().find(|u| u.id == id).cloned()
    }

    async fn create_user(&self, user: User) -> Result<User, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == user.username) {
            return Err(RepoError::Conflict("username"));
        }
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn list_news(&self) -> Vec<News> {
        self.tables.read().await.news.clone()
    }

    async fn get_news(&self, id: i64) -> Option<News> {
        let tables = self.tables.read().await;
        tables.news.iter().find(|n| n.id == id).cloned()
    }

    async fn create_news(&self, req: CreateNewsRequest) -> Result<News, RepoError> {
        let mut tables = self.tables.write().await;
        tables.last_news_id += 1;
        let news = News {
            id: tables.last_news_id,
            title: req.title,
            text: req.text,
            date: req.date.unwrap_or_else(Utc::now),
        };
        tables.news.push(news.clone());
        Ok(news)
    }

    async fn list_comments(&self, news_id: i64) -> Vec<Comment> {
        let tables = self.tables.read().await;
        tables
            .comments
            .iter()
            .filter(|c| c.news_id == news_id)
            .cloned()
            .collect()
    }

    async fn get_comment(&self, id: i64) -> Option<Comment> {
        let tables = self.tables.read().await;
        tables.comments.iter().find(|c| c.id == id).cloned()
    }

    async fn add_comment(&self, news_id: i64, author_id: Uuid, text: String) -> Result<Comment, RepoError> {
        let mut tables = self.tables.write().await;
        tables.last_comment_id += 1;
        let comment = Comment {
            id: tables.last_comment_id,
            news_id,
            author_id,
            text,
            created: Utc::now(),
        };
        tables.comments.push(comment.clone());
        Ok(comment)
    }

    async fn update_comment(&self, id: i64, author_id: Uuid, text: String) -> Result<Option<Comment>, RepoError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .comments
            .iter_mut()
            .find(|c| c.id == id && c.author_id == author_id)
            .map(|comment| {
                comment.text = text;
                comment.clone()
            }))
    }

    async fn delete_comment(&self, id: i64, author_id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.comments.len();
        tables
            .comments
            .retain(|c| !(c.id == id && c.author_id == author_id));
        Ok(tables.comments.len() < before)
    }

    async fn list_notes(&self, author_id: Uuid) -> Vec<Note> {
        let tables = self.tables.read().await;
        tables
            .notes
            .iter()
            .filter(|n| n.author_id == author_id)
            .cloned()
            .collect()
    }

    async fn get_note(&self, slug: &str) -> Option<Note> {
        let tables = self.tables.read().await;
        tables.notes.iter().find(|n| n.slug == slug).cloned()
    }

    async fn create_note(&self, author_id: Uuid, note: NewNote) -> Result<Note, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.notes.iter().any(|n| n.slug == note.slug) {
            return Err(RepoError::Conflict("slug"));
        }
        tables.last_note_id += 1;
        let stored = Note {
            id: tables.last_note_id,
            title: note.title,
            text: note.text,
            slug: note.slug,
            author_id,
        };
        tables.notes.push(stored.clone());
        Ok(stored)
    }

    async fn update_note(&self, id: i64, author_id: Uuid, note: NewNote) -> Result<Option<Note>, RepoError> {
        let mut tables = self.tables.write().await;
        if tables.notes.iter().any(|n| n.slug == note.slug && n.id != id) {
            return Err(RepoError::Conflict("slug"));
        }
        Ok(tables
            .notes
            .iter_mut()
            .find(|n| n.id == id && n.author_id == author_id)
            .map(|stored| {
                stored.title = note.title;
                stored.text = note.text;
                stored.slug = note.slug;
                stored.clone()
            }))
    }

    async fn delete_note(&self, id: i64, author_id: Uuid) -> Result<bool, RepoError> {
        let mut tables = self.tables.write().await;
        let before = tables.notes.len();
        tables
            .notes
            .retain(|n| !(n.id == id && n.author_id == author_id));
        Ok(tables.notes.len() < before)
    }
}
