use axum::{
    Json,
    extract::{OriginalUri, Path, State},
    http::{StatusCode, Uri, header},
    response::Response,
};
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::test;
use uuid::Uuid;
use ya_portal::{
    AppState,
    access::Actor,
    auth::AuthUser,
    config::{AppConfig, DEFAULT_BANNED_WORDS, DEFAULT_MODERATION_WARNING},
    error::AppError,
    handlers,
    models::{Comment, CommentForm, CreateNewsRequest, News, NoteForm, User},
    repository::{InMemoryRepository, Repository},
};

// --- TEST UTILITIES ---

const AUTHOR_ID: Uuid = Uuid::from_u128(1);
const READER_ID: Uuid = Uuid::from_u128(2);
const ADMIN_ID: Uuid = Uuid::from_u128(3);

const COMMENT_TEXT: &str = "Текст комментария";
const NOTE_TEXT: &str = "Текст";

// Creates an AppState over a fresh in-memory repository, seeded with three users.
async fn create_test_state() -> (AppState, Arc<InMemoryRepository>) {
    let repo = Arc::new(InMemoryRepository::new());
    for (id, username, role) in [
        (AUTHOR_ID, "Автор", "user"),
        (READER_ID, "Читатель", "user"),
        (ADMIN_ID, "admin", "admin"),
    ] {
        repo.create_user(User {
            id,
            username: username.to_string(),
            role: role.to_string(),
        })
        .await
        .unwrap();
    }
    let state = AppState::new(repo.clone(), AppConfig::default()).unwrap();
    (state, repo)
}

fn author() -> Actor {
    Actor::User(AuthUser {
        id: AUTHOR_ID,
        role: "user".to_string(),
    })
}

fn reader() -> Actor {
    Actor::User(AuthUser {
        id: READER_ID,
        role: "user".to_string(),
    })
}

fn uri(path: &str) -> OriginalUri {
    OriginalUri(path.parse::<Uri>().unwrap())
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
}

async fn seed_news(repo: &InMemoryRepository) -> News {
    repo.insert_news(News {
        id: 1,
        title: "Заголовок".to_string(),
        text: "Текст новости".to_string(),
        date: Utc::now(),
    })
    .await
}

async fn seed_comment(repo: &InMemoryRepository, news: &News) -> Comment {
    repo.add_comment(news.id, AUTHOR_ID, COMMENT_TEXT.to_string())
        .await
        .unwrap()
}

async fn seed_note(state: &AppState) -> String {
    let response = handlers::add_note(
        AuthUser {
            id: AUTHOR_ID,
            role: "user".to_string(),
        },
        State(state.clone()),
        Json(NoteForm {
            title: "Заголовок".to_string(),
            text: NOTE_TEXT.to_string(),
            slug: None,
        }),
    )
    .await
    .unwrap();
    assert_eq!(location(&response), "/done/");
    "zagolovok".to_string()
}

// --- NEWS FEED ---

#[test]
async fn test_home_feed_is_capped_and_newest_first() {
    let (state, repo) = create_test_state().await;
    let today = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    // Twelve items, inserted oldest first.
    for index in 0..12 {
        repo.insert_news(News {
            id: index + 1,
            title: format!("Новость {index}"),
            text: "Текст новости".to_string(),
            date: today - Duration::days(11 - index),
        })
        .await;
    }

    let Json(feed) = handlers::news_home(State(state)).await;

    assert_eq!(feed.len(), 10);
    assert!(feed.windows(2).all(|w| w[0].date > w[1].date));
    assert_eq!(feed[0].date, today);
    assert_eq!(feed[9].date, today - Duration::days(9));
}

#[test]
async fn test_comments_are_listed_oldest_first() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;
    let now = Utc::now();
    // Stored newest first on purpose.
    for (id, offset) in [(1, 2), (2, 0), (3, 1)] {
        repo.insert_comment(Comment {
            id,
            news_id: news.id,
            author_id: AUTHOR_ID,
            text: format!("Текст {id}"),
            created: now + Duration::days(offset),
        })
        .await;
    }

    let Json(detail) = handlers::news_detail(Actor::Anonymous, State(state), Path(news.id))
        .await
        .unwrap();

    let ids: Vec<i64> = detail.comments.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[test]
async fn test_comment_form_only_for_authenticated_visitors() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;

    let Json(anonymous) =
        handlers::news_detail(Actor::Anonymous, State(state.clone()), Path(news.id))
            .await
            .unwrap();
    let Json(logged_in) = handlers::news_detail(reader(), State(state), Path(news.id))
        .await
        .unwrap();

    assert!(anonymous.form.is_none());
    assert_eq!(logged_in.form, Some(CommentForm::default()));
}

#[test]
async fn test_unknown_news_is_not_found() {
    let (state, _) = create_test_state().await;
    let result = handlers::news_detail(Actor::Anonymous, State(state), Path(404)).await;
    assert!(matches!(result, Err(AppError::NotFound)));
}

// --- COMMENTS ---

#[test]
async fn test_anonymous_cannot_comment() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;

    let result = handlers::add_comment(
        Actor::Anonymous,
        State(state),
        uri("/news/1/"),
        Path(news.id),
        Ok(Json(CommentForm {
            text: "Новый текст комментария".to_string(),
        })),
    )
    .await;

    match result {
        Err(AppError::AuthRequired { location }) => {
            assert_eq!(location, "/auth/login/?next=%2Fnews%2F1%2F")
        }
        other => panic!("expected a login redirect, got {other:?}"),
    }
    assert_eq!(repo.comment_count().await, 0);
}

#[test]
async fn test_user_can_comment() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;

    let response = handlers::add_comment(
        author(),
        State(state),
        uri("/news/1/"),
        Path(news.id),
        Ok(Json(CommentForm {
            text: "Новый текст".to_string(),
        })),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/news/1/#comments");
    let comments = repo.list_comments(news.id).await;
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "Новый текст");
    assert_eq!(comments[0].news_id, news.id);
    assert_eq!(comments[0].author_id, AUTHOR_ID);
}

#[test]
async fn test_comment_text_is_stored_trimmed() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;

    handlers::add_comment(
        author(),
        State(state.clone()),
        uri("/news/1/"),
        Path(news.id),
        Ok(Json(CommentForm {
            text: "  Новый текст \n".to_string(),
        })),
    )
    .await
    .unwrap();
    let comment = repo.list_comments(news.id).await.remove(0);
    assert_eq!(comment.text, "Новый текст");

    handlers::edit_comment(
        author(),
        State(state),
        uri("/news/edit_comment/1/"),
        Path(comment.id),
        Json(CommentForm {
            text: "\tОбновленный  ".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(repo.get_comment(comment.id).await.unwrap().text, "Обновленный");
}

#[test]
async fn test_comment_with_banned_words_is_rejected() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;
    let text = format!("Тестовый текст, {}, последующий текст", DEFAULT_BANNED_WORDS[0]);

    let result = handlers::add_comment(
        reader(),
        State(state),
        uri("/news/1/"),
        Path(news.id),
        Ok(Json(CommentForm { text })),
    )
    .await;

    match result {
        Err(AppError::Form(errors)) => {
            assert_eq!(errors.messages("text"), [DEFAULT_MODERATION_WARNING.to_string()])
        }
        other => panic!("expected a form error, got {other:?}"),
    }
    assert_eq!(repo.comment_count().await, 0);
}

#[test]
async fn test_alternate_word_list_is_honoured() {
    let repo = Arc::new(InMemoryRepository::new());
    let config = AppConfig {
        banned_words: vec!["spam".to_string()],
        moderation_warning: "No spam".to_string(),
        ..AppConfig::default()
    };
    let state = AppState::new(repo.clone(), config).unwrap();
    let news = seed_news(&repo).await;

    let rejected = handlers::add_comment(
        reader(),
        State(state.clone()),
        uri("/news/1/"),
        Path(news.id),
        Ok(Json(CommentForm {
            text: "Buy SPAM now".to_string(),
        })),
    )
    .await;
    let accepted = handlers::add_comment(
        reader(),
        State(state),
        uri("/news/1/"),
        Path(news.id),
        Ok(Json(CommentForm {
            text: DEFAULT_BANNED_WORDS[0].to_string(),
        })),
    )
    .await;

    assert!(matches!(rejected, Err(AppError::Form(_))));
    assert!(accepted.is_ok());
    assert_eq!(repo.comment_count().await, 1);
}

#[test]
async fn test_author_can_edit_comment() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;
    let comment = seed_comment(&repo, &news).await;

    let response = handlers::edit_comment(
        author(),
        State(state),
        uri("/news/edit_comment/1/"),
        Path(comment.id),
        Json(CommentForm {
            text: "Новый текст".to_string(),
        }),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/news/1/#comments");
    let stored = repo.get_comment(comment.id).await.unwrap();
    assert_eq!(stored.text, "Новый текст");
    assert_eq!(stored.author_id, AUTHOR_ID);
    assert_eq!(stored.news_id, news.id);
}

#[test]
async fn test_other_user_cannot_edit_comment() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;
    let comment = seed_comment(&repo, &news).await;

    let result = handlers::edit_comment(
        reader(),
        State(state),
        uri("/news/edit_comment/1/"),
        Path(comment.id),
        Json(CommentForm {
            text: "Новый текст".to_string(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::NotFound)));
    let stored = repo.get_comment(comment.id).await.unwrap();
    assert_eq!(stored.text, COMMENT_TEXT);
}

#[test]
async fn test_edit_goes_through_moderation() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;
    let comment = seed_comment(&repo, &news).await;

    let result = handlers::edit_comment(
        author(),
        State(state),
        uri("/news/edit_comment/1/"),
        Path(comment.id),
        Json(CommentForm {
            text: DEFAULT_BANNED_WORDS[1].to_uppercase(),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::Form(_))));
    assert_eq!(repo.get_comment(comment.id).await.unwrap().text, COMMENT_TEXT);
}

#[test]
async fn test_author_can_delete_comment() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;
    let comment = seed_comment(&repo, &news).await;

    let response = handlers::delete_comment(
        author(),
        State(state),
        uri("/news/delete_comment/1/"),
        Path(comment.id),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/news/1/#comments");
    assert_eq!(repo.comment_count().await, 0);
}

#[test]
async fn test_other_user_cannot_delete_comment() {
    let (state, repo) = create_test_state().await;
    let news = seed_news(&repo).await;
    let comment = seed_comment(&repo, &news).await;

    // Admins get no override either.
    let admin = Actor::User(AuthUser {
        id: ADMIN_ID,
        role: "admin".to_string(),
    });
    let result = handlers::delete_comment(
        admin,
        State(state),
        uri("/news/delete_comment/1/"),
        Path(comment.id),
    )
    .await;

    assert!(matches!(result, Err(AppError::NotFound)));
    assert_eq!(repo.comment_count().await, 1);
}

// --- NOTES ---

#[test]
async fn test_author_can_edit_note() {
    let (state, _) = create_test_state().await;
    let slug = seed_note(&state).await;

    let response = handlers::edit_note(
        author(),
        State(state.clone()),
        uri("/edit/zagolovok/"),
        Path(slug.clone()),
        Json(NoteForm {
            title: "Заголовок".to_string(),
            text: "Новый текст".to_string(),
            slug: Some(slug.clone()),
        }),
    )
    .await
    .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/note/zagolovok/");
    let note = state.repo.get_note(&slug).await.unwrap();
    assert_eq!(note.text, "Новый текст");
}

#[test]
async fn test_other_user_cannot_edit_note() {
    let (state, _) = create_test_state().await;
    let slug = seed_note(&state).await;

    let result = handlers::edit_note(
        reader(),
        State(state.clone()),
        uri("/edit/zagolovok/"),
        Path(slug.clone()),
        Json(NoteForm {
            title: "Заголовок".to_string(),
            text: "Новый текст".to_string(),
            slug: Some(slug.clone()),
        }),
    )
    .await;

    assert!(matches!(result, Err(AppError::NotFound)));
    assert_eq!(state.repo.get_note(&slug).await.unwrap().text, NOTE_TEXT);
}

#[test]
async fn test_renaming_a_note_redirects_to_new_slug() {
    let (state, _) = create_test_state().await;
    let slug = seed_note(&state).await;

    let response = handlers::edit_note(
        author(),
        State(state.clone()),
        uri("/edit/zagolovok/"),
        Path(slug),
        Json(NoteForm {
            title: "Another Title".to_string(),
            text: NOTE_TEXT.to_string(),
            slug: None,
        }),
    )
    .await
    .unwrap();

    assert_eq!(location(&response), "/note/another-title/");
    assert!(state.repo.get_note("zagolovok").await.is_none());
}

#[test]
async fn test_duplicate_slug_is_a_form_error() {
    let (state, repo) = create_test_state().await;
    seed_note(&state).await;

    let result = handlers::add_note(
        AuthUser {
            id: READER_ID,
            role: "user".to_string(),
        },
        State(state),
        Json(NoteForm {
            title: "Заголовок".to_string(),
            text: "Другой текст".to_string(),
            slug: None,
        }),
    )
    .await;

    match result {
        Err(AppError::Form(errors)) => assert_eq!(
            errors.messages("slug"),
            ["zagolovok - такой slug уже существует, придумайте уникальное значение!".to_string()]
        ),
        other => panic!("expected a form error, got {other:?}"),
    }
    assert_eq!(repo.note_count().await, 1);
}

#[test]
async fn test_note_pages_are_owner_only() {
    let (state, _) = create_test_state().await;
    let slug = seed_note(&state).await;

    let own = handlers::note_detail(author(), State(state.clone()), uri("/note/zagolovok/"), Path(slug.clone())).await;
    let foreign = handlers::note_detail(reader(), State(state.clone()), uri("/note/zagolovok/"), Path(slug.clone())).await;
    let missing = handlers::note_detail(reader(), State(state.clone()), uri("/note/nope/"), Path("nope".to_string())).await;
    let anonymous =
        handlers::delete_note_page(Actor::Anonymous, State(state), uri("/delete/zagolovok/"), Path(slug)).await;

    assert_eq!(own.unwrap().0.text, NOTE_TEXT);
    assert!(matches!(foreign, Err(AppError::NotFound)));
    assert!(matches!(missing, Err(AppError::NotFound)));
    match anonymous {
        Err(AppError::AuthRequired { location }) => {
            assert_eq!(location, "/auth/login/?next=%2Fdelete%2Fzagolovok%2F")
        }
        other => panic!("expected a login redirect, got {other:?}"),
    }
}

#[test]
async fn test_author_can_delete_note() {
    let (state, repo) = create_test_state().await;
    let slug = seed_note(&state).await;

    let foreign = handlers::delete_note(reader(), State(state.clone()), uri("/delete/zagolovok/"), Path(slug.clone())).await;
    assert!(matches!(foreign, Err(AppError::NotFound)));
    assert_eq!(repo.note_count().await, 1);

    let response = handlers::delete_note(author(), State(state), uri("/delete/zagolovok/"), Path(slug))
        .await
        .unwrap();
    assert_eq!(location(&response), "/done/");
    assert_eq!(repo.note_count().await, 0);
}

#[test]
async fn test_note_list_only_shows_own_notes() {
    let (state, _) = create_test_state().await;
    seed_note(&state).await;

    let Json(mine) = handlers::list_notes(
        AuthUser {
            id: AUTHOR_ID,
            role: "user".to_string(),
        },
        State(state.clone()),
    )
    .await;
    let Json(theirs) = handlers::list_notes(
        AuthUser {
            id: READER_ID,
            role: "user".to_string(),
        },
        State(state),
    )
    .await;

    assert_eq!(mine.len(), 1);
    assert!(theirs.is_empty());
}

// --- ADMIN ---

#[test]
async fn test_only_admins_publish_news() {
    let (state, repo) = create_test_state().await;
    let payload = CreateNewsRequest {
        title: "Заголовок".to_string(),
        text: "Текст новости".to_string(),
        date: None,
    };

    let forbidden = handlers::create_news(
        AuthUser {
            id: READER_ID,
            role: "user".to_string(),
        },
        State(state.clone()),
        Json(payload.clone()),
    )
    .await;
    assert!(matches!(forbidden, Err(AppError::Forbidden)));

    let (status, Json(news)) = handlers::create_news(
        AuthUser {
            id: ADMIN_ID,
            role: "admin".to_string(),
        },
        State(state),
        Json(payload),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(repo.list_news().await, vec![news]);
}
