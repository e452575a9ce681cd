use url::form_urlencoded;
use uuid::Uuid;

use crate::{auth::AuthUser, error::AppError};

/// Who is making the request.
#[derive(Debug, Clone)]
pub enum Actor {
    Anonymous,
    User(AuthUser),
}

impl Actor {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Actor::User(user) => Some(user),
            Actor::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User(_))
    }

    /// For pages that only need a logged-in user (lists, creation, success pages).
    pub fn require_user(self, login_url: &str, next: &str) -> Result<AuthUser, AppError> {
        match self {
            Actor::User(user) => Ok(user),
            Actor::Anonymous => Err(AppError::AuthRequired {
                location: login_redirect(login_url, next),
            }),
        }
    }
}

/// Outcome of an ownership check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allow,
    RedirectToLogin,
    NotFound,
}

impl Access {
    /// Maps a refusal onto the error the HTTP layer renders.
    pub fn into_result(self, login_url: &str, next: &str) -> Result<(), AppError> {
        match self {
            Access::Allow => Ok(()),
            Access::RedirectToLogin => Err(AppError::AuthRequired {
                location: login_redirect(login_url, next),
            }),
            Access::NotFound => Err(AppError::NotFound),
        }
    }
}

/// authorize
///
/// Decides whether `actor` may view, edit or delete a resource owned by `owner`.
/// Other users get "not found" rather than "forbidden", so the response never
/// confirms that the resource exists.
pub fn authorize(actor: &Actor, owner: Uuid) -> Access {
    match actor {
        Actor::Anonymous => Access::RedirectToLogin,
        Actor::User(user) if user.id == owner => Access::Allow,
        Actor::User(_) => Access::NotFound,
    }
}

/// authorize_lookup
///
/// Same as [`authorize`] for a lookup that may have found nothing. Anonymous
/// visitors are redirected before existence matters.
pub fn authorize_lookup(actor: &Actor, owner: Option<Uuid>) -> Access {
    match (actor, owner) {
        (Actor::Anonymous, _) => Access::RedirectToLogin,
        (_, None) => Access::NotFound,
        (_, Some(owner)) => authorize(actor, owner),
    }
}

/// Login URL carrying `next` so the visitor comes back after authenticating.
pub fn login_redirect(login_url: &str, next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    let separator = if login_url.contains('?') { '&' } else { '?' };
    format!("{login_url}{separator}{query}")
}
