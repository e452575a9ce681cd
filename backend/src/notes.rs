use crate::models::{FormErrors, NewNote, NoteForm};

/// Maximum length of a note title and of a note slug, in characters.
pub const MAX_LEN: usize = 100;

pub const REQUIRED: &str = "Обязательное поле.";
pub const INVALID_SLUG: &str =
    "Значение должно состоять только из латинских букв, цифр, знаков подчеркивания или дефиса.";

/// Appended to the offending slug when it is already taken.
pub const SLUG_TAKEN_SUFFIX: &str = " - такой slug уже существует, придумайте уникальное значение!";

pub fn too_long() -> String {
    format!("Убедитесь, что это значение содержит не более {MAX_LEN} символов.")
}

pub fn slug_taken(slug: &str) -> String {
    format!("{slug}{SLUG_TAKEN_SUFFIX}")
}

/// Transliterated, lowercased, hyphen-separated slug of `title`, cut to [`MAX_LEN`].
pub fn slug_from_title(title: &str) -> String {
    let slug = slug::slugify(title);
    let cut: String = slug.chars().take(MAX_LEN).collect();
    // Truncation can leave a dangling separator.
    cut.trim_end_matches('-').to_string()
}

fn is_valid_slug(slug: &str) -> bool {
    slug.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// clean_note_form
///
/// Validates a submitted note and resolves its slug. Uniqueness is checked by the
/// caller against storage.
pub fn clean_note_form(form: NoteForm) -> Result<NewNote, FormErrors> {
    let mut errors = FormErrors::default();

    let title = form.title.trim().to_string();
    if title.is_empty() {
        errors.add("title", REQUIRED);
    } else if title.chars().count() > MAX_LEN {
        errors.add("title", too_long());
    }

    if form.text.trim().is_empty() {
        errors.add("text", REQUIRED);
    }

    let slug = match form.slug.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(given) => {
            if given.chars().count() > MAX_LEN {
                errors.add("slug", too_long());
            } else if !is_valid_slug(given) {
                errors.add("slug", INVALID_SLUG);
            }
            given.to_string()
        }
        None => {
            let generated = slug_from_title(&title);
            if generated.is_empty() && !title.is_empty() {
                errors.add("slug", INVALID_SLUG);
            }
            generated
        }
    };

    if errors.is_empty() {
        Ok(NewNote {
            title,
            text: form.text,
            slug,
        })
    } else {
        Err(errors)
    }
}
