use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::config::AppConfig;

/// ContentRejected
///
/// Returned when submitted text contains a banned word. `reason` is the configured
/// warning, shown next to the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ContentRejected {
    pub reason: String,
}

/// ContentFilter
///
/// Rejects text containing any of a fixed set of banned words. Matching is a
/// case-insensitive substring search, so a word glued to punctuation or embedded in
/// a longer word is still caught.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    // None when the word list is empty: everything passes.
    matcher: Option<Regex>,
    warning: String,
}

impl ContentFilter {
    /// Builds a filter from literal words. Words are escaped, never treated as patterns.
    pub fn new<I, S>(banned_words: I, warning: impl Into<String>) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = banned_words
            .into_iter()
            .map(|word| word.as_ref().trim().to_string())
            .filter(|word| !word.is_empty())
            .map(|word| regex::escape(&word))
            .collect();

        let matcher = if alternatives.is_empty() {
            None
        } else {
            Some(
                RegexBuilder::new(&alternatives.join("|"))
                    .case_insensitive(true)
                    .build()?,
            )
        };

        Ok(Self {
            matcher,
            warning: warning.into(),
        })
    }

    /// Filter configured from `BANNED_WORDS` / `MODERATION_WARNING`.
    pub fn from_config(config: &AppConfig) -> Result<Self, regex::Error> {
        Self::new(&config.banned_words, config.moderation_warning.clone())
    }

    /// validate
    ///
    /// `Ok(())` when the text is publishable, otherwise the fixed warning.
    /// Has no side effects; persisting accepted text is up to the caller.
    pub fn validate(&self, text: &str) -> Result<(), ContentRejected> {
        match &self.matcher {
            Some(matcher) if matcher.is_match(text) => Err(ContentRejected {
                reason: self.warning.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub fn warning(&self) -> &str {
        &self.warning
    }
}
