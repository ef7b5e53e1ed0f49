//! Canonical book record and raw mention input.
//!
//! # Invariants
//! - A non-empty `source_id` or `isbn` identifies at most one `Book`.
//! - Identifiers are stored normalized; empty-after-normalization means absent.
//! - A `Book` always has a non-blank title.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

static ISBN_SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-]+").expect("valid isbn separator regex"));
static TITLE_NOISE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("valid title noise regex"));

/// SQLite row id of a canonical book.
pub type BookId = i64;

/// Canonical, deduplicated record for one real-world book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    /// Source-specific identifier (primary external id).
    pub source_id: Option<String>,
    /// Normalized ISBN (secondary external id).
    pub isbn: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

/// Field values for a book that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub source_id: Option<String>,
    pub isbn: Option<String>,
    pub title: String,
    pub author: Option<String>,
    pub cover_url: Option<String>,
    pub description: Option<String>,
}

/// One book reference as it appears in a source list, before resolution.
///
/// Serialized with camelCase keys, which is the shape source providers emit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub primary_external_id: Option<String>,
    #[serde(default)]
    pub secondary_external_id: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Explicit position in the source list; positional order is used when absent.
    #[serde(default)]
    pub source_rank: Option<i64>,
}

/// Reasons a mention cannot be resolved to a book.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MentionError {
    #[error("mention has neither an external identifier nor a usable title")]
    Unidentifiable,
    #[error("mention matched no book and has no usable title to create one")]
    MissingTitle,
    #[error("source rank must be >= 1, got {0}")]
    InvalidRank(i64),
}

impl Mention {
    /// Creates a mention carrying only a title.
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Primary identifier, trimmed; `None` when blank.
    pub fn primary_id(&self) -> Option<String> {
        normalize_source_id(self.primary_external_id.as_deref())
    }

    /// Secondary identifier as a normalized ISBN; `None` when blank.
    pub fn secondary_id(&self) -> Option<String> {
        normalize_isbn(self.secondary_external_id.as_deref())
    }

    /// Trimmed title; `None` when blank.
    pub fn usable_title(&self) -> Option<&str> {
        non_blank(Some(self.title.as_str()))
    }

    /// Rejects mentions that can neither match nor create a book.
    pub fn validate(&self) -> Result<(), MentionError> {
        if let Some(rank) = self.source_rank {
            if rank < 1 {
                return Err(MentionError::InvalidRank(rank));
            }
        }
        if self.primary_id().is_none()
            && self.secondary_id().is_none()
            && self.usable_title().is_none()
        {
            return Err(MentionError::Unidentifiable);
        }
        Ok(())
    }

    /// Builds the insert shape for a brand-new book.
    pub fn to_new_book(&self) -> Result<NewBook, MentionError> {
        let title = self.usable_title().ok_or(MentionError::MissingTitle)?;
        Ok(NewBook {
            source_id: self.primary_id(),
            isbn: self.secondary_id(),
            title: title.to_string(),
            author: non_blank(self.author.as_deref()).map(str::to_string),
            cover_url: non_blank(self.cover_url.as_deref()).map(str::to_string),
            description: non_blank(self.description.as_deref()).map(str::to_string),
        })
    }
}

/// Trims a source identifier; blank values are absent.
pub fn normalize_source_id(value: Option<&str>) -> Option<String> {
    non_blank(value).map(str::to_string)
}

/// Strips separators from an ISBN and upper-cases the check digit.
pub fn normalize_isbn(value: Option<&str>) -> Option<String> {
    let raw = value?;
    let stripped = ISBN_SEPARATOR_RE.replace_all(raw, "").to_uppercase();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Case- and punctuation-insensitive comparison key for titles.
pub fn title_key(title: &str) -> String {
    TITLE_NOISE_RE
        .replace_all(&title.to_lowercase(), " ")
        .trim()
        .to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{normalize_isbn, title_key, Mention, MentionError};

    #[test]
    fn isbn_separators_are_removed() {
        assert_eq!(
            normalize_isbn(Some(" 978-7-5442 9114-x ")).as_deref(),
            Some("978754429114X")
        );
        assert_eq!(normalize_isbn(Some(" - ")), None);
        assert_eq!(normalize_isbn(None), None);
    }

    #[test]
    fn title_key_ignores_case_and_punctuation() {
        assert_eq!(title_key("The Three-Body Problem!"), "the three body problem");
        assert_eq!(title_key("  三体：地球往事 "), "三体 地球往事");
    }

    #[test]
    fn blank_mention_is_unidentifiable() {
        let mention = Mention {
            title: "   ".to_string(),
            primary_external_id: Some(" ".to_string()),
            ..Mention::default()
        };
        assert_eq!(mention.validate(), Err(MentionError::Unidentifiable));
    }

    #[test]
    fn identifier_without_title_is_valid_but_cannot_create() {
        let mention = Mention {
            primary_external_id: Some("1007305".to_string()),
            ..Mention::default()
        };
        assert!(mention.validate().is_ok());
        assert_eq!(mention.to_new_book(), Err(MentionError::MissingTitle));
    }

    #[test]
    fn zero_rank_is_rejected() {
        let mention = Mention {
            source_rank: Some(0),
            ..Mention::titled("Dune")
        };
        assert_eq!(mention.validate(), Err(MentionError::InvalidRank(0)));
    }

    #[test]
    fn mention_deserializes_from_provider_shape() {
        let mention: Mention = serde_json::from_str(
            r#"{"title":"活着","author":"余华","primaryExternalId":"4913064","sourceRank":3}"#,
        )
        .unwrap();
        assert_eq!(mention.primary_id().as_deref(), Some("4913064"));
        assert_eq!(mention.source_rank, Some(3));
        assert_eq!(mention.secondary_id(), None);
    }
}
