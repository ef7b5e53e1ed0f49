//! Matcher strategies used by `IdentityResolver`.

use crate::model::book::{title_key, Book, Mention};
use crate::repo::book_repo::BookRepository;
use crate::repo::RepoResult;

/// One identity-matching strategy in the resolver chain.
pub trait BookMatcher: Send + Sync {
    /// Stable name reported in `ResolutionOutcome::Matched`.
    fn name(&self) -> &'static str;
    /// Returns the existing book this mention denotes, if this strategy knows.
    fn find_match(&self, books: &dyn BookRepository, mention: &Mention) -> RepoResult<Option<Book>>;
}

/// Exact match on the primary (source-specific) identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct SourceIdMatcher;

impl BookMatcher for SourceIdMatcher {
    fn name(&self) -> &'static str {
        "source_id"
    }

    fn find_match(&self, books: &dyn BookRepository, mention: &Mention) -> RepoResult<Option<Book>> {
        match mention.primary_id() {
            Some(source_id) => books.find_by_source_id(&source_id),
            None => Ok(None),
        }
    }
}

/// Exact match on the normalized ISBN.
#[derive(Debug, Clone, Copy, Default)]
pub struct IsbnMatcher;

impl BookMatcher for IsbnMatcher {
    fn name(&self) -> &'static str {
        "isbn"
    }

    fn find_match(&self, books: &dyn BookRepository, mention: &Mention) -> RepoResult<Option<Book>> {
        match mention.secondary_id() {
            Some(isbn) => books.find_by_isbn(&isbn),
            None => Ok(None),
        }
    }
}

/// Same author (case-insensitive) and same normalized title.
///
/// Not part of the default chain. Mentions without an author never match, and
/// a candidate already carrying a different identifier of the same kind is
/// skipped, so two editions with distinct ISBNs stay apart.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizedTitleMatcher;

impl BookMatcher for NormalizedTitleMatcher {
    fn name(&self) -> &'static str {
        "normalized_title"
    }

    fn find_match(&self, books: &dyn BookRepository, mention: &Mention) -> RepoResult<Option<Book>> {
        let (Some(title), Some(author)) = (
            mention.usable_title(),
            mention.author.as_deref().map(str::trim).filter(|a| !a.is_empty()),
        ) else {
            return Ok(None);
        };

        let wanted = title_key(title);
        if wanted.is_empty() {
            return Ok(None);
        }
        let source_id = mention.primary_id();
        let isbn = mention.secondary_id();

        let found = books.find_by_author(author)?.into_iter().find(|candidate| {
            title_key(&candidate.title) == wanted
                && !conflicts(candidate.source_id.as_deref(), source_id.as_deref())
                && !conflicts(candidate.isbn.as_deref(), isbn.as_deref())
        });
        Ok(found)
    }
}

fn conflicts(stored: Option<&str>, incoming: Option<&str>) -> bool {
    matches!((stored, incoming), (Some(a), Some(b)) if a != b)
}
