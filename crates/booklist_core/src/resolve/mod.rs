//! Book identity resolution.
//!
//! # Responsibility
//! - Map a raw `Mention` to an existing canonical `Book`, or create one.
//! - Recover from concurrent creation of the same identifier.
//!
//! # Invariants
//! - Matchers run in chain order; the first match wins.
//! - At most one book is created per call, and never a second book for a
//!   non-empty identifier that already exists.
//! - A matched book is only ever enriched (NULL fields filled), never rewritten.

mod matchers;

pub use matchers::{BookMatcher, IsbnMatcher, NormalizedTitleMatcher, SourceIdMatcher};

use crate::model::book::{Book, Mention, MentionError};
use crate::repo::book_repo::BookRepository;
use crate::repo::{RepoError, RepoResult};
use log::{debug, warn};
use thiserror::Error;

pub type ResolveResult<T> = Result<T, ResolveError>;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid mention: {0}")]
    InvalidMention(#[from] MentionError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// How a mention was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// Matched an existing book through the named matcher.
    Matched { matcher: &'static str },
    /// No matcher hit; a new book was inserted.
    Created,
}

/// Resolved book plus the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub book: Book,
    pub outcome: ResolutionOutcome,
}

impl Resolution {
    pub fn is_created(&self) -> bool {
        self.outcome == ResolutionOutcome::Created
    }
}

/// Ordered matcher chain followed by create-on-miss.
pub struct IdentityResolver {
    matchers: Vec<Box<dyn BookMatcher>>,
}

impl Default for IdentityResolver {
    /// Primary identifier, then ISBN.
    fn default() -> Self {
        Self::with_matchers(vec![Box::new(SourceIdMatcher), Box::new(IsbnMatcher)])
    }
}

impl IdentityResolver {
    pub fn with_matchers(matchers: Vec<Box<dyn BookMatcher>>) -> Self {
        Self { matchers }
    }

    /// Appends a matcher after the existing chain, i.e. right before creation.
    pub fn push_matcher(mut self, matcher: Box<dyn BookMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    pub fn matcher_names(&self) -> Vec<&'static str> {
        self.matchers.iter().map(|matcher| matcher.name()).collect()
    }

    /// Resolves one mention against `books`.
    ///
    /// # Errors
    /// - `InvalidMention` when the mention is unusable, or matches nothing and
    ///   has no title to create a book from. Nothing is written in that case.
    /// - `Repo` for storage failures other than an identifier race.
    pub fn resolve(&self, books: &dyn BookRepository, mention: &Mention) -> ResolveResult<Resolution> {
        mention.validate()?;

        if let Some(resolution) = self.match_existing(books, mention)? {
            return Ok(resolution);
        }

        let new_book = mention.to_new_book()?;
        match books.insert_book(&new_book) {
            Ok(book) => Ok(Resolution {
                book,
                outcome: ResolutionOutcome::Created,
            }),
            Err(err @ RepoError::UniqueViolation { .. }) => {
                debug!(
                    "event=resolve_race module=resolve status=retry constraint={}",
                    err
                );
                match self.match_existing(books, mention)? {
                    Some(resolution) => Ok(resolution),
                    None => {
                        warn!(
                            "event=resolve_race module=resolve status=error reason=no_match_after_conflict"
                        );
                        Err(err.into())
                    }
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    fn match_existing(
        &self,
        books: &dyn BookRepository,
        mention: &Mention,
    ) -> RepoResult<Option<Resolution>> {
        for matcher in &self.matchers {
            if let Some(found) = matcher.find_match(books, mention)? {
                let fields = match mention.to_new_book() {
                    Ok(fields) => fields,
                    Err(_) => return Ok(Some(matched(found, matcher.name()))),
                };
                let book = books.fill_missing_fields(found.id, &fields)?;
                return Ok(Some(matched(book, matcher.name())));
            }
        }
        Ok(None)
    }
}

fn matched(book: Book, matcher: &'static str) -> Resolution {
    Resolution {
        book,
        outcome: ResolutionOutcome::Matched { matcher },
    }
}
