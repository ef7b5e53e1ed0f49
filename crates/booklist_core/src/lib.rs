//! Core domain logic for the booklist catalog.
//!
//! Raw book mentions from external sources are resolved to canonical books,
//! grouped into raw lists under named lists, and combined by user-defined meta
//! lists into rankings ordered by cross-list frequency.
//! This crate is the single source of truth for those invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod ranking;
pub mod repo;
pub mod resolve;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::book::{Book, BookId, Mention, MentionError, NewBook};
pub use model::list::{
    BookList, ListId, MetaList, MetaListId, RankedBook, RankingEntry, RawList, RawListId,
    RawListItem,
};
pub use repo::book_repo::{BookRepository, SqliteBookRepository};
pub use repo::list_repo::{ListRepository, SqliteListRepository};
pub use repo::meta_repo::{MetaListRepository, SqliteMetaListRepository};
pub use repo::{RepoError, RepoResult};
pub use resolve::{
    BookMatcher, IdentityResolver, IsbnMatcher, NormalizedTitleMatcher, Resolution,
    ResolutionOutcome, ResolveError, SourceIdMatcher,
};
pub use service::ingest_service::{
    IngestReport, IngestRequest, IngestService, SkipReason, SkippedMention,
};
pub use service::list_service::ListService;
pub use service::ranking_service::RankingService;
pub use service::{ServiceError, ServiceResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
