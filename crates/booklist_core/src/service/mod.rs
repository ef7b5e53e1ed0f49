//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repositories, the identity resolver and the ranking
//!   computation into the operations callers use: ingest, members, rank.
//! - Own transaction boundaries so a failed call leaves no partial writes.

pub mod ingest_service;
pub mod list_service;
pub mod ranking_service;

use crate::model::book::MentionError;
use crate::model::list::{ListId, MetaListId, RawListId};
use crate::repo::RepoError;
use crate::resolve::ResolveError;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced to callers of the core services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid mention: {0}")]
    InvalidMention(MentionError),
    #[error("{0} must not be blank")]
    InvalidName(&'static str),
    #[error("list not found: {0}")]
    ListNotFound(ListId),
    #[error("raw list not found: {0}")]
    RawListNotFound(RawListId),
    #[error("meta list not found: {0}")]
    MetaListNotFound(MetaListId),
    #[error("persistence failure: {0}")]
    Persistence(#[from] RepoError),
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(value.into())
    }
}

impl From<ResolveError> for ServiceError {
    fn from(value: ResolveError) -> Self {
        match value {
            ResolveError::InvalidMention(err) => Self::InvalidMention(err),
            ResolveError::Repo(err) => Self::Persistence(err),
        }
    }
}

pub(crate) fn require_name<'a>(value: &'a str, field: &'static str) -> ServiceResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidName(field));
    }
    Ok(trimmed)
}
