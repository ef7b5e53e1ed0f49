//! List aggregation use-case service.
//!
//! # Responsibility
//! - Expose a list's member books as the deduplicated union of its raw lists.
//! - Provide read and maintenance entry points for lists and raw lists.
//!
//! # Invariants
//! - Membership is always derived from stored raw list items at call time,
//!   so a freshly ingested raw list is visible to the next call.
//! - A missing list is reported as `ListNotFound`, never as an empty set.

use crate::model::book::Book;
use crate::model::list::{BookList, ListId, RawList, RawListId, RawListItem};
use crate::repo::list_repo::ListRepository;
use crate::repo::RepoError;
use crate::service::{ServiceError, ServiceResult};
use log::debug;

/// Aggregation service over a list repository.
pub struct ListService<R: ListRepository> {
    repo: R,
}

impl<R: ListRepository> ListService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Distinct books referenced by any raw list of `list_id`, ordered by id.
    pub fn members_of(&self, list_id: ListId) -> ServiceResult<Vec<Book>> {
        self.require_list(list_id)?;
        let members = self.repo.members_of(list_id)?;
        debug!(
            "event=members_of module=service status=ok list_id={} members={}",
            list_id,
            members.len()
        );
        Ok(members)
    }

    pub fn get_list(&self, list_id: ListId) -> ServiceResult<Option<BookList>> {
        Ok(self.repo.get_list(list_id)?)
    }

    pub fn find_list_by_name(&self, name: &str) -> ServiceResult<Option<BookList>> {
        Ok(self.repo.find_list_by_name(name.trim())?)
    }

    /// Raw lists of `list_id` in ingestion order.
    pub fn raw_lists_of(&self, list_id: ListId) -> ServiceResult<Vec<RawList>> {
        self.require_list(list_id)?;
        Ok(self.repo.raw_lists_of(list_id)?)
    }

    /// Items of one raw list ordered by source rank.
    pub fn items_of(&self, raw_list_id: RawListId) -> ServiceResult<Vec<RawListItem>> {
        if self.repo.get_raw_list(raw_list_id)?.is_none() {
            return Err(ServiceError::RawListNotFound(raw_list_id));
        }
        Ok(self.repo.items_of(raw_list_id)?)
    }

    /// Attaches an unassigned raw list to a list.
    pub fn assign_raw_list(&self, raw_list_id: RawListId, list_id: ListId) -> ServiceResult<()> {
        self.require_list(list_id)?;
        self.repo
            .assign_raw_list(raw_list_id, list_id)
            .map_err(|err| match err {
                RepoError::NotFound { .. } => ServiceError::RawListNotFound(raw_list_id),
                other => other.into(),
            })
    }

    /// Deletes a raw list with its items; referenced books survive.
    pub fn delete_raw_list(&self, raw_list_id: RawListId) -> ServiceResult<()> {
        self.repo
            .delete_raw_list(raw_list_id)
            .map_err(|err| match err {
                RepoError::NotFound { .. } => ServiceError::RawListNotFound(raw_list_id),
                other => other.into(),
            })
    }

    fn require_list(&self, list_id: ListId) -> ServiceResult<BookList> {
        self.repo
            .get_list(list_id)?
            .ok_or(ServiceError::ListNotFound(list_id))
    }
}
