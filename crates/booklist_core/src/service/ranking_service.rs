//! Meta list management and frequency ranking use-case.
//!
//! # Responsibility
//! - Create meta lists and maintain their list membership.
//! - Compute and persist the frequency ranking of a meta list.
//!
//! # Invariants
//! - `rank` reads member sets and replaces the stored snapshot inside one
//!   IMMEDIATE transaction: concurrent ingestion is seen entirely or not at all.
//! - Stored snapshot rows are replaced, never appended.

use crate::model::list::{BookList, ListId, MetaList, MetaListId, RankedBook};
use crate::ranking::{count_frequencies, rank_by_frequency};
use crate::repo::list_repo::{ListRepository, SqliteListRepository};
use crate::repo::meta_repo::{MetaListRepository, SqliteMetaListRepository};
use crate::service::{require_name, ServiceError, ServiceResult};
use log::info;
use rusqlite::{Connection, TransactionBehavior};
use std::time::Instant;

/// Meta list service bound to one connection.
pub struct RankingService<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> RankingService<'conn> {
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }

    /// Creates an empty meta list.
    pub fn create_meta_list(
        &mut self,
        name: &str,
        description: Option<&str>,
    ) -> ServiceResult<MetaList> {
        let name = require_name(name, "meta list name")?;
        let metas = SqliteMetaListRepository::try_new(self.conn)?;
        Ok(metas.insert_meta_list(name, description)?)
    }

    pub fn get_meta_list(&self, meta_list_id: MetaListId) -> ServiceResult<Option<MetaList>> {
        let metas = SqliteMetaListRepository::try_new(self.conn)?;
        Ok(metas.get_meta_list(meta_list_id)?)
    }

    /// Adds a list to a meta list; returns `false` if it was already a member.
    pub fn add_list(&mut self, meta_list_id: MetaListId, list_id: ListId) -> ServiceResult<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let added = {
            let metas = SqliteMetaListRepository::try_new(&tx)?;
            let lists = SqliteListRepository::try_new(&tx)?;
            require_meta_list(&metas, meta_list_id)?;
            if lists.get_list(list_id)?.is_none() {
                return Err(ServiceError::ListNotFound(list_id));
            }
            metas.add_member(meta_list_id, list_id)?
        };
        tx.commit()?;
        Ok(added)
    }

    /// Removes a list from a meta list; returns `false` if it was not a member.
    pub fn remove_list(
        &mut self,
        meta_list_id: MetaListId,
        list_id: ListId,
    ) -> ServiceResult<bool> {
        let metas = SqliteMetaListRepository::try_new(self.conn)?;
        require_meta_list(&metas, meta_list_id)?;
        Ok(metas.remove_member(meta_list_id, list_id)?)
    }

    /// Member lists ordered by id.
    pub fn member_lists_of(&self, meta_list_id: MetaListId) -> ServiceResult<Vec<BookList>> {
        let metas = SqliteMetaListRepository::try_new(self.conn)?;
        let lists = SqliteListRepository::try_new(self.conn)?;
        require_meta_list(&metas, meta_list_id)?;

        let mut members = Vec::new();
        for list_id in metas.member_list_ids(meta_list_id)? {
            if let Some(list) = lists.get_list(list_id)? {
                members.push(list);
            }
        }
        Ok(members)
    }

    /// Recomputes the ranking of `meta_list_id` and replaces its snapshot.
    ///
    /// # Errors
    /// - `MetaListNotFound` when the meta list does not exist.
    /// - `Persistence` on storage failure; the previous snapshot is kept.
    pub fn rank(&mut self, meta_list_id: MetaListId) -> ServiceResult<Vec<RankedBook>> {
        let started_at = Instant::now();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let (ranked, member_count) = {
            let metas = SqliteMetaListRepository::try_new(&tx)?;
            let lists = SqliteListRepository::try_new(&tx)?;
            require_meta_list(&metas, meta_list_id)?;

            let member_ids = metas.member_list_ids(meta_list_id)?;
            let mut member_sets = Vec::with_capacity(member_ids.len());
            for list_id in &member_ids {
                member_sets.push(lists.member_book_ids(*list_id)?);
            }

            let frequencies = count_frequencies(&member_sets);
            let entries =
                rank_by_frequency(&frequencies, |book_id| lists.earliest_source_rank(book_id))?;
            metas.replace_results(meta_list_id, &entries)?;
            (metas.load_results(meta_list_id)?, member_ids.len())
        };
        tx.commit()?;

        info!(
            "event=rank module=service status=ok meta_list_id={} member_lists={} books={} duration_ms={}",
            meta_list_id,
            member_count,
            ranked.len(),
            started_at.elapsed().as_millis()
        );
        Ok(ranked)
    }

    /// Last persisted ranking, without recomputing.
    pub fn latest_result(&self, meta_list_id: MetaListId) -> ServiceResult<Vec<RankedBook>> {
        let metas = SqliteMetaListRepository::try_new(self.conn)?;
        require_meta_list(&metas, meta_list_id)?;
        Ok(metas.load_results(meta_list_id)?)
    }
}

fn require_meta_list(
    metas: &dyn MetaListRepository,
    meta_list_id: MetaListId,
) -> ServiceResult<MetaList> {
    metas
        .get_meta_list(meta_list_id)?
        .ok_or(ServiceError::MetaListNotFound(meta_list_id))
}
