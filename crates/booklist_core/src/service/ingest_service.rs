//! Raw list ingestion use-case.
//!
//! # Responsibility
//! - Find-or-create the target list by name, create one raw list per run.
//! - Resolve every mention to a canonical book and attach it with its rank.
//! - Report per-mention outcomes without aborting the batch.
//!
//! # Invariants
//! - One ingest call is one IMMEDIATE transaction: a structural or storage
//!   failure rolls back the list, the raw list and every item of the run.
//! - Every input mention is either attached or listed in `skipped`.
//! - Source ranks are unique within the run's raw list.

use crate::model::book::{Mention, MentionError};
use crate::model::list::{BookList, ListId, RawListId};
use crate::repo::book_repo::{BookRepository, SqliteBookRepository};
use crate::repo::list_repo::{ListRepository, SqliteListRepository};
use crate::resolve::{IdentityResolver, Resolution, ResolveError};
use crate::service::{require_name, ServiceError, ServiceResult};
use log::{error, info, warn};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Instant;
use uuid::Uuid;

/// Input of one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestRequest {
    /// Idempotency key of the target list.
    pub list_name: String,
    /// Used only when the list is created by this run.
    pub list_description: Option<String>,
    /// Display name of the raw list (e.g. the scraped page title).
    pub source_name: String,
    pub source_url: Option<String>,
    pub mentions: Vec<Mention>,
}

/// Why a mention was not attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    InvalidMention { error: MentionError },
    DuplicateRank { rank: i64 },
}

/// One mention left out of the raw list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedMention {
    /// 1-based position in the input sequence.
    pub position: usize,
    pub reason: SkipReason,
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Correlates the log lines of this run.
    pub run_id: Uuid,
    pub list_id: ListId,
    pub list_name: String,
    pub raw_list_id: RawListId,
    /// Mentions processed, attached or not.
    pub total: usize,
    pub new_books: usize,
    pub existing_books: usize,
    pub skipped: Vec<SkippedMention>,
}

impl IngestReport {
    /// Mentions attached to the raw list.
    pub fn attached(&self) -> usize {
        self.new_books + self.existing_books
    }
}

/// Ingestion service bound to one connection.
pub struct IngestService<'conn> {
    conn: &'conn mut Connection,
    resolver: IdentityResolver,
}

impl<'conn> IngestService<'conn> {
    /// Creates a service with the default resolver chain.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self::with_resolver(conn, IdentityResolver::default())
    }

    pub fn with_resolver(conn: &'conn mut Connection, resolver: IdentityResolver) -> Self {
        Self { conn, resolver }
    }

    /// Resolves a single mention to its canonical book, creating it if needed.
    pub fn resolve_mention(&mut self, mention: &Mention) -> ServiceResult<Resolution> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let resolution = {
            let books = SqliteBookRepository::try_new(&tx)?;
            self.resolver.resolve(&books, mention)?
        };
        tx.commit()?;
        Ok(resolution)
    }

    /// Ingests one raw list under `request.list_name`.
    ///
    /// # Errors
    /// - `InvalidName` for a blank list or source name.
    /// - `Persistence` when storage fails; nothing from the run is kept.
    pub fn ingest(&mut self, request: &IngestRequest) -> ServiceResult<IngestReport> {
        let started_at = Instant::now();
        let run_id = Uuid::new_v4();
        let list_name = require_name(&request.list_name, "list name")?;
        let source_name = require_name(&request.source_name, "source name")?;
        info!(
            "event=ingest module=service status=start run_id={} mentions={}",
            run_id,
            request.mentions.len()
        );

        let result = self.ingest_in_tx(run_id, list_name, source_name, request);
        match &result {
            Ok(report) => info!(
                "event=ingest module=service status=ok run_id={} list_id={} raw_list_id={} total={} new_books={} existing_books={} skipped={} duration_ms={}",
                run_id,
                report.list_id,
                report.raw_list_id,
                report.total,
                report.new_books,
                report.existing_books,
                report.skipped.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=ingest module=service status=error run_id={} duration_ms={} error={}",
                run_id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn ingest_in_tx(
        &mut self,
        run_id: Uuid,
        list_name: &str,
        source_name: &str,
        request: &IngestRequest,
    ) -> ServiceResult<IngestReport> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let report = {
            let lists = SqliteListRepository::try_new(&tx)?;
            let books = SqliteBookRepository::try_new(&tx)?;

            let list =
                find_or_create_list(&lists, list_name, request.list_description.as_deref())?;
            let raw_list = lists.insert_raw_list(
                Some(list.id),
                source_name,
                request.source_url.as_deref(),
            )?;

            let mut report = IngestReport {
                run_id,
                list_id: list.id,
                list_name: list.name,
                raw_list_id: raw_list.id,
                total: 0,
                new_books: 0,
                existing_books: 0,
                skipped: Vec::new(),
            };
            let mut used_ranks = HashSet::new();

            for (index, mention) in request.mentions.iter().enumerate() {
                let position = index + 1;
                report.total += 1;

                let attached = attach(
                    &self.resolver,
                    &lists,
                    &books,
                    raw_list.id,
                    position,
                    mention,
                    &mut used_ranks,
                )?;
                match attached {
                    Attached::New => report.new_books += 1,
                    Attached::Existing => report.existing_books += 1,
                    Attached::Skipped(reason) => {
                        warn!(
                            "event=ingest_skip module=service status=skip run_id={} position={} reason={:?}",
                            run_id, position, reason
                        );
                        report.skipped.push(SkippedMention { position, reason });
                    }
                }
            }
            report
        };

        tx.commit()?;
        Ok(report)
    }
}

/// Resolves one mention and appends it to the raw list.
///
/// Per-mention problems come back as `Attached::Skipped`; only storage
/// failures are errors.
fn attach(
    resolver: &IdentityResolver,
    lists: &dyn ListRepository,
    books: &dyn BookRepository,
    raw_list_id: RawListId,
    position: usize,
    mention: &Mention,
    used_ranks: &mut HashSet<i64>,
) -> ServiceResult<Attached> {
    if let Err(error) = mention.validate() {
        return Ok(Attached::Skipped(SkipReason::InvalidMention { error }));
    }

    let rank = mention.source_rank.unwrap_or(position as i64);
    if used_ranks.contains(&rank) {
        return Ok(Attached::Skipped(SkipReason::DuplicateRank { rank }));
    }

    let resolution = match resolver.resolve(books, mention) {
        Ok(resolution) => resolution,
        Err(ResolveError::InvalidMention(error)) => {
            return Ok(Attached::Skipped(SkipReason::InvalidMention { error }));
        }
        Err(ResolveError::Repo(err)) => return Err(err.into()),
    };

    lists.insert_item(raw_list_id, resolution.book.id, rank)?;
    used_ranks.insert(rank);

    if resolution.is_created() {
        Ok(Attached::New)
    } else {
        Ok(Attached::Existing)
    }
}

enum Attached {
    New,
    Existing,
    Skipped(SkipReason),
}

fn find_or_create_list(
    lists: &dyn ListRepository,
    name: &str,
    description: Option<&str>,
) -> ServiceResult<BookList> {
    if let Some(list) = lists.find_list_by_name(name)? {
        return Ok(list);
    }
    match lists.insert_list(name, description) {
        Ok(list) => Ok(list),
        Err(err) if err.is_unique_violation_on("lists", "name") => lists
            .find_list_by_name(name)?
            .ok_or(ServiceError::Persistence(err)),
        Err(err) => Err(err.into()),
    }
}
