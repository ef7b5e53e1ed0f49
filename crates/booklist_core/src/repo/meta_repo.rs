//! Meta list repository contract and SQLite implementation.
//!
//! # Invariants
//! - Membership rows are unique per `(meta_list_id, list_id)`.
//! - `replace_results` deletes every previous snapshot row before inserting;
//!   callers wrap it in a transaction so readers never see a mix.

use crate::model::list::{ListId, MetaList, MetaListId, RankedBook, RankingEntry};
use crate::repo::book_repo::parse_book_row;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Repository interface for meta lists, their membership and results.
pub trait MetaListRepository {
    fn get_meta_list(&self, id: MetaListId) -> RepoResult<Option<MetaList>>;
    fn insert_meta_list(&self, name: &str, description: Option<&str>) -> RepoResult<MetaList>;
    /// Returns `false` when the list was already a member.
    fn add_member(&self, meta_list_id: MetaListId, list_id: ListId) -> RepoResult<bool>;
    /// Returns `false` when the list was not a member.
    fn remove_member(&self, meta_list_id: MetaListId, list_id: ListId) -> RepoResult<bool>;
    /// Member list ids in ascending order.
    fn member_list_ids(&self, meta_list_id: MetaListId) -> RepoResult<Vec<ListId>>;
    fn replace_results(&self, meta_list_id: MetaListId, rows: &[RankingEntry]) -> RepoResult<()>;
    /// Persisted snapshot ordered by rank.
    fn load_results(&self, meta_list_id: MetaListId) -> RepoResult<Vec<RankedBook>>;
}

/// SQLite-backed meta list repository.
pub struct SqliteMetaListRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteMetaListRepository<'conn> {
    /// Constructs a repository from a migrated connection or transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &["meta_lists", "meta_list_lists", "meta_list_results", "books"],
        )?;
        Ok(Self { conn })
    }
}

impl MetaListRepository for SqliteMetaListRepository<'_> {
    fn get_meta_list(&self, id: MetaListId) -> RepoResult<Option<MetaList>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, name, description, created_at FROM meta_lists WHERE id = ?1;",
        )?;
        Ok(stmt.query_row([id], parse_meta_list_row).optional()?)
    }

    fn insert_meta_list(&self, name: &str, description: Option<&str>) -> RepoResult<MetaList> {
        self.conn.execute(
            "INSERT INTO meta_lists (name, description) VALUES (?1, ?2);",
            params![name, description],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_meta_list(id)?.ok_or(RepoError::NotFound {
            entity: "meta list",
            id,
        })
    }

    fn add_member(&self, meta_list_id: MetaListId, list_id: ListId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "INSERT OR IGNORE INTO meta_list_lists (meta_list_id, list_id) VALUES (?1, ?2);",
            params![meta_list_id, list_id],
        )?;
        Ok(changed == 1)
    }

    fn remove_member(&self, meta_list_id: MetaListId, list_id: ListId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            "DELETE FROM meta_list_lists WHERE meta_list_id = ?1 AND list_id = ?2;",
            params![meta_list_id, list_id],
        )?;
        Ok(changed == 1)
    }

    fn member_list_ids(&self, meta_list_id: MetaListId) -> RepoResult<Vec<ListId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT list_id
             FROM meta_list_lists
             WHERE meta_list_id = ?1
             ORDER BY list_id ASC;",
        )?;
        let rows = stmt.query_map([meta_list_id], |row| row.get::<_, ListId>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn replace_results(&self, meta_list_id: MetaListId, rows: &[RankingEntry]) -> RepoResult<()> {
        self.conn.execute(
            "DELETE FROM meta_list_results WHERE meta_list_id = ?1;",
            [meta_list_id],
        )?;

        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO meta_list_results (meta_list_id, book_id, frequency, rank)
             VALUES (?1, ?2, ?3, ?4);",
        )?;
        for row in rows {
            stmt.execute(params![meta_list_id, row.book_id, row.frequency, row.rank])?;
        }
        Ok(())
    }

    fn load_results(&self, meta_list_id: MetaListId) -> RepoResult<Vec<RankedBook>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT
                b.id AS id,
                b.source_id AS source_id,
                b.isbn AS isbn,
                b.title AS title,
                b.author AS author,
                b.cover_url AS cover_url,
                b.description AS description,
                b.created_at AS created_at,
                r.frequency AS frequency,
                r.rank AS rank
             FROM meta_list_results r
             INNER JOIN books b ON b.id = r.book_id
             WHERE r.meta_list_id = ?1
             ORDER BY r.rank ASC;",
        )?;
        let rows = stmt.query_map([meta_list_id], |row| {
            Ok(RankedBook {
                book: parse_book_row(row)?,
                frequency: row.get("frequency")?,
                rank: row.get("rank")?,
            })
        })?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

fn parse_meta_list_row(row: &Row<'_>) -> rusqlite::Result<MetaList> {
    Ok(MetaList {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}
