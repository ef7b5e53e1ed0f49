//! List / raw list repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist lists, raw lists and their ranked items.
//! - Derive list membership from raw list items on every read.
//!
//! # Invariants
//! - List names are unique; lookups by name are exact.
//! - Item listing is deterministic: `source_rank ASC`.
//! - Member sets are recomputed from `raw_list_items`, never stored.

use crate::model::book::{Book, BookId};
use crate::model::list::{BookList, ListId, RawList, RawListId, RawListItem};
use crate::repo::book_repo::parse_book_row;
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;

const LIST_SELECT_SQL: &str = "SELECT id, name, description, created_at FROM lists";
const RAW_LIST_SELECT_SQL: &str =
    "SELECT id, list_id, name, source_url, created_at FROM raw_lists";

/// Repository interface for lists and their raw snapshots.
pub trait ListRepository {
    fn get_list(&self, id: ListId) -> RepoResult<Option<BookList>>;
    fn find_list_by_name(&self, name: &str) -> RepoResult<Option<BookList>>;
    fn insert_list(&self, name: &str, description: Option<&str>) -> RepoResult<BookList>;
    fn get_raw_list(&self, id: RawListId) -> RepoResult<Option<RawList>>;
    fn insert_raw_list(
        &self,
        list_id: Option<ListId>,
        name: &str,
        source_url: Option<&str>,
    ) -> RepoResult<RawList>;
    /// Attaches a raw list to a list; fails if it already belongs to one.
    fn assign_raw_list(&self, raw_list_id: RawListId, list_id: ListId) -> RepoResult<()>;
    fn insert_item(
        &self,
        raw_list_id: RawListId,
        book_id: BookId,
        source_rank: i64,
    ) -> RepoResult<RawListItem>;
    fn raw_lists_of(&self, list_id: ListId) -> RepoResult<Vec<RawList>>;
    fn items_of(&self, raw_list_id: RawListId) -> RepoResult<Vec<RawListItem>>;
    /// Deletes a raw list and, by cascade, its items. Books are untouched.
    fn delete_raw_list(&self, raw_list_id: RawListId) -> RepoResult<()>;
    fn member_book_ids(&self, list_id: ListId) -> RepoResult<BTreeSet<BookId>>;
    /// Distinct member books ordered by id.
    fn members_of(&self, list_id: ListId) -> RepoResult<Vec<Book>>;
    /// Source rank of the book's first-created item in any raw list.
    fn earliest_source_rank(&self, book_id: BookId) -> RepoResult<Option<i64>>;
}

/// SQLite-backed list repository.
pub struct SqliteListRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteListRepository<'conn> {
    /// Constructs a repository from a migrated connection or transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["lists", "raw_lists", "raw_list_items", "books"])?;
        Ok(Self { conn })
    }
}

impl ListRepository for SqliteListRepository<'_> {
    fn get_list(&self, id: ListId) -> RepoResult<Option<BookList>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{LIST_SELECT_SQL} WHERE id = ?1;"))?;
        Ok(stmt.query_row([id], parse_list_row).optional()?)
    }

    fn find_list_by_name(&self, name: &str) -> RepoResult<Option<BookList>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{LIST_SELECT_SQL} WHERE name = ?1;"))?;
        Ok(stmt.query_row([name], parse_list_row).optional()?)
    }

    fn insert_list(&self, name: &str, description: Option<&str>) -> RepoResult<BookList> {
        self.conn.execute(
            "INSERT INTO lists (name, description) VALUES (?1, ?2);",
            params![name, description],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_list(id)?
            .ok_or(RepoError::NotFound { entity: "list", id })
    }

    fn get_raw_list(&self, id: RawListId) -> RepoResult<Option<RawList>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{RAW_LIST_SELECT_SQL} WHERE id = ?1;"))?;
        Ok(stmt.query_row([id], parse_raw_list_row).optional()?)
    }

    fn insert_raw_list(
        &self,
        list_id: Option<ListId>,
        name: &str,
        source_url: Option<&str>,
    ) -> RepoResult<RawList> {
        self.conn.execute(
            "INSERT INTO raw_lists (list_id, name, source_url) VALUES (?1, ?2, ?3);",
            params![list_id, name, source_url],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_raw_list(id)?.ok_or(RepoError::NotFound {
            entity: "raw list",
            id,
        })
    }

    fn assign_raw_list(&self, raw_list_id: RawListId, list_id: ListId) -> RepoResult<()> {
        let raw_list = self.get_raw_list(raw_list_id)?.ok_or(RepoError::NotFound {
            entity: "raw list",
            id: raw_list_id,
        })?;
        match raw_list.list_id {
            Some(current) if current == list_id => Ok(()),
            Some(current) => Err(RepoError::InvalidData(format!(
                "raw list {raw_list_id} already belongs to list {current}"
            ))),
            None => {
                self.conn.execute(
                    "UPDATE raw_lists SET list_id = ?2 WHERE id = ?1 AND list_id IS NULL;",
                    params![raw_list_id, list_id],
                )?;
                Ok(())
            }
        }
    }

    fn insert_item(
        &self,
        raw_list_id: RawListId,
        book_id: BookId,
        source_rank: i64,
    ) -> RepoResult<RawListItem> {
        self.conn.execute(
            "INSERT INTO raw_list_items (raw_list_id, book_id, source_rank)
             VALUES (?1, ?2, ?3);",
            params![raw_list_id, book_id, source_rank],
        )?;
        Ok(RawListItem {
            id: self.conn.last_insert_rowid(),
            raw_list_id,
            book_id,
            source_rank,
        })
    }

    fn raw_lists_of(&self, list_id: ListId) -> RepoResult<Vec<RawList>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{RAW_LIST_SELECT_SQL} WHERE list_id = ?1 ORDER BY id ASC;"
        ))?;
        let rows = stmt.query_map([list_id], parse_raw_list_row)?;
        let mut raw_lists = Vec::new();
        for row in rows {
            raw_lists.push(row?);
        }
        Ok(raw_lists)
    }

    fn items_of(&self, raw_list_id: RawListId) -> RepoResult<Vec<RawListItem>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, raw_list_id, book_id, source_rank
             FROM raw_list_items
             WHERE raw_list_id = ?1
             ORDER BY source_rank ASC;",
        )?;
        let rows = stmt.query_map([raw_list_id], |row| {
            Ok(RawListItem {
                id: row.get("id")?,
                raw_list_id: row.get("raw_list_id")?,
                book_id: row.get("book_id")?,
                source_rank: row.get("source_rank")?,
            })
        })?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row?);
        }
        Ok(items)
    }

    fn delete_raw_list(&self, raw_list_id: RawListId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM raw_lists WHERE id = ?1;", [raw_list_id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "raw list",
                id: raw_list_id,
            });
        }
        Ok(())
    }

    fn member_book_ids(&self, list_id: ListId) -> RepoResult<BTreeSet<BookId>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT DISTINCT i.book_id
             FROM raw_list_items i
             INNER JOIN raw_lists r ON r.id = i.raw_list_id
             WHERE r.list_id = ?1;",
        )?;
        let rows = stmt.query_map([list_id], |row| row.get::<_, BookId>(0))?;
        let mut ids = BTreeSet::new();
        for row in rows {
            ids.insert(row?);
        }
        Ok(ids)
    }

    fn members_of(&self, list_id: ListId) -> RepoResult<Vec<Book>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT
                b.id AS id,
                b.source_id AS source_id,
                b.isbn AS isbn,
                b.title AS title,
                b.author AS author,
                b.cover_url AS cover_url,
                b.description AS description,
                b.created_at AS created_at
             FROM books b
             WHERE b.id IN (
                SELECT i.book_id
                FROM raw_list_items i
                INNER JOIN raw_lists r ON r.id = i.raw_list_id
                WHERE r.list_id = ?1
             )
             ORDER BY b.id ASC;",
        )?;
        let rows = stmt.query_map([list_id], parse_book_row)?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    fn earliest_source_rank(&self, book_id: BookId) -> RepoResult<Option<i64>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT source_rank
             FROM raw_list_items
             WHERE book_id = ?1
             ORDER BY id ASC
             LIMIT 1;",
        )?;
        Ok(stmt.query_row([book_id], |row| row.get(0)).optional()?)
    }
}

fn parse_list_row(row: &Row<'_>) -> rusqlite::Result<BookList> {
    Ok(BookList {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}

fn parse_raw_list_row(row: &Row<'_>) -> rusqlite::Result<RawList> {
    Ok(RawList {
        id: row.get("id")?,
        list_id: row.get("list_id")?,
        name: row.get("name")?,
        source_url: row.get("source_url")?,
        created_at: row.get("created_at")?,
    })
}
