//! Book repository contract and SQLite implementation.
//!
//! # Invariants
//! - Inserts never merge: a conflicting identifier is reported as
//!   `UniqueViolation` and the caller decides how to recover.
//! - Updates only fill columns that are currently NULL; they never overwrite.

use crate::model::book::{Book, BookId, NewBook};
use crate::repo::{ensure_connection_ready, RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension, Row};

const BOOK_SELECT_SQL: &str = "SELECT
    id,
    source_id,
    isbn,
    title,
    author,
    cover_url,
    description,
    created_at
FROM books";

/// Repository interface for canonical books.
pub trait BookRepository {
    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>>;
    fn find_by_source_id(&self, source_id: &str) -> RepoResult<Option<Book>>;
    fn find_by_isbn(&self, isbn: &str) -> RepoResult<Option<Book>>;
    /// Books whose author equals `author` ignoring ASCII case, oldest first.
    fn find_by_author(&self, author: &str) -> RepoResult<Vec<Book>>;
    fn insert_book(&self, book: &NewBook) -> RepoResult<Book>;
    /// Fills NULL optional columns of `id` from `fields`; `fields.title` is ignored.
    fn fill_missing_fields(&self, id: BookId, fields: &NewBook) -> RepoResult<Book>;
    fn count_books(&self) -> RepoResult<i64>;
}

/// SQLite-backed book repository.
pub struct SqliteBookRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBookRepository<'conn> {
    /// Constructs a repository from a migrated connection or transaction.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["books"])?;
        Ok(Self { conn })
    }

    fn find_one(&self, column: &str, value: &str) -> RepoResult<Option<Book>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{BOOK_SELECT_SQL} WHERE {column} = ?1;"))?;
        let book = stmt.query_row([value], parse_book_row).optional()?;
        Ok(book)
    }
}

impl BookRepository for SqliteBookRepository<'_> {
    fn get_book(&self, id: BookId) -> RepoResult<Option<Book>> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("{BOOK_SELECT_SQL} WHERE id = ?1;"))?;
        let book = stmt.query_row([id], parse_book_row).optional()?;
        Ok(book)
    }

    fn find_by_source_id(&self, source_id: &str) -> RepoResult<Option<Book>> {
        self.find_one("source_id", source_id)
    }

    fn find_by_isbn(&self, isbn: &str) -> RepoResult<Option<Book>> {
        self.find_one("isbn", isbn)
    }

    fn find_by_author(&self, author: &str) -> RepoResult<Vec<Book>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "{BOOK_SELECT_SQL}
             WHERE trim(author) = ?1 COLLATE NOCASE
             ORDER BY id ASC;"
        ))?;
        let rows = stmt.query_map([author.trim()], parse_book_row)?;
        let mut books = Vec::new();
        for row in rows {
            books.push(row?);
        }
        Ok(books)
    }

    fn insert_book(&self, book: &NewBook) -> RepoResult<Book> {
        if book.title.trim().is_empty() {
            return Err(RepoError::InvalidData(
                "book title must not be blank".to_string(),
            ));
        }

        self.conn.execute(
            "INSERT INTO books (
                source_id,
                isbn,
                title,
                author,
                cover_url,
                description
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                book.source_id.as_deref(),
                book.isbn.as_deref(),
                book.title.as_str(),
                book.author.as_deref(),
                book.cover_url.as_deref(),
                book.description.as_deref(),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        load_required_book(self, id)
    }

    fn fill_missing_fields(&self, id: BookId, fields: &NewBook) -> RepoResult<Book> {
        self.conn.execute(
            "UPDATE books
             SET
                author = COALESCE(author, ?2),
                cover_url = COALESCE(cover_url, ?3),
                description = COALESCE(description, ?4)
             WHERE id = ?1;",
            params![
                id,
                fields.author.as_deref(),
                fields.cover_url.as_deref(),
                fields.description.as_deref(),
            ],
        )?;

        // An identifier held by another book stays with that book.
        for (column, value) in [
            ("source_id", fields.source_id.as_deref()),
            ("isbn", fields.isbn.as_deref()),
        ] {
            let Some(value) = value else {
                continue;
            };
            let result = self.conn.execute(
                &format!(
                    "UPDATE books
                     SET {column} = ?2
                     WHERE id = ?1
                       AND {column} IS NULL
                       AND NOT EXISTS (SELECT 1 FROM books WHERE {column} = ?2);"
                ),
                params![id, value],
            );
            match result.map_err(RepoError::from) {
                Ok(_) => {}
                Err(err) if err.is_unique_violation_on("books", column) => {}
                Err(err) => return Err(err),
            }
        }

        load_required_book(self, id)
    }

    fn count_books(&self) -> RepoResult<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM books;", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn load_required_book(repo: &SqliteBookRepository<'_>, id: BookId) -> RepoResult<Book> {
    repo.get_book(id)?
        .ok_or(RepoError::NotFound { entity: "book", id })
}

/// Maps one `books` row selected with `BOOK_SELECT_SQL` columns.
pub(crate) fn parse_book_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get("id")?,
        source_id: row.get("source_id")?,
        isbn: row.get("isbn")?,
        title: row.get("title")?,
        author: row.get("author")?,
        cover_url: row.get("cover_url")?,
        description: row.get("description")?,
        created_at: row.get("created_at")?,
    })
}
