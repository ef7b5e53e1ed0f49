//! Repository layer abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts per aggregate.
//! - Isolate SQL details from resolution, ranking and service orchestration.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest version.
//! - Uniqueness conflicts surface as `RepoError::UniqueViolation`, never as a
//!   raw SQLite error, so callers can recover from them.

use crate::db::migrations::{current_user_version, latest_version};
use crate::db::DbError;
use rusqlite::{Connection, ErrorCode};
use thiserror::Error;

pub mod book_repo;
pub mod list_repo;
pub mod meta_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error shared by all catalog repositories.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
    #[error("repository requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    #[error("repository requires table `{0}`")]
    MissingRequiredTable(&'static str),
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match unique_violation_constraint(&value) {
            Some(constraint) => Self::UniqueViolation { constraint },
            None => Self::Db(DbError::Sqlite(value)),
        }
    }
}

impl RepoError {
    /// Returns whether this error is a uniqueness conflict on `table.column`.
    pub fn is_unique_violation_on(&self, table: &str, column: &str) -> bool {
        match self {
            Self::UniqueViolation { constraint } => constraint
                .split(',')
                .any(|part| part.trim() == format!("{table}.{column}")),
            _ => false,
        }
    }
}

/// Extracts `table.column` from a SQLite `UNIQUE constraint failed` error.
fn unique_violation_constraint(err: &rusqlite::Error) -> Option<String> {
    match err {
        rusqlite::Error::SqliteFailure(inner, message)
            if inner.code == ErrorCode::ConstraintViolation
                && inner.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            let constraint = message
                .as_deref()
                .and_then(|text| text.strip_prefix("UNIQUE constraint failed: "))
                .unwrap_or("unknown");
            Some(constraint.to_string())
        }
        _ => None,
    }
}

/// Checks schema version and required tables before a repository is handed out.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
