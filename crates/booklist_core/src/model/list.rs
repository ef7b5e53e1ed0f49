//! List tiers: raw lists, aggregated lists, meta lists and ranking snapshots.
//!
//! # Invariants
//! - A `BookList` name is unique; it is the idempotency key for ingestion.
//! - `RawListItem::source_rank` is >= 1 and unique within one raw list.
//! - A `MetaList` references each `BookList` at most once.
//! - Ranks inside one ranking snapshot form the sequence `1..=n`.

use crate::model::book::{Book, BookId};
use serde::{Deserialize, Serialize};

pub type ListId = i64;
pub type RawListId = i64;
pub type RawListItemId = i64;
pub type MetaListId = i64;

/// Logical source (curator, site chart) whose raw lists are aggregated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookList {
    pub id: ListId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}

/// One ingested snapshot of a source page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawList {
    pub id: RawListId,
    /// `None` until the raw list is assigned to a `BookList`.
    pub list_id: Option<ListId>,
    pub name: String,
    pub source_url: Option<String>,
    pub created_at: i64,
}

/// Book reference at one position of a raw list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListItem {
    pub id: RawListItemId,
    pub raw_list_id: RawListId,
    pub book_id: BookId,
    pub source_rank: i64,
}

/// User-defined combination of lists ranked by cross-list frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaList {
    pub id: MetaListId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: i64,
}

/// One row of a persisted ranking snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedBook {
    pub book: Book,
    /// Number of distinct member lists containing the book.
    pub frequency: u32,
    /// 1-based strict position after tie-breaking.
    pub rank: u32,
}

/// Ranking row before it is joined with its book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankingEntry {
    pub book_id: BookId,
    pub frequency: u32,
    pub rank: u32,
}
