//! Domain model for the three-tier booklist catalog.
//!
//! # Responsibility
//! - Define canonical records (`Book`) and the list tiers that reference them.
//! - Define the pre-resolution input shape (`Mention`) and its validation.
//!
//! # Invariants
//! - Every persisted record is identified by a SQLite-assigned integer id.
//! - A `Book` is shared by reference; list tiers never own or copy it.

pub mod book;
pub mod list;
