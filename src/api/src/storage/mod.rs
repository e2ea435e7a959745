//! SQLite storage for historical race results
//!
//! Provides the `race_history` table, the read-only lookup used by the
//! dashboard, and the full-replace ingestion that populates it.

pub mod ingest;
pub mod repository;
pub mod schema;

pub use ingest::ingest_race_history;
pub use repository::HistoryStore;
