//! Persistence: SQLite schema, repository, and the change-detecting
//! snapshot policy for pool quotes.

pub mod policy;
pub mod repository;
pub mod schema;

pub use policy::{record_quotes, QuoteKey, QuoteStore, SnapshotStats};
pub use repository::{RaceSummary, SqliteStore};
pub use schema::create_tables;
