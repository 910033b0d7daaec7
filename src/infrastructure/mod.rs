// Core infrastructure modules
pub mod cache;              // LRU profile cache
pub mod database;           // Database interface and transaction wrapper
pub mod middleware;         // Viewer context middleware + extractor
pub mod realtime;           // Change feed and refresh loops
pub mod schema;             // SQLite DDL
pub mod sqlite_database;    // sqlx-backed implementation
pub mod viewer;             // Viewer context

pub use cache::{Cache, ProfileCache};
pub use database::{DatabaseInterface, DatabaseTransaction, IdeaQuery, IdeaSort, VoteTable, VoteTally};
pub use realtime::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, Subscription, Table};
pub use sqlite_database::SqliteDatabase;
pub use viewer::ViewerContext;
