// SQLite-backed bookmark store
// One connection, three tables, every write wrapped in a transaction

pub mod error;
pub mod filter;
pub mod models;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use filter::{EntryFilter, Match, Predicate};
pub use models::{Entry, EntryUpdate, ExportRow, NewEntry};
pub use store::Store;
