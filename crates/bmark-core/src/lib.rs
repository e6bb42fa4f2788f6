// Bookmark import/export pipeline
// Markup in, rows out - and back again
pub mod config;
pub mod error;
pub mod escape;
pub mod export;
pub mod import;
pub mod models;
pub mod parser;

pub use config::Config;
pub use error::Error;
pub use export::{ExportSummary, Exporter};
pub use import::{ImportCoordinator, ImportOutcome, ImportReport};
pub use models::Candidate;
pub use parser::{parse_document, Candidates};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
