use bmark_store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

/// All the ways a whole import or export run can fail
///
/// Per-bookmark storage failures during import are not in here: those
/// are reported in the import outcomes and never stop the run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to read bookmarks file {}: {source}", path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create output file {}: {source}", path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Import worker failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
