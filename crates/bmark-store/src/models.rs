use serde::{Deserialize, Serialize};

/// A stored bookmark, labels included
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub note: Option<String>,
    /// Epoch seconds
    pub created_at: i64,
    /// Epoch seconds
    pub updated_at: i64,
    pub labels: Vec<String>,
}

/// A bookmark that has not been written yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEntry {
    pub url: String,
    pub title: String,
    pub note: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub labels: Vec<String>,
}

/// Partial edit of an existing bookmark; `None` leaves a column alone
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    pub url: Option<String>,
    pub title: Option<String>,
    pub note: Option<String>,
    /// Defaults to now when not given
    pub updated_at: Option<i64>,
}

impl EntryUpdate {
    pub fn is_empty(&self) -> bool {
        self.url.is_none() && self.title.is_none() && self.note.is_none()
    }
}

/// One row of the export join: a bookmark with its labels folded into
/// a comma-separated list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub url: String,
    pub title: String,
    pub note: String,
    pub created_at: i64,
    pub updated_at: i64,
    /// `None` when the bookmark has no labels
    pub labels: Option<String>,
}
