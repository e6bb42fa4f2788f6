use bmark_store::NewEntry;

/// A bookmark pulled out of a markup document, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    pub note: String,
    /// Epoch seconds
    pub created_at: i64,
    /// Epoch seconds
    pub updated_at: i64,
    /// Trimmed, never empty
    pub labels: Vec<String>,
}

impl From<Candidate> for NewEntry {
    fn from(c: Candidate) -> Self {
        NewEntry {
            url: c.url,
            title: c.title,
            note: c.note,
            created_at: c.created_at,
            updated_at: c.updated_at,
            labels: c.labels,
        }
    }
}
