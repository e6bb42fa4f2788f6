//! Composable bookmark filters
//!
//! Predicates are collected as typed values and only turned into SQL at
//! the very end. User text never lands in the query string: every value
//! becomes a `?` placeholder with a bound parameter.

/// How predicates are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Match {
    /// Every predicate must hold (AND)
    #[default]
    All,
    /// At least one predicate must hold (OR)
    Any,
}

/// A single condition on a bookmark
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    UrlContains(String),
    TitleContains(String),
    NoteContains(String),
    /// Exact label match
    LabelIs(String),
    /// Substring match on url, title, note or any label
    AnyTextContains(String),
}

const LABEL_EXISTS: &str = "EXISTS (SELECT 1 FROM bookmark_tags bt \
     JOIN tags t ON t.id = bt.tag_id WHERE bt.bookmark_id = b.id AND t.tag";

impl Predicate {
    /// Render this predicate as a SQL fragment, pushing its parameters
    fn render(&self, params: &mut Vec<String>) -> String {
        match self {
            Predicate::UrlContains(s) => {
                params.push(like_pattern(s));
                "b.url LIKE ? ESCAPE '\\'".to_string()
            }
            Predicate::TitleContains(s) => {
                params.push(like_pattern(s));
                "b.title LIKE ? ESCAPE '\\'".to_string()
            }
            Predicate::NoteContains(s) => {
                params.push(like_pattern(s));
                "b.note LIKE ? ESCAPE '\\'".to_string()
            }
            Predicate::LabelIs(s) => {
                params.push(s.clone());
                format!("{} = ?)", LABEL_EXISTS)
            }
            Predicate::AnyTextContains(s) => {
                let pattern = like_pattern(s);
                for _ in 0..4 {
                    params.push(pattern.clone());
                }
                format!(
                    "(b.url LIKE ? ESCAPE '\\' OR b.title LIKE ? ESCAPE '\\' \
                     OR b.note LIKE ? ESCAPE '\\' OR {} LIKE ? ESCAPE '\\'))",
                    LABEL_EXISTS
                )
            }
        }
    }
}

/// Builder for bookmark searches
///
/// ```
/// use bmark_store::EntryFilter;
///
/// let filter = EntryFilter::any()
///     .title_contains("rust")
///     .label("programming");
/// let (sql, params) = filter.to_sql();
/// assert!(sql.contains(" OR "));
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    mode: Match,
    predicates: Vec<Predicate>,
    limit: Option<usize>,
}

impl EntryFilter {
    /// Filter requiring every predicate to match
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter requiring at least one predicate to match
    pub fn any() -> Self {
        Self {
            mode: Match::Any,
            ..Self::default()
        }
    }

    pub fn with(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn url_contains(self, text: impl Into<String>) -> Self {
        self.with(Predicate::UrlContains(text.into()))
    }

    pub fn title_contains(self, text: impl Into<String>) -> Self {
        self.with(Predicate::TitleContains(text.into()))
    }

    pub fn note_contains(self, text: impl Into<String>) -> Self {
        self.with(Predicate::NoteContains(text.into()))
    }

    pub fn label(self, label: impl Into<String>) -> Self {
        self.with(Predicate::LabelIs(label.into()))
    }

    pub fn text(self, text: impl Into<String>) -> Self {
        self.with(Predicate::AnyTextContains(text.into()))
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Render the id query and its bound parameters
    ///
    /// An empty filter matches every bookmark.
    pub fn to_sql(&self) -> (String, Vec<String>) {
        let mut params = Vec::new();
        let mut sql = String::from("SELECT b.id FROM bookmarks b");

        if !self.predicates.is_empty() {
            let joiner = match self.mode {
                Match::All => " AND ",
                Match::Any => " OR ",
            };
            let clauses: Vec<String> = self
                .predicates
                .iter()
                .map(|p| p.render(&mut params))
                .collect();
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(joiner));
        }

        sql.push_str(" ORDER BY b.id");
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        (sql, params)
    }
}

/// Wrap text in `%` for LIKE, escaping the LIKE wildcards it contains
fn like_pattern(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('%');
    out
}
