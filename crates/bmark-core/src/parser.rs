//! Bookmark document parser
//!
//! Browsers export bookmarks in the Netscape bookmark format: one `<DT>`
//! per bookmark, an `<A ...>` tag carrying the url and metadata as
//! attributes, and an optional `<DD>` line with a description. This is
//! not an HTML parser. It pattern-matches the narrow dialect browsers
//! actually emit and quietly drops blocks that don't fit.

use crate::escape::unescape;
use crate::models::Candidate;
use regex::Regex;
use std::sync::OnceLock;

struct Patterns {
    marker: Regex,
    anchor: Regex,
    href: Regex,
    add_date: Regex,
    last_modified: Regex,
    tags: Regex,
    description: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        marker: Regex::new(r"(?i)<DT>").expect("valid block marker pattern"),
        anchor: Regex::new(r"(?is)<A\s+([^>]+)>(.*?)</A>").expect("valid anchor pattern"),
        href: Regex::new(r#"\bHREF="([^"]+)""#).expect("valid href pattern"),
        add_date: Regex::new(r#"\bADD_DATE="(\d+)""#).expect("valid add date pattern"),
        last_modified: Regex::new(r#"\bLAST_MODIFIED="(\d+)""#)
            .expect("valid last modified pattern"),
        tags: Regex::new(r#"\bTAGS="([^"]*)""#).expect("valid tags pattern"),
        description: Regex::new(r"(?i)<DD>([^<]+)").expect("valid description pattern"),
    })
}

/// Lazy stream of candidates over a bookmark document
///
/// Cloning it, or calling [`parse_document`] again, starts over from the
/// top of the document.
#[derive(Clone)]
pub struct Candidates<'a> {
    document: &'a str,
    /// Start of the next unread block, `None` once the document is used up
    pos: Option<usize>,
    now: i64,
}

impl<'a> Candidates<'a> {
    fn next_block(&mut self) -> Option<&'a str> {
        let start = self.pos?;
        match patterns().marker.find_at(self.document, start) {
            Some(m) => {
                self.pos = Some(m.end());
                Some(&self.document[start..m.start()])
            }
            None => {
                self.pos = None;
                Some(&self.document[start..])
            }
        }
    }
}

impl Iterator for Candidates<'_> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Candidate> {
        while let Some(block) = self.next_block() {
            if let Some(candidate) = parse_block(block, self.now) {
                return Some(candidate);
            }
        }
        None
    }
}

/// Parse a whole bookmark document
///
/// Missing creation times fall back to the moment parsing started.
pub fn parse_document(document: &str) -> Candidates<'_> {
    parse_document_at(document, chrono::Utc::now().timestamp())
}

/// Same as [`parse_document`] with an explicit "now" for missing dates
pub fn parse_document_at(document: &str, now: i64) -> Candidates<'_> {
    Candidates {
        document,
        pos: Some(0),
        now,
    }
}

/// Number of blocks a document splits into, preamble included
pub fn block_count(document: &str) -> usize {
    patterns().marker.find_iter(document).count() + 1
}

/// Pull a candidate out of one `<DT>` block, if it has one
pub fn parse_block(block: &str, now: i64) -> Option<Candidate> {
    let block = block.trim();
    if block.is_empty() {
        return None;
    }

    let p = patterns();
    let anchor = p.anchor.captures(block)?;
    let attrs = anchor.get(1)?.as_str();
    let inner = anchor.get(2)?;

    let url = attribute(&p.href, attrs).map(unescape)?;
    if url.is_empty() {
        return None;
    }

    let created_at = timestamp(&p.add_date, attrs).unwrap_or(now);
    let updated_at = timestamp(&p.last_modified, attrs).unwrap_or(created_at);
    let labels = attribute(&p.tags, attrs)
        .map(split_labels)
        .unwrap_or_default();

    let title = unescape(inner.as_str().trim());

    // Only a <DD> after the anchor belongs to this bookmark
    let note = p
        .description
        .captures(&block[inner.end()..])
        .and_then(|c| c.get(1))
        .map(|m| unescape(m.as_str().trim()))
        .unwrap_or_default();

    Some(Candidate {
        url,
        title,
        note,
        created_at,
        updated_at,
        labels,
    })
}

fn attribute<'a>(re: &Regex, attrs: &'a str) -> Option<&'a str> {
    re.captures(attrs)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn timestamp(re: &Regex, attrs: &str) -> Option<i64> {
    attribute(re, attrs).and_then(|raw| raw.parse().ok())
}

/// Comma-separated label list: trimmed, decoded, blanks dropped
fn split_labels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|label| unescape(label.trim()))
        .filter(|label| !label.trim().is_empty())
        .collect()
}
