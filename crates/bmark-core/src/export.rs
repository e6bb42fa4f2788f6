use crate::escape::{escape, escape_text};
use crate::{Error, Result};
use bmark_store::{ExportRow, Store};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name used when no export target is given
pub const DEFAULT_EXPORT_FILE: &str = "exported_bookmarks.html";

const PREAMBLE: [&str; 6] = [
    "<!DOCTYPE NETSCAPE-Bookmark-file-1>",
    "",
    r#"<META HTTP-EQUIV="Content-Type" CONTENT="text/html; charset=UTF-8">"#,
    "<TITLE>Bookmarks</TITLE>",
    "<H1>Bookmarks</H1>",
    "<DL><p>",
];

const TRAILER: &str = "</DL><p>";

/// Result of writing an export file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub count: u64,
}

impl ExportSummary {
    /// True when the store had nothing to export
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Writes the store back out as a Netscape bookmark file
pub struct Exporter;

impl Exporter {
    /// Export every bookmark to `path`, replacing whatever is there
    pub fn export_to_file<P: AsRef<Path>>(store: &Store, path: P) -> Result<ExportSummary> {
        let path = path.as_ref();

        let file = File::create(path).map_err(|source| Error::CreateOutput {
            path: path.to_path_buf(),
            source,
        })?;

        let count = Self::write_document(store, BufWriter::new(file))?;

        info!("Exported {} bookmarks to {}", count, path.display());
        Ok(ExportSummary {
            path: path.to_path_buf(),
            count,
        })
    }

    /// Stream the whole document into `out`, returning the bookmark count
    pub fn write_document<W: Write>(store: &Store, mut out: W) -> Result<u64> {
        for line in PREAMBLE {
            writeln!(out, "{}", line)?;
        }

        let count = store.for_each_export_row(|row| Self::write_row(&mut out, &row))?;

        writeln!(out, "{}", TRAILER)?;
        out.flush()?;
        Ok(count)
    }

    /// Render the whole document into a string
    pub fn to_html(store: &Store) -> Result<String> {
        let mut buf = Vec::new();
        Self::write_document(store, &mut buf)?;
        String::from_utf8(buf)
            .map_err(|e| Error::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// One `<DT>` line; the label attribute is left out when there are
    /// no labels and the `<DD>` when there is no note. Title and note
    /// keep their edge whitespace as numeric references, since the parser
    /// trims both.
    fn write_row<W: Write>(out: &mut W, row: &ExportRow) -> Result<()> {
        write!(
            out,
            r#"<DT><A HREF="{}" ADD_DATE="{}" LAST_MODIFIED="{}""#,
            escape(&row.url),
            row.created_at,
            row.updated_at
        )?;

        if let Some(labels) = row.labels.as_deref().filter(|l| !l.is_empty()) {
            write!(out, r#" TAGS="{}""#, escape(labels))?;
        }

        write!(out, ">{}</A>", escape_text(&row.title))?;

        if !row.note.is_empty() {
            write!(out, "<DD>{}", escape_text(&row.note))?;
        }

        writeln!(out)?;
        Ok(())
    }
}
