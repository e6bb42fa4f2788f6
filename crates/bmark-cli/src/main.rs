use anyhow::Context;
use bmark_core::export::DEFAULT_EXPORT_FILE;
use bmark_core::{Config, Exporter, ImportCoordinator};
use bmark_store::{Entry, EntryFilter, Store};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bmark")]
#[command(version, about = "Personal bookmark store with browser bookmark import/export", long_about = None)]
struct Cli {
    /// Database file (defaults to <data dir>/bookmarks/bookmark.db)
    #[arg(long, global = true, env = "BMARK_DB")]
    db: Option<PathBuf>,

    /// Number of concurrent import workers
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Import a browser bookmark file
    Import {
        /// Bookmark file in Netscape HTML format
        file: PathBuf,
    },
    /// Export every bookmark to a browser bookmark file
    Export {
        /// Output file
        #[arg(default_value = DEFAULT_EXPORT_FILE)]
        file: PathBuf,
    },
    /// Search bookmarks
    Search {
        /// Match any condition instead of all of them
        #[arg(long)]
        any: bool,
        /// Url contains
        #[arg(long)]
        url: Option<String>,
        /// Title contains
        #[arg(long)]
        title: Option<String>,
        /// Note contains
        #[arg(long)]
        note: Option<String>,
        /// Has this exact label (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
        /// Free text matched against url, title, note and labels
        terms: Vec<String>,
    },
    /// List every label
    Tags,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout is for results; logs go to stderr
    let default_filter = if cli.verbose { "bmark=debug" } else { "bmark=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load().context("Failed to load configuration")?;
    if let Some(db) = cli.db {
        config.store.db_path = Some(db);
    }
    if let Some(workers) = cli.workers {
        config.import.workers = workers;
    }

    let db_path = config.db_path()?;
    let store = Arc::new(
        Store::open(&db_path, config.store.busy_timeout())
            .with_context(|| format!("Failed to open database {}", db_path.display()))?,
    );

    match cli.command {
        Commands::Import { file } => {
            let coordinator = ImportCoordinator::from_config(Arc::clone(&store), &config.import);
            let report = coordinator
                .import_file(&file)
                .await
                .with_context(|| format!("Failed to import {}", file.display()))?;

            if report.failed() > 0 {
                tracing::warn!("{} bookmarks could not be imported", report.failed());
            }
            println!("{} bookmarks successfully imported!", report.succeeded);
        }
        Commands::Export { file } => {
            let summary = Exporter::export_to_file(&store, &file)
                .with_context(|| format!("Failed to export to {}", file.display()))?;

            if summary.is_empty() {
                println!("No bookmarks found in database.");
            } else {
                println!("Exported {} bookmarks to: {}", summary.count, summary.path.display());
            }
        }
        Commands::Search {
            any,
            url,
            title,
            note,
            tags,
            json,
            terms,
        } => {
            let mut filter = if any { EntryFilter::any() } else { EntryFilter::all() };
            if let Some(url) = url {
                filter = filter.url_contains(url);
            }
            if let Some(title) = title {
                filter = filter.title_contains(title);
            }
            if let Some(note) = note {
                filter = filter.note_contains(note);
            }
            for tag in tags {
                filter = filter.label(tag);
            }
            for term in terms {
                filter = filter.text(term);
            }

            tracing::debug!("Searching with {} predicates", filter.predicates().len());
            let entries = store.search(&filter)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No matching bookmarks.");
            } else {
                for entry in &entries {
                    print_entry(entry);
                }
            }
        }
        Commands::Tags => {
            for label in store.labels()? {
                println!("{}", label);
            }
        }
    }

    Ok(())
}

fn print_entry(entry: &Entry) {
    let added = chrono::DateTime::from_timestamp(entry.created_at, 0)
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| entry.created_at.to_string());

    println!(
        "{}. {}",
        entry.id,
        entry.title.as_deref().filter(|t| !t.is_empty()).unwrap_or(&entry.url)
    );
    println!("   {}", entry.url);
    if let Some(note) = entry.note.as_deref().filter(|n| !n.is_empty()) {
        println!("   {}", note);
    }
    if !entry.labels.is_empty() {
        println!("   # {}", entry.labels.join(", "));
    }
    println!("   added {}", added);
}
