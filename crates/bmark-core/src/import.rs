//! Concurrent import of parsed bookmarks
//!
//! A fixed pool of workers pulls candidates off one shared work queue and
//! upserts each in its own store transaction. Outcomes flow back over a
//! results queue. Both queues are closed by whoever feeds them: the parser
//! side drops the work sender once the document is exhausted, and the
//! results channel closes when the last worker exits.

use crate::config::ImportConfig;
use crate::models::Candidate;
use crate::parser::{block_count, parse_document};
use crate::{Error, Result};
use bmark_store::{NewEntry, Store};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Queue capacity used for candidate streams of unknown length
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// What happened to one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub url: String,
    /// Stored bookmark id, or why the write failed
    pub result: std::result::Result<i64, String>,
}

/// Tally of a finished import
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Candidates written (or resolved to an existing bookmark)
    pub succeeded: usize,
    /// Candidates whose transaction failed
    pub failures: Vec<ImportOutcome>,
}

impl ImportReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failures.len()
    }

    fn record(&mut self, outcome: ImportOutcome) {
        match &outcome.result {
            Ok(id) => {
                debug!(id, url = %outcome.url, "Imported bookmark");
                self.succeeded += 1;
            }
            Err(reason) => {
                warn!(url = %outcome.url, "Failed to import bookmark: {}", reason);
                self.failures.push(outcome);
            }
        }
    }
}

/// Fans candidates out to a pool of store writers
pub struct ImportCoordinator {
    store: Arc<Store>,
    workers: usize,
    queue_capacity: Option<usize>,
}

impl ImportCoordinator {
    /// Coordinator with the default pool of five workers
    pub fn new(store: Arc<Store>) -> Self {
        Self::from_config(store, &ImportConfig::default())
    }

    pub fn from_config(store: Arc<Store>, config: &ImportConfig) -> Self {
        Self {
            store,
            workers: config.worker_count(),
            queue_capacity: config.queue_capacity,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity.max(1));
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Read a bookmark file and import everything in it
    pub async fn import_file(&self, path: &Path) -> Result<ImportReport> {
        let document = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| Error::ReadInput {
                path: path.to_path_buf(),
                source,
            })?;

        info!("Importing bookmarks from {}", path.display());
        self.import_document(&document).await
    }

    /// Parse a bookmark document and import every candidate in it
    pub async fn import_document(&self, document: &str) -> Result<ImportReport> {
        let capacity = self
            .queue_capacity
            .unwrap_or_else(|| block_count(document));
        self.drive(parse_document(document), capacity).await
    }

    /// Import an arbitrary stream of candidates
    pub async fn run<I>(&self, candidates: I) -> Result<ImportReport>
    where
        I: IntoIterator<Item = Candidate>,
    {
        let capacity = self.queue_capacity.unwrap_or(DEFAULT_QUEUE_CAPACITY);
        self.drive(candidates, capacity).await
    }

    /// Always drains the full input before returning; there is no
    /// cancellation of in-flight candidates.
    async fn drive<I>(&self, candidates: I, capacity: usize) -> Result<ImportReport>
    where
        I: IntoIterator<Item = Candidate>,
    {
        let capacity = capacity.max(1);
        let (work_tx, work_rx) = async_channel::bounded::<Candidate>(capacity);
        let (result_tx, mut result_rx) = mpsc::channel::<ImportOutcome>(capacity);

        debug!(workers = self.workers, capacity, "Starting import workers");

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let store = Arc::clone(&self.store);
            let rx = work_rx.clone();
            let tx = result_tx.clone();
            handles.push(tokio::spawn(worker_loop(worker_id, store, rx, tx)));
        }

        // Workers hold the only remaining handles, so the queues close
        // exactly when the parser and the workers are done with them
        drop(work_rx);
        drop(result_tx);

        let produce = async move {
            let mut queued = 0usize;
            for candidate in candidates {
                if work_tx.send(candidate).await.is_err() {
                    break;
                }
                queued += 1;
            }
            work_tx.close();
            queued
        };

        let collect = async {
            let mut report = ImportReport::default();
            while let Some(outcome) = result_rx.recv().await {
                report.record(outcome);
            }
            report
        };

        let (queued, report) = tokio::join!(produce, collect);

        for handle in handles {
            handle
                .await
                .map_err(|e| Error::Worker(e.to_string()))?;
        }

        if report.total() != queued {
            return Err(Error::Worker(format!(
                "{} candidates queued but {} outcomes reported",
                queued,
                report.total()
            )));
        }

        info!(
            succeeded = report.succeeded,
            failed = report.failed(),
            "Import finished"
        );
        Ok(report)
    }
}

/// Pull candidates until the work queue is closed and empty
async fn worker_loop(
    worker_id: usize,
    store: Arc<Store>,
    rx: async_channel::Receiver<Candidate>,
    tx: mpsc::Sender<ImportOutcome>,
) {
    debug!(worker_id, "Worker starting");

    while let Ok(candidate) = rx.recv().await {
        let url = candidate.url.clone();
        let store = Arc::clone(&store);

        // rusqlite is blocking; keep it off the async executor threads
        let result = match tokio::task::spawn_blocking(move || {
            store.upsert_entry(&NewEntry::from(candidate))
        })
        .await
        {
            Ok(Ok(id)) => Ok(id),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(format!("worker task failed: {}", e)),
        };

        if tx.send(ImportOutcome { url, result }).await.is_err() {
            break;
        }
    }

    debug!(worker_id, "Worker done");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(url: &str, labels: &[&str]) -> Candidate {
        Candidate {
            url: url.to_string(),
            title: "t".to_string(),
            note: String::new(),
            created_at: 1,
            updated_at: 1,
            labels: labels.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn test_import_counts_successes() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let coordinator = ImportCoordinator::new(Arc::clone(&store));

        let report = coordinator
            .run(vec![
                candidate("https://a.com", &["x"]),
                candidate("https://b.com", &[]),
                candidate("https://a.com", &["y"]),
            ])
            .await
            .unwrap();

        assert_eq!(report.succeeded, 3);
        assert_eq!(report.failed(), 0);
        assert_eq!(store.count_entries().unwrap(), 2);
        assert_eq!(store.count_links().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_reports_zero() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let report = ImportCoordinator::new(store)
            .import_document("<!DOCTYPE NETSCAPE-Bookmark-file-1>")
            .await
            .unwrap();

        assert_eq!(report.total(), 0);
    }

    #[tokio::test]
    async fn test_tiny_queue_still_drains() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let coordinator = ImportCoordinator::new(Arc::clone(&store))
            .with_workers(3)
            .with_queue_capacity(1);

        let candidates: Vec<Candidate> = (0..50)
            .map(|i| candidate(&format!("https://site{}.com", i % 20), &["bulk"]))
            .collect();
        let report = coordinator.run(candidates).await.unwrap();

        assert_eq!(report.succeeded, 50);
        assert_eq!(store.count_entries().unwrap(), 20);
        assert_eq!(store.count_links().unwrap(), 20);
    }

    #[tokio::test]
    async fn test_failed_candidate_does_not_stop_the_run() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        // A trigger that rejects one url stands in for a storage failure
        store
            .with_connection(|conn| {
                conn.execute_batch(
                    "CREATE TRIGGER reject_url BEFORE INSERT ON bookmarks
                     WHEN NEW.url = 'https://reject.me'
                     BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
                )
            })
            .unwrap();

        let report = ImportCoordinator::new(Arc::clone(&store))
            .run(vec![
                candidate("https://ok.com", &[]),
                candidate("https://reject.me", &[]),
                candidate("https://also-ok.com", &["z"]),
            ])
            .await
            .unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures[0].url, "https://reject.me");
        assert!(store.entry_by_address("https://reject.me").unwrap().is_none());
        assert!(store.entry_by_address("https://also-ok.com").unwrap().is_some());
    }

    #[test]
    fn test_zero_workers_is_clamped() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        assert_eq!(ImportCoordinator::new(store).with_workers(0).workers(), 1);
    }
}
