//! Background reclamation of old diff artifacts.
//!
//! The janitor sweeps once at startup and then once per interval until its
//! cancellation token fires. It shares nothing with request handlers except
//! the artifact directory; a fresh artifact is always younger than the
//! threshold, so no locking is needed.

use std::time::{Duration, SystemTime};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::artifact::{ArtifactStore, SweepReport};

#[derive(Debug, Clone)]
pub struct Janitor {
    store: ArtifactStore,
    max_age: Duration,
    interval: Duration,
}

impl Janitor {
    pub fn new(store: ArtifactStore, max_age: Duration, interval: Duration) -> Self {
        Self {
            store,
            max_age,
            interval,
        }
    }

    /// Runs a single sweep on the blocking pool. Never fails: errors are
    /// logged and an empty report is returned.
    pub async fn run_once(&self) -> SweepReport {
        let store = self.store.clone();
        let max_age = self.max_age;

        let outcome =
            tokio::task::spawn_blocking(move || store.sweep(max_age, SystemTime::now())).await;

        match outcome {
            Ok(Ok(report)) => {
                if report.deleted > 0 || report.failed > 0 {
                    tracing::info!(
                        scanned = report.scanned,
                        deleted = report.deleted,
                        failed = report.failed,
                        "diff cleanup pass finished"
                    );
                }
                report
            }
            Ok(Err(e)) => {
                tracing::error!(dir = %self.store.dir().display(), error = %e, "error in diff cleanup");
                SweepReport::default()
            }
            Err(e) => {
                tracing::error!(error = %e, "diff cleanup task panicked");
                SweepReport::default()
            }
        }
    }

    /// Sweeps until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(
            dir = %self.store.dir().display(),
            max_age_secs = self.max_age.as_secs(),
            interval_secs = self.interval.as_secs(),
            "diff janitor started"
        );

        loop {
            self.run_once().await;

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("diff janitor stopped");
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    #[tokio::test]
    async fn run_once_deletes_expired_artifacts() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let old = store.save("old").unwrap();
        let path = tmp.path().join(format!("{}.html", old));
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(SystemTime::now() - 25 * HOUR)
            .unwrap();

        let janitor = Janitor::new(store, 24 * HOUR, HOUR);
        let report = janitor.run_once().await;

        assert_eq!(report.deleted, 1);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn scan_errors_do_not_propagate() {
        let tmp = tempdir().unwrap();
        let not_a_dir = tmp.path().join("file");
        fs::write(&not_a_dir, "x").unwrap();

        let janitor = Janitor::new(ArtifactStore::new(&not_a_dir), 24 * HOUR, HOUR);
        assert_eq!(janitor.run_once().await, SweepReport::default());
    }

    #[tokio::test]
    async fn loop_keeps_sweeping_and_stops_on_cancel() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let janitor = Janitor::new(store.clone(), Duration::from_millis(50), Duration::from_millis(20));

        let shutdown = CancellationToken::new();
        let handle = janitor.spawn(shutdown.clone());

        let id = store.save("short-lived").unwrap();
        let path = tmp.path().join(format!("{}.html", id));

        let mut gone = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if !path.exists() {
                gone = true;
                break;
            }
        }
        assert!(gone, "artifact was never reclaimed");

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("janitor did not stop")
            .unwrap();
    }
}
