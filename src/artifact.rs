//! Filesystem-backed store for rendered diff artifacts.
//!
//! Artifacts live as `<id>.html` in one flat directory. Identifiers look like
//! `diff_20240131_235959_1a2b3c4d`: a second-resolution local timestamp plus
//! eight random hex characters. Files are written to a temporary name in the
//! same directory and renamed into place, so an identifier never points at a
//! partial file.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use thiserror::Error;

const ID_PREFIX: &str = "diff_";
const EXTENSION: &str = "html";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),
    #[error("failed to create diff directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write diff artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read diff artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Outcome of one janitor pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Generates a fresh identifier. Uniqueness within one second comes from
    /// the random suffix.
    pub fn generate_id() -> String {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        format!("{}{}_{}", ID_PREFIX, timestamp, &suffix[..8])
    }

    /// Persists `content` under a new identifier and returns it.
    pub fn save(&self, content: &str) -> Result<String, ArtifactError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ArtifactError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let id = Self::generate_id();
        let path = self.path_for(&id);
        let write_err = |source| ArtifactError::Write {
            path: path.clone(),
            source,
        };

        let mut tmp = tempfile::Builder::new()
            .prefix(".tmp_")
            .tempfile_in(&self.dir)
            .map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist_noclobber(&path)
            .map_err(|e| write_err(e.error))?;

        tracing::debug!(id = %id, path = %path.display(), "saved diff artifact");
        Ok(id)
    }

    /// Reads an artifact by identifier, with or without the `.html` suffix.
    ///
    /// Anything that is not a well-formed artifact name is reported as not
    /// found, which also rejects path traversal.
    pub fn read(&self, id: &str) -> Result<Vec<u8>, ArtifactError> {
        let stem = id
            .strip_suffix(&format!(".{}", EXTENSION))
            .unwrap_or(id);
        if !is_artifact_id(stem) {
            return Err(ArtifactError::NotFound(id.to_string()));
        }

        let path = self.path_for(stem);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ArtifactError::NotFound(id.to_string()))
            }
            Err(source) => Err(ArtifactError::Read { path, source }),
        }
    }

    /// Deletes artifacts whose modification time is more than `max_age`
    /// before `now`.
    ///
    /// A missing directory is an empty sweep. Per-file failures are logged
    /// and counted; only failing to list the directory is an error.
    pub fn sweep(&self, max_age: Duration, now: SystemTime) -> std::io::Result<SweepReport> {
        let mut report = SweepReport::default();

        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e),
        };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(dir = %self.dir.display(), error = %e, "cannot read diff directory entry");
                    report.failed += 1;
                    continue;
                }
            };
            let path = entry.path();
            if !is_artifact_file(&path) {
                continue;
            }
            report.scanned += 1;

            let modified = match entry.metadata().and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "cannot stat diff artifact");
                    report.failed += 1;
                    continue;
                }
            };

            // Future mtimes count as age zero.
            let age = now.duration_since(modified).unwrap_or_default();
            if age <= max_age {
                continue;
            }

            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), age_secs = age.as_secs(), "deleted old diff artifact");
                    report.deleted += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "error deleting old diff artifact");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, EXTENSION))
    }
}

/// Retrieval path for an artifact, as returned by the compare endpoint.
pub fn artifact_url(id: &str) -> String {
    format!("/files/diff/{}.{}", id, EXTENSION)
}

fn is_artifact_id(id: &str) -> bool {
    id.len() > ID_PREFIX.len()
        && id.starts_with(ID_PREFIX)
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_artifact_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == EXTENSION)
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| stem.starts_with(ID_PREFIX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::tempdir;

    const HOUR: Duration = Duration::from_secs(60 * 60);

    fn backdate(path: &Path, age: Duration) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn generated_ids_have_expected_shape() {
        let id = ArtifactStore::generate_id();
        let parts: Vec<&str> = id.split('_').collect();

        assert_eq!(parts.len(), 4, "{}", id);
        assert_eq!(parts[0], "diff");
        assert_eq!(parts[1].len(), 8);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[1].chars().chain(parts[2].chars()).all(|c| c.is_ascii_digit()));
        assert_eq!(parts[3].len(), 8);
        assert!(parts[3].chars().all(|c| c.is_ascii_hexdigit()));
        assert!(is_artifact_id(&id));
    }

    #[test]
    fn rapid_ids_are_unique() {
        let ids: HashSet<String> = (0..1000).map(|_| ArtifactStore::generate_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn save_creates_directory_and_round_trips() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("diff"));

        let id = store.save("<html>hi</html>").unwrap();

        assert!(store.dir().join(format!("{}.html", id)).is_file());
        assert_eq!(store.read(&id).unwrap(), b"<html>hi</html>");
        assert_eq!(store.read(&format!("{}.html", id)).unwrap(), b"<html>hi</html>");
        assert_eq!(artifact_url(&id), format!("/files/diff/{}.html", id));
    }

    #[test]
    fn save_leaves_no_temporary_files() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());

        store.save("a").unwrap();
        store.save("b").unwrap();

        let names: Vec<String> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| n.starts_with("diff_") && n.ends_with(".html")));
    }

    #[test]
    fn save_fails_when_directory_is_a_file() {
        let tmp = tempdir().unwrap();
        let blocker = tmp.path().join("diff");
        fs::write(&blocker, "not a dir").unwrap();

        let err = ArtifactStore::new(&blocker).save("x").unwrap_err();
        assert!(matches!(err, ArtifactError::CreateDir { .. }));
    }

    #[test]
    fn read_rejects_traversal_and_unknown_ids() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("diff"));
        fs::write(tmp.path().join("secret.html"), "secret").unwrap();

        for id in [
            "../secret",
            "../secret.html",
            "diff_/../../secret",
            "diff_..%2fsecret",
            "secret",
            "diff_",
            "",
            "diff_20240101_000000_deadbeef",
        ] {
            assert!(
                matches!(store.read(id), Err(ArtifactError::NotFound(_))),
                "id {:?} should be not found",
                id
            );
        }
    }

    #[test]
    fn sweep_deletes_only_artifacts_past_threshold() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());

        let young = store.save("young").unwrap();
        let old = store.save("old").unwrap();
        backdate(&store.path_for(&young), 23 * HOUR);
        backdate(&store.path_for(&old), 25 * HOUR);

        let report = store.sweep(24 * HOUR, SystemTime::now()).unwrap();

        assert_eq!(report, SweepReport { scanned: 2, deleted: 1, failed: 0 });
        assert!(store.read(&young).is_ok());
        assert!(matches!(store.read(&old), Err(ArtifactError::NotFound(_))));
    }

    #[test]
    fn sweep_continues_past_failures() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());

        // A directory with an artifact name cannot be removed as a file.
        let stuck = tmp.path().join("diff_20240101_000000_00000000.html");
        fs::create_dir(&stuck).unwrap();
        fs::File::open(&stuck)
            .unwrap()
            .set_modified(SystemTime::now() - 48 * HOUR)
            .unwrap();
        let old = tmp.path().join("diff_20240101_000000_ffffffff.html");
        fs::write(&old, "old").unwrap();
        backdate(&old, 48 * HOUR);

        let report = store.sweep(24 * HOUR, SystemTime::now()).unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 1);
        assert!(stuck.exists());
        assert!(!old.exists());
    }

    #[test]
    fn sweep_ignores_foreign_files() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let notes = tmp.path().join("notes.html");
        let other = tmp.path().join("diff_keep.txt");
        fs::write(&notes, "x").unwrap();
        fs::write(&other, "x").unwrap();
        backdate(&notes, 48 * HOUR);
        backdate(&other, 48 * HOUR);

        let report = store.sweep(24 * HOUR, SystemTime::now()).unwrap();

        assert_eq!(report.scanned, 0);
        assert!(notes.exists());
        assert!(other.exists());
    }

    #[test]
    fn sweep_of_missing_directory_is_empty() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path().join("never-created"));

        let report = store.sweep(24 * HOUR, SystemTime::now()).unwrap();
        assert_eq!(report, SweepReport::default());
    }

    #[test]
    fn sweep_uses_supplied_clock() {
        let tmp = tempdir().unwrap();
        let store = ArtifactStore::new(tmp.path());
        let id = store.save("x").unwrap();

        let report = store
            .sweep(24 * HOUR, SystemTime::now() + 25 * HOUR)
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert!(store.read(&id).is_err());
    }
}
