//! Upload, delete, download, and metadata listings for the `files` and
//! `doc` folders.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;

use crate::config::{StorageConfig, UploadConfig};

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Invalid folder")]
    InvalidFolder,
    #[error("No file part")]
    NoFilePart,
    #[error("No selected file")]
    NoSelectedFile,
    #[error("File type not allowed")]
    ExtensionNotAllowed,
    #[error("Only markdown files are allowed in doc folder")]
    MarkdownOnly,
    #[error("File not found")]
    NotFound,
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// The two user-managed folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    Files,
    Doc,
}

impl FromStr for Folder {
    type Err = ManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "files" => Ok(Folder::Files),
            "doc" => Ok(Folder::Doc),
            _ => Err(ManagerError::InvalidFolder),
        }
    }
}

/// One row of `GET /api/files` or `GET /api/docs`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub modified: f64,
}

#[derive(Debug, Clone)]
pub struct FileManager {
    files_dir: PathBuf,
    docs_dir: PathBuf,
    allowed_extensions: Vec<String>,
}

impl FileManager {
    pub fn new(storage: &StorageConfig, upload: &UploadConfig) -> Self {
        Self {
            files_dir: storage.files_dir.clone(),
            docs_dir: storage.docs_dir.clone(),
            allowed_extensions: upload
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    pub fn folder_dir(&self, folder: Folder) -> &Path {
        match folder {
            Folder::Files => &self.files_dir,
            Folder::Doc => &self.docs_dir,
        }
    }

    pub fn list_files(&self) -> Result<Vec<FileEntry>, ManagerError> {
        list_entries(&self.files_dir, |_| true)
    }

    pub fn list_docs(&self) -> Result<Vec<FileEntry>, ManagerError> {
        list_entries(&self.docs_dir, is_markdown)
    }

    fn extension_allowed(&self, filename: &str) -> bool {
        extension(filename).is_some_and(|ext| self.allowed_extensions.contains(&ext))
    }

    /// Stores an uploaded file under its sanitized name and returns that name.
    pub fn upload(
        &self,
        folder: Folder,
        filename: &str,
        content: &[u8],
    ) -> Result<String, ManagerError> {
        if filename.is_empty() {
            return Err(ManagerError::NoSelectedFile);
        }
        if !self.extension_allowed(filename) {
            return Err(ManagerError::ExtensionNotAllowed);
        }

        let safe_name = secure_filename(filename);
        if safe_name.is_empty() || !self.extension_allowed(&safe_name) {
            return Err(ManagerError::ExtensionNotAllowed);
        }
        if folder == Folder::Doc && !is_markdown(&safe_name) {
            return Err(ManagerError::MarkdownOnly);
        }

        let dir = self.folder_dir(folder);
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(&safe_name), content)?;

        tracing::info!(folder = ?folder, file = %safe_name, bytes = content.len(), "file uploaded");
        Ok(safe_name)
    }

    pub fn delete(&self, folder: Folder, filename: &str) -> Result<(), ManagerError> {
        let path = self.resolve(folder, filename)?;
        std::fs::remove_file(&path)?;
        tracing::info!(path = %path.display(), "file deleted");
        Ok(())
    }

    pub fn download(&self, folder: Folder, filename: &str) -> Result<(String, Vec<u8>), ManagerError> {
        let path = self.resolve(folder, filename)?;
        let bytes = std::fs::read(&path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok((name, bytes))
    }

    fn resolve(&self, folder: Folder, filename: &str) -> Result<PathBuf, ManagerError> {
        let safe_name = secure_filename(filename);
        if safe_name.is_empty() {
            return Err(ManagerError::NotFound);
        }
        let path = self.folder_dir(folder).join(safe_name);
        if !path.is_file() {
            return Err(ManagerError::NotFound);
        }
        Ok(path)
    }
}

fn list_entries(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<FileEntry>, ManagerError> {
    if !dir.is_dir() {
        return Err(ManagerError::NotFound);
    }

    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if !keep(&name) {
            continue;
        }
        let modified = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        entries.push(FileEntry {
            name,
            size: metadata.len(),
            modified,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn extension(filename: &str) -> Option<String> {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
}

fn is_markdown(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".md")
}

/// Reduces a client-supplied filename to a safe single path component.
///
/// The name is NFKD-normalised, so `é` becomes `e`, and anything still
/// non-ASCII is dropped. Path separators and whitespace become `_`,
/// characters outside `[A-Za-z0-9_.-]` are removed, and leading or trailing
/// `.`/`_` are stripped. May return an empty string.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn manager() -> (TempDir, FileManager) {
        let tmp = tempdir().unwrap();
        let storage = StorageConfig {
            files_dir: tmp.path().join("files"),
            docs_dir: tmp.path().join("doc"),
            diff_dir: tmp.path().join("diff"),
        };
        let manager = FileManager::new(&storage, &UploadConfig::default());
        (tmp, manager)
    }

    #[test]
    fn folder_parsing() {
        assert_eq!("files".parse::<Folder>().unwrap(), Folder::Files);
        assert_eq!("doc".parse::<Folder>().unwrap(), Folder::Doc);
        assert!(matches!("docs".parse::<Folder>(), Err(ManagerError::InvalidFolder)));
        assert!(matches!("../files".parse::<Folder>(), Err(ManagerError::InvalidFolder)));
    }

    #[test]
    fn secure_filename_examples() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"), "i_contain_cool_umlauts.txt");
        assert_eq!(secure_filename("r\u{e9}sum\u{e9}.pdf"), "resume.pdf");
        assert_eq!(secure_filename("\u{fb01}le.txt"), "file.txt");
        assert_eq!(secure_filename("..\\windows\\notes.md"), "windows_notes.md");
        assert_eq!(secure_filename("...."), "");
        assert_eq!(secure_filename("report(final)!.pdf"), "reportfinal.pdf");
    }

    #[test]
    fn upload_sanitizes_and_stores() {
        let (tmp, manager) = manager();

        let name = manager.upload(Folder::Files, "my notes.txt", b"hello").unwrap();

        assert_eq!(name, "my_notes.txt");
        assert_eq!(fs::read(tmp.path().join("files/my_notes.txt")).unwrap(), b"hello");
    }

    #[test]
    fn upload_rejects_disallowed_extension() {
        let (_tmp, manager) = manager();

        assert!(matches!(
            manager.upload(Folder::Files, "script.sh", b"rm"),
            Err(ManagerError::ExtensionNotAllowed)
        ));
        assert!(matches!(
            manager.upload(Folder::Files, "noextension", b""),
            Err(ManagerError::ExtensionNotAllowed)
        ));
        assert!(matches!(
            manager.upload(Folder::Files, "", b""),
            Err(ManagerError::NoSelectedFile)
        ));
    }

    #[test]
    fn doc_folder_accepts_only_markdown() {
        let (tmp, manager) = manager();

        assert!(matches!(
            manager.upload(Folder::Doc, "image.png", b"\x89PNG"),
            Err(ManagerError::MarkdownOnly)
        ));
        manager.upload(Folder::Doc, "Guide.MD", b"# Guide").unwrap();
        assert!(tmp.path().join("doc/Guide.MD").is_file());
    }

    #[test]
    fn listings_report_metadata_and_filter_docs() {
        let (tmp, manager) = manager();
        manager.upload(Folder::Files, "b.txt", b"12345").unwrap();
        manager.upload(Folder::Files, "a.md", b"").unwrap();
        fs::create_dir_all(tmp.path().join("doc")).unwrap();
        fs::write(tmp.path().join("doc/readme.md"), "# hi").unwrap();
        fs::write(tmp.path().join("doc/stray.txt"), "x").unwrap();

        let files = manager.list_files().unwrap();
        assert_eq!(files.iter().map(|f| f.name.as_str()).collect::<Vec<_>>(), ["a.md", "b.txt"]);
        assert_eq!(files[1].size, 5);
        assert!(files[1].modified > 0.0);

        let docs = manager.list_docs().unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].name, "readme.md");
    }

    #[test]
    fn listing_missing_folder_is_not_found() {
        let (_tmp, manager) = manager();
        assert!(matches!(manager.list_docs(), Err(ManagerError::NotFound)));
    }

    #[test]
    fn delete_and_download() {
        let (_tmp, manager) = manager();
        manager.upload(Folder::Files, "data.txt", b"payload").unwrap();

        let (name, bytes) = manager.download(Folder::Files, "data.txt").unwrap();
        assert_eq!(name, "data.txt");
        assert_eq!(bytes, b"payload");

        manager.delete(Folder::Files, "data.txt").unwrap();
        assert!(matches!(
            manager.delete(Folder::Files, "data.txt"),
            Err(ManagerError::NotFound)
        ));
        assert!(matches!(
            manager.download(Folder::Files, "data.txt"),
            Err(ManagerError::NotFound)
        ));
    }

    #[test]
    fn traversal_names_are_sanitized_before_lookup() {
        let (tmp, manager) = manager();
        fs::write(tmp.path().join("outside.txt"), "secret").unwrap();

        assert!(matches!(
            manager.download(Folder::Files, "../outside.txt"),
            Err(ManagerError::NotFound)
        ));
    }
}
