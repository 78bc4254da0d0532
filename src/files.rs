//! Listing and reading of the user files directory.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FileError {
    #[error("No file name provided")]
    EmptyName,
    #[error("Invalid file name: {0}")]
    InvalidName(String),
    #[error("Folder not found")]
    FolderNotFound,
    #[error("Path is not a folder")]
    NotAFolder,
    #[error("File not found")]
    FileNotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Names of the regular files directly inside `dir`, sorted.
pub fn list_files(dir: &Path) -> Result<Vec<String>, FileError> {
    if !dir.exists() {
        return Err(FileError::FolderNotFound);
    }
    if !dir.is_dir() {
        return Err(FileError::NotAFolder);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().is_file() {
            files.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    files.sort();
    Ok(files)
}

/// Reads `name` from `dir` as text.
///
/// Content that is not valid UTF-8 is decoded as ISO-8859-1 instead of
/// failing.
pub fn read_file(dir: &Path, name: &str) -> Result<String, FileError> {
    if name.is_empty() {
        return Err(FileError::EmptyName);
    }
    if !is_plain_name(name) {
        return Err(FileError::InvalidName(name.to_string()));
    }

    let path = dir.join(name);
    if !path.is_file() {
        return Err(FileError::FileNotFound);
    }

    let bytes = std::fs::read(&path)?;
    Ok(decode_text(bytes))
}

/// UTF-8 first, ISO-8859-1 as fallback. Never fails.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}

/// A single path component that stays inside its directory.
fn is_plain_name(name: &str) -> bool {
    !name.contains(['/', '\\', '\0']) && name != "." && name != ".."
}
