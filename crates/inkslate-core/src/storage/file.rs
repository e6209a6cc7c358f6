//! Directory-backed page store.

use super::{PageStore, StorageError, StorageResult};
use crate::version::FileVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-document metadata file.
pub const METADATA_FILE: &str = "metadata.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version: Option<String>,
}

/// A document stored as a directory of `pageNNN.svg` files.
///
/// Page files are numbered from 1 with three digits; index 0 is
/// `page001.svg`. `metadata.json` carries the document version.
pub struct DocumentDirectory {
    /// Document root; resource links are relative to it.
    base_path: PathBuf,
    version: Option<FileVersion>,
}

impl DocumentDirectory {
    /// Open a document directory, creating it if it doesn't exist.
    pub fn open(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create document directory: {}", e))
            })?;
        }
        let version = read_metadata(&base_path)?
            .version
            .as_deref()
            .and_then(FileVersion::parse);
        log::debug!("Opened document {} (version {:?})", base_path.display(), version);
        Ok(Self { base_path, version })
    }

    /// Record the document version in `metadata.json`.
    pub fn set_version(&mut self, version: FileVersion) -> StorageResult<()> {
        let metadata = DocumentMetadata {
            version: Some(version.to_string()),
        };
        let json = serde_json::to_string_pretty(&metadata)
            .map_err(|e| StorageError::Other(format!("Failed to encode metadata: {}", e)))?;
        let path = self.base_path.join(METADATA_FILE);
        fs::write(&path, json)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))?;
        self.version = Some(version);
        Ok(())
    }

    /// Path of the page file for a 0-based index.
    pub fn page_path(&self, index: usize) -> PathBuf {
        self.base_path.join(format!("page{:03}.svg", index + 1))
    }
}

fn read_metadata(base_path: &Path) -> StorageResult<DocumentMetadata> {
    let path = base_path.join(METADATA_FILE);
    if !path.exists() {
        return Ok(DocumentMetadata::default());
    }
    let json = fs::read_to_string(&path)
        .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&json)
        .map_err(|e| StorageError::Other(format!("Failed to parse {}: {}", path.display(), e)))
}

impl PageStore for DocumentDirectory {
    fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_version(&self) -> Option<FileVersion> {
        self.version
    }

    fn page_count(&self) -> usize {
        (0..).take_while(|&index| self.page_path(index).exists()).count()
    }

    fn read_page(&self, index: usize) -> StorageResult<Vec<u8>> {
        let path = self.page_path(index);
        if !path.exists() {
            return Err(StorageError::NotFound(index));
        }
        fs::read(&path)
            .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))
    }

    fn write_page(&self, index: usize, data: &[u8]) -> StorageResult<()> {
        let path = self.page_path(index);
        fs::write(&path, data)
            .map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_page_files_are_numbered_from_one() {
        let dir = tempdir().unwrap();
        let doc = DocumentDirectory::open(dir.path()).unwrap();

        doc.write_page(0, b"<svg/>").unwrap();
        doc.write_page(1, b"<svg/>").unwrap();

        assert!(dir.path().join("page001.svg").exists());
        assert!(dir.path().join("page002.svg").exists());
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.read_page(1).unwrap(), b"<svg/>".to_vec());
    }

    #[test]
    fn test_missing_page() {
        let dir = tempdir().unwrap();
        let doc = DocumentDirectory::open(dir.path()).unwrap();
        assert!(matches!(doc.read_page(0), Err(StorageError::NotFound(0))));
    }

    #[test]
    fn test_version_persists_in_metadata() {
        let dir = tempdir().unwrap();
        let mut doc = DocumentDirectory::open(dir.path()).unwrap();
        assert_eq!(doc.file_version(), None);

        doc.set_version(FileVersion::new(4, 1, 0)).unwrap();
        let reopened = DocumentDirectory::open(dir.path()).unwrap();
        assert_eq!(reopened.file_version(), Some(FileVersion::DEFAULT_LEGACY));
    }

    #[test]
    fn test_open_creates_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let doc = DocumentDirectory::open(&nested).unwrap();
        assert!(nested.exists());
        assert_eq!(doc.base_path(), nested.as_path());
    }
}
