//! In-memory page store.

use super::{PageStore, StorageError, StorageResult};
use crate::version::FileVersion;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// In-memory document for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryDocument {
    base_path: PathBuf,
    version: Option<FileVersion>,
    pages: RwLock<HashMap<usize, Vec<u8>>>,
}

impl MemoryDocument {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_path(mut self, base_path: impl Into<PathBuf>) -> Self {
        self.base_path = base_path.into();
        self
    }

    pub fn with_version(mut self, version: FileVersion) -> Self {
        self.version = Some(version);
        self
    }

    /// Append a page and return its index.
    pub fn push_page(&self, data: impl Into<Vec<u8>>) -> StorageResult<usize> {
        let mut pages = self
            .pages
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        let index = pages.len();
        pages.insert(index, data.into());
        Ok(index)
    }
}

impl PageStore for MemoryDocument {
    fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_version(&self) -> Option<FileVersion> {
        self.version
    }

    fn page_count(&self) -> usize {
        self.pages.read().map(|pages| pages.len()).unwrap_or(0)
    }

    fn read_page(&self, index: usize) -> StorageResult<Vec<u8>> {
        let pages = self
            .pages
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        pages.get(&index).cloned().ok_or(StorageError::NotFound(index))
    }

    fn write_page(&self, index: usize, data: &[u8]) -> StorageResult<()> {
        let mut pages = self
            .pages
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))?;
        if index > pages.len() {
            return Err(StorageError::NotFound(index));
        }
        pages.insert(index, data.to_vec());
        Ok(())
    }
}
