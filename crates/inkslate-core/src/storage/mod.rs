//! Page storage collaborator for persistence.
//!
//! The persistence adaptor never touches the file system directly: it reads
//! and writes raw page buffers through a [`PageStore`].

mod file;
mod memory;

pub use file::DocumentDirectory;
pub use memory::MemoryDocument;

use crate::version::FileVersion;
use std::path::Path;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Page not found: {0}")]
    NotFound(usize),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// A document: an ordered list of page buffers plus its declared version.
///
/// Page indices are 0-based.
pub trait PageStore: Send + Sync {
    /// Directory that relative resource links resolve against.
    fn base_path(&self) -> &Path;

    /// Format version declared by the document, if any.
    fn file_version(&self) -> Option<FileVersion>;

    /// Number of pages currently stored.
    fn page_count(&self) -> usize;

    /// Raw markup of one page.
    fn read_page(&self, index: usize) -> StorageResult<Vec<u8>>;

    /// Replace (or append, when `index == page_count()`) one page.
    fn write_page(&self, index: usize, data: &[u8]) -> StorageResult<()>;
}
