//! Page markup persistence.
//!
//! Loading a page reads its raw bytes from a [`PageStore`], resolves the
//! dialect from the declared version, and drives a [`SceneReader`] to
//! completion. Saving walks the scene and emits markup in the current
//! dialect.

mod convert;
pub mod dialect;
mod reader;
mod root;
pub mod tokens;
pub mod transform;
mod upgrade;
mod writer;

#[cfg(test)]
mod tests;

pub use convert::{ConversionTarget, RasterImage, RasterSource, Rasterizer, convert_scene, encode_png};
pub use dialect::Dialect;
pub use reader::{ReaderState, SceneReader};
pub use root::{read_scene_uuid, rewrite_scene_uuid};
pub use transform::TransformError;
pub use upgrade::{LEGACY_PAGE_SIZE, upgrade};
pub use writer::{SceneWriter, trick_alpha, write_scene};

use crate::scene::Scene;
use crate::storage::{PageStore, StorageError};
use crate::version::FileVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Errors that abort a whole load, save or conversion.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("Malformed document: {0}")]
    MalformedDocument(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Write error: {0}")]
    Write(String),
    #[error("Scene not ready: {0}")]
    NotReady(&'static str),
    #[error("PNG encoding error: {0}")]
    Encoding(#[from] png::EncodingError),
    #[error("Rasterization error: {0}")]
    Raster(String),
}

/// Result type for persistence operations.
pub type PersistResult<T> = Result<T, PersistError>;

/// An element-local problem recovered during a load.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadIssue {
    #[error("Malformed transform on <{element}>: `{value}`")]
    MalformedTransform { element: String, value: String },
    #[error("Malformed {attribute} on <{element}>: `{value}`")]
    MalformedAttribute {
        element: String,
        attribute: String,
        value: String,
    },
    #[error("Unresolved resource {}", .path.display())]
    UnresolvedResource { path: PathBuf },
    #[error("Missing resource link on <{element}>")]
    MissingResource { element: String },
    #[error("Unknown file version {version}, reading as {}", FileVersion::CURRENT)]
    UnknownVersion { version: FileVersion },
    #[error("Markup <{element}> in text content read as plain text")]
    FlattenedMarkup { element: String },
    #[error("Duplicate item id {id}, assigned a new one")]
    DuplicateItem { id: Uuid },
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistConfig {
    /// Check that linked resource files exist while reading.
    pub verify_resources: bool,
    /// Run the upgrade pass when a page was written by an older version.
    pub upgrade_on_load: bool,
    /// Indentation width of written markup; `None` writes it compact.
    pub indent: Option<usize>,
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            verify_resources: true,
            upgrade_on_load: true,
            indent: Some(2),
        }
    }
}

/// Read a whole page buffer into a scene.
pub fn read_scene(
    bytes: Vec<u8>,
    document_version: Option<FileVersion>,
    base_path: &Path,
    config: &PersistConfig,
) -> PersistResult<Scene> {
    SceneReader::new(bytes, document_version, base_path, config.clone()).read_to_end()
}

/// Scene persistence over the pages of one document.
pub struct SceneAdaptor<S: PageStore> {
    store: S,
    config: PersistConfig,
}

impl<S: PageStore> SceneAdaptor<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, PersistConfig::default())
    }

    pub fn with_config(store: S, config: PersistConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    /// Create a reader for a page without consuming any token yet.
    pub fn prepare_loading_scene(&self, index: usize) -> PersistResult<SceneReader> {
        let bytes = self.store.read_page(index)?;
        Ok(SceneReader::new(
            bytes,
            self.store.file_version(),
            self.store.base_path(),
            self.config.clone(),
        ))
    }

    /// Load a page to completion.
    pub fn load_scene(&self, index: usize) -> PersistResult<Scene> {
        let scene = self.prepare_loading_scene(index)?.read_to_end()?;
        log::debug!("Loaded page {} ({} items)", index, scene.item_count());
        Ok(scene)
    }

    /// Raw markup of a page.
    pub fn load_scene_as_text(&self, index: usize) -> PersistResult<String> {
        let bytes = self.store.read_page(index)?;
        String::from_utf8(bytes).map_err(|e| PersistError::MalformedDocument(e.to_string()))
    }

    /// Write a scene to a page in the current dialect.
    pub fn persist_scene(&self, index: usize, scene: &Scene) -> PersistResult<()> {
        let bytes = write_scene(scene, self.store.base_path(), &self.config)?;
        self.store.write_page(index, &bytes)?;
        log::debug!("Persisted page {} ({} bytes)", index, bytes.len());
        Ok(())
    }

    /// Rewrite a page in the current dialect if it was written by an older
    /// version. Returns whether the page changed.
    pub fn upgrade_scene(&self, index: usize) -> PersistResult<bool> {
        let config = PersistConfig {
            upgrade_on_load: false,
            ..self.config.clone()
        };
        let bytes = self.store.read_page(index)?;
        let mut scene = read_scene(bytes, self.store.file_version(), self.store.base_path(), &config)?;
        if !upgrade(&mut scene) {
            return Ok(false);
        }
        self.persist_scene(index, &scene)?;
        log::info!("Upgraded page {} to {}", index, FileVersion::CURRENT);
        Ok(true)
    }

    /// Page uuid, read from the root element only.
    pub fn scene_uuid(&self, index: usize) -> PersistResult<Option<Uuid>> {
        read_scene_uuid(self.store.read_page(index)?)
    }

    /// Replace the page uuid, leaving the rest of the markup untouched.
    pub fn set_scene_uuid(&self, index: usize, uuid: Uuid) -> PersistResult<()> {
        let bytes = rewrite_scene_uuid(&self.store.read_page(index)?, uuid)?;
        self.store.write_page(index, &bytes)?;
        Ok(())
    }

    /// Replace every PDF page item of the document by an embedded PNG.
    /// Returns the number of converted items.
    pub fn convert_pdf_objects_to_images(&self, rasterizer: &dyn Rasterizer) -> PersistResult<usize> {
        self.convert_document(ConversionTarget::PdfPages, rasterizer)
    }

    /// Replace every vector image item of the document by an embedded PNG.
    pub fn convert_svg_images_to_images(&self, rasterizer: &dyn Rasterizer) -> PersistResult<usize> {
        self.convert_document(ConversionTarget::VectorImages, rasterizer)
    }

    fn convert_document(&self, target: ConversionTarget, rasterizer: &dyn Rasterizer) -> PersistResult<usize> {
        let mut total = 0;
        for index in 0..self.store.page_count() {
            let mut scene = self.load_scene(index)?;
            let converted = convert_scene(&mut scene, target, rasterizer);
            if converted > 0 {
                self.persist_scene(index, &scene)?;
                total += converted;
            }
        }
        log::info!("Converted {} {:?} item(s)", total, target);
        Ok(total)
    }
}
