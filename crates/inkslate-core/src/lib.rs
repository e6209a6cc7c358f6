//! Inkslate Core Library
//!
//! Scene model and versioned page markup persistence for the Inkslate
//! whiteboard.

pub mod items;
pub mod persist;
pub mod scene;
pub mod storage;
pub mod version;

pub use items::{Item, ItemId, ItemKind};
pub use persist::{
    LoadIssue, PersistConfig, PersistError, PersistResult, ReaderState, SceneAdaptor, SceneReader, read_scene,
    write_scene,
};
pub use scene::{PageBackground, Scene};
pub use storage::{DocumentDirectory, MemoryDocument, PageStore, StorageError};
pub use version::FileVersion;
