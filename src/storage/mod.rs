pub mod fs;
pub mod tree;

pub use fs::{FsDatabase, FsStorage};
pub use tree::{Node, NodeKey, TreeDocument, DOCUMENT_ROOT};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by a storage engine
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database not found: {0}")]
    DatabaseNotFound(PathBuf),

    #[error("Database already exists: {0}")]
    DatabaseExists(PathBuf),

    #[error("Resource '{resource}' not found in database {database}")]
    ResourceNotFound { database: PathBuf, resource: String },

    #[error("Resource '{0}' already exists")]
    ResourceExists(String),

    #[error("Resource '{resource}' still has {open} open resource manager(s)")]
    ResourceInUse { resource: String, open: usize },

    #[error("Resource '{0}' already has an active write transaction")]
    WriterActive(String),

    #[error("Node {0} not found")]
    NodeNotFound(NodeKey),

    #[error("The document root cannot be removed")]
    CannotRemoveDocumentRoot,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Entry point of a storage engine. Every call may block on disk I/O, so callers
/// run them through the [`crate::dispatch::Dispatcher`].
pub trait StorageEngine: Send + Sync + 'static {
    /// Open the database at `path`. The handle is released when dropped.
    fn open_database(&self, path: &Path) -> Result<Box<dyn Database>, StorageError>;

    /// Remove the database at `path` together with every resource it holds.
    fn remove_database(&self, path: &Path) -> Result<(), StorageError>;
}

/// An open database handle
pub trait Database: Send {
    /// Remove a resource. Fails with [`StorageError::ResourceInUse`] while resource
    /// managers are still open against it.
    fn remove_resource(&self, name: &str) -> Result<(), StorageError>;

    /// Open a resource manager. The manager stays registered as open until dropped.
    fn resource_manager(&self, name: &str) -> Result<Box<dyn ResourceManager>, StorageError>;
}

/// A live handle into one resource
pub trait ResourceManager: Send {
    /// Begin a write transaction on the most recent revision.
    fn begin_write_trx(&self) -> Result<Box<dyn WriteTrx + '_>, StorageError>;
}

/// A mutable, committable unit of work against a resource's current revision.
/// Dropping it without calling [`WriteTrx::commit`] discards its changes.
pub trait WriteTrx {
    /// Move the cursor to `node`. Returns `false` and leaves the cursor where it was
    /// when the node does not exist.
    fn move_to(&mut self, node: NodeKey) -> Result<bool, StorageError>;

    /// Remove the node under the cursor and its subtree; the cursor moves to the parent.
    fn remove(&mut self) -> Result<(), StorageError>;

    /// Persist the changes as a new revision.
    fn commit(&mut self) -> Result<(), StorageError>;
}
