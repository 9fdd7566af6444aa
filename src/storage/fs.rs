use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::tree::{NodeKey, TreeDocument, DOCUMENT_ROOT};
use super::{Database, ResourceManager, StorageEngine, StorageError, WriteTrx};

const DATABASE_MARKER: &str = "database.json";
const RESOURCES_DIR: &str = "resources";
const REVISION_PREFIX: &str = "rev-";
const REVISION_SUFFIX: &str = ".json";

/// Open resource managers and active writers, keyed by resource directory
#[derive(Debug, Default)]
struct Registry {
    open_managers: HashMap<PathBuf, usize>,
    writers: HashSet<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatabaseMarker {
    created_at: DateTime<Utc>,
}

/// Directory-per-database storage engine. Each resource keeps every committed
/// revision as its own JSON file; readers and writers start from the newest one.
#[derive(Debug, Clone, Default)]
pub struct FsStorage {
    registry: Arc<Mutex<Registry>>,
}

impl FsStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty database at `path`
    pub fn create_database(&self, path: &Path) -> Result<FsDatabase, StorageError> {
        let marker = path.join(DATABASE_MARKER);
        if marker.exists() {
            return Err(StorageError::DatabaseExists(path.to_path_buf()));
        }

        fs::create_dir_all(path.join(RESOURCES_DIR))?;
        write_json_atomically(
            &marker,
            &DatabaseMarker {
                created_at: Utc::now(),
            },
        )?;

        info!("Created database {}", path.display());
        self.open(path)
    }

    /// Open the database at `path` as its concrete handle type
    pub fn open(&self, path: &Path) -> Result<FsDatabase, StorageError> {
        if !path.join(DATABASE_MARKER).is_file() {
            return Err(StorageError::DatabaseNotFound(path.to_path_buf()));
        }
        debug!("Opened database {}", path.display());
        Ok(FsDatabase {
            path: path.to_path_buf(),
            registry: Arc::clone(&self.registry),
        })
    }

    /// Number of resource managers currently open against a resource
    pub fn open_managers(&self, database: &Path, resource: &str) -> usize {
        let key = resource_dir(database, resource);
        self.registry.lock().open_managers.get(&key).copied().unwrap_or(0)
    }
}

impl StorageEngine for FsStorage {
    fn open_database(&self, path: &Path) -> Result<Box<dyn Database>, StorageError> {
        Ok(Box::new(self.open(path)?))
    }

    fn remove_database(&self, path: &Path) -> Result<(), StorageError> {
        if !path.join(DATABASE_MARKER).is_file() {
            return Err(StorageError::DatabaseNotFound(path.to_path_buf()));
        }

        fs::remove_dir_all(path)?;

        let mut registry = self.registry.lock();
        registry.open_managers.retain(|key, _| !key.starts_with(path));
        registry.writers.retain(|key| !key.starts_with(path));

        info!("Removed database {}", path.display());
        Ok(())
    }
}

/// Handle to one database directory
#[derive(Debug)]
pub struct FsDatabase {
    path: PathBuf,
    registry: Arc<Mutex<Registry>>,
}

impl FsDatabase {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create a resource whose first revision is `document`
    pub fn create_resource(&self, name: &str, document: &TreeDocument) -> Result<(), StorageError> {
        let dir = self.existing_or_new_resource_dir(name)?;
        if dir.exists() {
            return Err(StorageError::ResourceExists(name.to_string()));
        }

        fs::create_dir_all(&dir)?;
        write_json_atomically(&revision_file(&dir, 0), document)?;

        info!("Created resource '{}' in {}", name, self.path.display());
        Ok(())
    }

    /// Load the newest committed revision of a resource
    pub fn read_resource(&self, name: &str) -> Result<TreeDocument, StorageError> {
        let dir = self.resource_dir_checked(name)?;
        let (_, document) = load_latest_revision(&dir)?;
        Ok(document)
    }

    /// Number of committed revisions of a resource
    pub fn revision_count(&self, name: &str) -> Result<u64, StorageError> {
        let dir = self.resource_dir_checked(name)?;
        Ok(latest_revision(&dir)? + 1)
    }

    fn existing_or_new_resource_dir(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_valid_resource_name(name) {
            return Err(StorageError::ResourceNotFound {
                database: self.path.clone(),
                resource: name.to_string(),
            });
        }
        Ok(resource_dir(&self.path, name))
    }

    fn resource_dir_checked(&self, name: &str) -> Result<PathBuf, StorageError> {
        let dir = self.existing_or_new_resource_dir(name)?;
        if !dir.is_dir() {
            return Err(StorageError::ResourceNotFound {
                database: self.path.clone(),
                resource: name.to_string(),
            });
        }
        Ok(dir)
    }
}

impl Database for FsDatabase {
    fn remove_resource(&self, name: &str) -> Result<(), StorageError> {
        // Held from the existence check through the removal
        let registry = self.registry.lock();
        let dir = self.resource_dir_checked(name)?;
        if let Some(&open) = registry.open_managers.get(&dir) {
            if open > 0 {
                return Err(StorageError::ResourceInUse {
                    resource: name.to_string(),
                    open,
                });
            }
        }
        fs::remove_dir_all(&dir)?;
        drop(registry);

        info!("Removed resource '{}' from {}", name, self.path.display());
        Ok(())
    }

    fn resource_manager(&self, name: &str) -> Result<Box<dyn ResourceManager>, StorageError> {
        // Same guard as remove_resource, so a manager never registers against a
        // directory that is being removed
        let mut registry = self.registry.lock();
        let dir = self.resource_dir_checked(name)?;
        *registry.open_managers.entry(dir.clone()).or_insert(0) += 1;
        drop(registry);

        Ok(Box::new(FsResourceManager {
            name: name.to_string(),
            dir,
            registry: Arc::clone(&self.registry),
        }))
    }
}

impl Drop for FsDatabase {
    fn drop(&mut self) {
        debug!("Closed database {}", self.path.display());
    }
}

/// Open handle into one resource; deregisters itself on drop
#[derive(Debug)]
pub struct FsResourceManager {
    name: String,
    dir: PathBuf,
    registry: Arc<Mutex<Registry>>,
}

impl ResourceManager for FsResourceManager {
    fn begin_write_trx(&self) -> Result<Box<dyn WriteTrx + '_>, StorageError> {
        if !self.registry.lock().writers.insert(self.dir.clone()) {
            return Err(StorageError::WriterActive(self.name.clone()));
        }

        match load_latest_revision(&self.dir) {
            Ok((revision, document)) => Ok(Box::new(FsWriteTrx {
                manager: self,
                document,
                revision,
                cursor: DOCUMENT_ROOT,
            })),
            Err(e) => {
                self.registry.lock().writers.remove(&self.dir);
                Err(e)
            }
        }
    }
}

impl Drop for FsResourceManager {
    fn drop(&mut self) {
        let mut registry = self.registry.lock();
        if let Some(open) = registry.open_managers.get_mut(&self.dir) {
            *open = open.saturating_sub(1);
            if *open == 0 {
                registry.open_managers.remove(&self.dir);
            }
        }
        debug!("Closed resource manager for '{}'", self.name);
    }
}

struct FsWriteTrx<'a> {
    manager: &'a FsResourceManager,
    document: TreeDocument,
    revision: u64,
    cursor: NodeKey,
}

impl WriteTrx for FsWriteTrx<'_> {
    fn move_to(&mut self, node: NodeKey) -> Result<bool, StorageError> {
        if self.document.contains(node) {
            self.cursor = node;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        let parent = self.document.parent_of(self.cursor);
        let removed = self.document.remove_subtree(self.cursor)?;
        debug!(
            "Removed {} node(s) at {} from '{}'",
            removed, self.cursor, self.manager.name
        );
        self.cursor = parent.unwrap_or(DOCUMENT_ROOT);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        let next = self.revision + 1;
        write_json_atomically(&revision_file(&self.manager.dir, next), &self.document)?;
        self.revision = next;
        info!("Committed revision {} of '{}'", next, self.manager.name);
        Ok(())
    }
}

impl Drop for FsWriteTrx<'_> {
    fn drop(&mut self) {
        self.manager.registry.lock().writers.remove(&self.manager.dir);
    }
}

fn resource_dir(database: &Path, resource: &str) -> PathBuf {
    database.join(RESOURCES_DIR).join(resource)
}

fn revision_file(dir: &Path, revision: u64) -> PathBuf {
    dir.join(format!("{}{}{}", REVISION_PREFIX, revision, REVISION_SUFFIX))
}

fn is_valid_resource_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

fn latest_revision(dir: &Path) -> Result<u64, StorageError> {
    let mut latest = None;
    for entry in fs::read_dir(dir)? {
        let file_name = entry?.file_name();
        let revision = file_name
            .to_str()
            .and_then(|name| name.strip_prefix(REVISION_PREFIX))
            .and_then(|rest| rest.strip_suffix(REVISION_SUFFIX))
            .and_then(|number| number.parse::<u64>().ok());
        if let Some(revision) = revision {
            latest = latest.max(Some(revision));
        }
    }

    latest.ok_or_else(|| {
        StorageError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no revisions in {}", dir.display()),
        ))
    })
}

fn load_latest_revision(dir: &Path) -> Result<(u64, TreeDocument), StorageError> {
    let revision = latest_revision(dir)?;
    let reader = BufReader::new(File::open(revision_file(dir, revision))?);
    Ok((revision, serde_json::from_reader(reader)?))
}

fn write_json_atomically<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}
