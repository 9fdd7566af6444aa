use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::auth::{AuthError, PermissionEvaluator, Principal};
use crate::storage::{Database, NodeKey, ResourceManager, StorageEngine, StorageError, WriteTrx};

/// Ordered record of every storage call, shared by all handles of one engine
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: impl Into<String>) {
        self.0.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    /// Calls named exactly `name`, with or without arguments
    pub fn count(&self, name: &str) -> usize {
        let with_args = format!("{}(", name);
        self.0
            .lock()
            .iter()
            .filter(|call| call.as_str() == name || call.starts_with(&with_args))
            .count()
    }
}

#[derive(Debug, Clone, Default)]
struct Script {
    open_managers: usize,
    missing_nodes: HashSet<NodeKey>,
    failing_commit: bool,
}

/// Scripted storage engine that records the order of collaborator calls
#[derive(Debug, Clone, Default)]
pub struct RecordingStorage {
    log: CallLog,
    script: Script,
    removed: Arc<Mutex<HashSet<PathBuf>>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report this many live resource managers on every resource removal
    pub fn with_open_managers(mut self, open: usize) -> Self {
        self.script.open_managers = open;
        self
    }

    pub fn with_missing_node(mut self, node: NodeKey) -> Self {
        self.script.missing_nodes.insert(node);
        self
    }

    pub fn with_failing_commit(mut self) -> Self {
        self.script.failing_commit = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.calls()
    }

    pub fn count(&self, name: &str) -> usize {
        self.log.count(name)
    }
}

fn short_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl StorageEngine for RecordingStorage {
    fn open_database(&self, path: &Path) -> Result<Box<dyn Database>, StorageError> {
        let name = short_name(path);
        self.log.push(format!("open_database({})", name));
        Ok(Box::new(RecordingDatabase {
            name,
            log: self.log.clone(),
            script: self.script.clone(),
        }))
    }

    fn remove_database(&self, path: &Path) -> Result<(), StorageError> {
        self.log.push(format!("remove_database({})", short_name(path)));
        if !self.removed.lock().insert(path.to_path_buf()) {
            return Err(StorageError::DatabaseNotFound(path.to_path_buf()));
        }
        Ok(())
    }
}

struct RecordingDatabase {
    name: String,
    log: CallLog,
    script: Script,
}

impl Database for RecordingDatabase {
    fn remove_resource(&self, name: &str) -> Result<(), StorageError> {
        self.log.push(format!("remove_resource({})", name));
        if self.script.open_managers > 0 {
            return Err(StorageError::ResourceInUse {
                resource: name.to_string(),
                open: self.script.open_managers,
            });
        }
        Ok(())
    }

    fn resource_manager(&self, name: &str) -> Result<Box<dyn ResourceManager>, StorageError> {
        self.log.push(format!("resource_manager({})", name));
        Ok(Box::new(RecordingManager {
            name: name.to_string(),
            log: self.log.clone(),
            script: self.script.clone(),
        }))
    }
}

impl Drop for RecordingDatabase {
    fn drop(&mut self) {
        self.log.push(format!("release_database({})", self.name));
    }
}

struct RecordingManager {
    name: String,
    log: CallLog,
    script: Script,
}

impl ResourceManager for RecordingManager {
    fn begin_write_trx(&self) -> Result<Box<dyn WriteTrx + '_>, StorageError> {
        self.log.push("begin_write_trx");
        Ok(Box::new(RecordingTrx { manager: self }))
    }
}

impl Drop for RecordingManager {
    fn drop(&mut self) {
        self.log.push(format!("release_resource_manager({})", self.name));
    }
}

struct RecordingTrx<'a> {
    manager: &'a RecordingManager,
}

impl WriteTrx for RecordingTrx<'_> {
    fn move_to(&mut self, node: NodeKey) -> Result<bool, StorageError> {
        self.manager.log.push(format!("move_to({})", node));
        Ok(!self.manager.script.missing_nodes.contains(&node))
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        self.manager.log.push("remove");
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StorageError> {
        self.manager.log.push("commit");
        if self.manager.script.failing_commit {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        Ok(())
    }
}

/// Permission service that is always down
#[derive(Debug, Clone, Default)]
pub struct UnavailableEvaluator;

#[async_trait]
impl PermissionEvaluator for UnavailableEvaluator {
    async fn has_permission(&self, _: &Principal, _: &str) -> Result<bool, AuthError> {
        Err(AuthError::Unavailable("permission service unreachable".to_string()))
    }
}
