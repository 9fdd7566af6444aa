use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{DeleteError, DeleteTarget, Deleted, OPEN_RESOURCE_MANAGERS};
use crate::dispatch::Dispatcher;
use crate::storage::{NodeKey, StorageEngine, StorageError};

/// Drives one of the three deletion kinds to completion.
///
/// Each call makes exactly one hand-off to the dispatcher, and every storage handle
/// opened for the call is created and dropped inside that hand-off.
pub struct DeletionStrategist {
    location: PathBuf,
    engine: Arc<dyn StorageEngine>,
    dispatcher: Dispatcher,
}

impl DeletionStrategist {
    pub fn new(location: PathBuf, engine: Arc<dyn StorageEngine>, dispatcher: Dispatcher) -> Self {
        Self {
            location,
            engine,
            dispatcher,
        }
    }

    pub async fn delete(&self, target: DeleteTarget) -> Result<Deleted, DeleteError> {
        let path = self.location.join(target.database());

        match target {
            DeleteTarget::Database { database } => {
                info!("Dropping database '{}'", database);
                self.drop_database(path).await?;
                Ok(Deleted::Database { database })
            }
            DeleteTarget::Resource { database, resource } => {
                info!("Dropping resource '{}' from '{}'", resource, database);
                self.drop_resource(path, resource.clone()).await?;
                Ok(Deleted::Resource { database, resource })
            }
            DeleteTarget::Subtree {
                database,
                resource,
                node,
            } => {
                info!("Dropping subtree {} of '{}' in '{}'", node, resource, database);
                self.drop_subtree(path, resource.clone(), node).await?;
                Ok(Deleted::Subtree {
                    database,
                    resource,
                    node,
                })
            }
        }
    }

    async fn drop_database(&self, path: PathBuf) -> Result<(), DeleteError> {
        let engine = Arc::clone(&self.engine);
        self.dispatcher
            .run_blocking(move || engine.remove_database(&path))
            .await??;
        Ok(())
    }

    async fn drop_resource(&self, path: PathBuf, resource: String) -> Result<(), DeleteError> {
        let engine = Arc::clone(&self.engine);
        let result = self
            .dispatcher
            .run_blocking(move || {
                let database = engine.open_database(&path)?;
                database.remove_resource(&resource)
            })
            .await?;

        match result {
            Ok(()) => Ok(()),
            Err(StorageError::ResourceInUse { resource, open }) => {
                warn!(
                    "Refusing to drop resource '{}': {} open resource manager(s)",
                    resource, open
                );
                Err(DeleteError::StorageConflict(OPEN_RESOURCE_MANAGERS.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn drop_subtree(
        &self,
        path: PathBuf,
        resource: String,
        node: i64,
    ) -> Result<(), DeleteError> {
        let engine = Arc::clone(&self.engine);
        let key = NodeKey::try_from(node).ok();
        let found = self
            .dispatcher
            .run_blocking(move || -> Result<bool, StorageError> {
                let database = engine.open_database(&path)?;
                let manager = database.resource_manager(&resource)?;
                let mut trx = manager.begin_write_trx()?;

                // Negative ids name no node
                let Some(key) = key else {
                    return Ok(false);
                };
                if !trx.move_to(key)? {
                    return Ok(false);
                }
                trx.remove()?;
                trx.commit()?;
                Ok(true)
            })
            .await??;

        if found {
            Ok(())
        } else {
            Err(DeleteError::NotFound(format!("Node {} not found.", node)))
        }
    }
}
