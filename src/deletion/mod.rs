pub mod strategist;

pub use strategist::DeletionStrategist;

use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::dispatch::DispatchError;
use crate::storage::StorageError;

pub const DATABASE_NAME_MISSING: &str = "Database name not given.";
pub const INVALID_DATABASE_NAME: &str = "Invalid database name.";
pub const OPEN_RESOURCE_MANAGERS: &str = "Open resource managers found.";

/// Identifying parameters of one delete call, as parsed from the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    pub database: Option<String>,
    pub resource: Option<String>,
    pub node_id: Option<i64>,
}

impl DeleteRequest {
    /// A `node_id` that is not an integer counts as absent. Surrounding whitespace
    /// makes it non-numeric.
    pub fn from_params(
        database: Option<String>,
        resource: Option<String>,
        node_id: Option<&str>,
    ) -> Self {
        Self {
            database,
            resource,
            node_id: node_id.and_then(|raw| raw.parse::<i64>().ok()),
        }
    }

    /// Validate and pick the deletion kind
    pub fn into_target(self) -> Result<DeleteTarget, DeleteError> {
        let database = self
            .database
            .ok_or_else(|| DeleteError::BadRequest(DATABASE_NAME_MISSING.to_string()))?;
        if !is_valid_database_name(&database) {
            return Err(DeleteError::BadRequest(INVALID_DATABASE_NAME.to_string()));
        }

        Ok(match (self.resource, self.node_id) {
            (None, _) => DeleteTarget::Database { database },
            (Some(resource), None) => DeleteTarget::Resource { database, resource },
            (Some(resource), Some(node)) => DeleteTarget::Subtree {
                database,
                resource,
                node,
            },
        })
    }
}

/// What a validated request will remove
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteTarget {
    Database { database: String },
    Resource { database: String, resource: String },
    Subtree { database: String, resource: String, node: i64 },
}

impl DeleteTarget {
    pub fn database(&self) -> &str {
        match self {
            DeleteTarget::Database { database }
            | DeleteTarget::Resource { database, .. }
            | DeleteTarget::Subtree { database, .. } => database,
        }
    }
}

/// Successful deletion, serialized into the response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "deleted", rename_all = "lowercase")]
pub enum Deleted {
    Database {
        database: String,
    },
    Resource {
        database: String,
        resource: String,
    },
    Subtree {
        database: String,
        resource: String,
        #[serde(rename = "nodeId")]
        node: i64,
    },
}

#[derive(Debug, Error)]
pub enum DeleteError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    StorageConflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Authorization(#[from] AuthError),
}

/// Database names become a single directory under the store location
fn is_valid_database_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', '\0'])
}
