#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tempfile::TempDir;

use arbor_api::auth::{generate_jwt, Claims, RoleClaimsEvaluator};
use arbor_api::config::{AppConfig, Environment};
use arbor_api::storage::{FsDatabase, FsStorage, NodeKey, TreeDocument, DOCUMENT_ROOT};
use arbor_api::{app, AppState};

const SECRET: &str = "integration-secret";

/// In-process server over a throwaway store directory
pub struct TestServer {
    pub base_url: String,
    pub storage: FsStorage,
    pub location: PathBuf,
    client: reqwest::Client,
    _dir: TempDir,
}

/// Keys of the nodes created by [`TestServer::seed_resource`]
pub struct SeededTree {
    pub object: NodeKey,
    pub field: NodeKey,
    pub value: NodeKey,
}

impl TestServer {
    pub async fn spawn() -> Result<Self> {
        let dir = tempfile::tempdir().context("failed to create store directory")?;

        let mut config = AppConfig::for_environment(Environment::Development);
        config.storage.location = dir.path().to_path_buf();
        config.api.enable_request_logging = false;
        config.security.jwt_secret = SECRET.to_string();

        let storage = FsStorage::new();
        let state = AppState::new(config, Arc::new(storage.clone()), Arc::new(RoleClaimsEvaluator));

        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;

        tokio::spawn(async move {
            let _ = axum::serve(listener, app(state)).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            storage,
            location: dir.path().to_path_buf(),
            client: reqwest::Client::new(),
            _dir: dir,
        })
    }

    pub fn token(&self, roles: &[&str]) -> String {
        let claims = Claims::new(
            "integration".to_string(),
            roles.iter().map(|r| r.to_string()).collect(),
            1,
        );
        generate_jwt(&claims, SECRET).expect("token")
    }

    pub fn database_path(&self, name: &str) -> PathBuf {
        self.location.join(name)
    }

    pub fn seed_database(&self, name: &str) -> Result<FsDatabase> {
        Ok(self.storage.create_database(&self.database_path(name))?)
    }

    /// Create `resource` holding root → object → field → value
    pub fn seed_resource(&self, database: &FsDatabase, resource: &str) -> Result<SeededTree> {
        let mut doc = TreeDocument::new();
        let object = doc.insert_child(DOCUMENT_ROOT, json!({"type": "object"}))?;
        let field = doc.insert_child(object, json!("name"))?;
        let value = doc.insert_child(field, json!("alice"))?;
        database.create_resource(resource, &doc)?;
        Ok(SeededTree { object, field, value })
    }

    pub async fn delete(&self, path: &str, roles: &[&str]) -> Result<reqwest::Response> {
        Ok(self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(self.token(roles))
            .send()
            .await?)
    }

    pub async fn delete_anonymous(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .delete(format!("{}{}", self.base_url, path))
            .send()
            .await?)
    }

    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?)
    }
}
