// handlers/protected/delete.rs - DELETE /, /:database, /:database/:resource[?nodeId=N]
use axum::{
    extract::{Extension, Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::app::AppState;
use crate::auth::Principal;
use crate::deletion::{DeleteError, DeleteRequest, Deleted};
use crate::error::ApiError;
use crate::middleware::ApiResponse;

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// Root of the subtree to remove. Values that are not integers are ignored.
    #[serde(rename = "nodeId")]
    pub node_id: Option<String>,
}

/// DELETE handler shared by all three routes.
///
/// Dropping a database answers 204; dropping a resource or subtree answers 200 with
/// a description of what was removed.
pub async fn delete(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    path: Option<Path<HashMap<String, String>>>,
    Query(query): Query<DeleteQuery>,
) -> Result<Response, ApiError> {
    let mut params = path.map(|Path(params)| params).unwrap_or_default();
    let request = DeleteRequest::from_params(
        params.remove("database"),
        params.remove("resource"),
        query.node_id.as_deref(),
    );

    match process(&state, &principal, request).await? {
        Deleted::Database { .. } => Ok(ApiResponse::no_content().into_response()),
        deleted => Ok(ApiResponse::success(deleted).into_response()),
    }
}

/// Authorize, validate, then hand off to the strategist. Nothing reaches storage
/// unless both of the first two steps pass.
pub async fn process(
    state: &AppState,
    principal: &Principal,
    request: DeleteRequest,
) -> Result<Deleted, DeleteError> {
    if !state
        .authorizer
        .is_authorized(principal, request.database.as_deref())
        .await?
    {
        return Err(DeleteError::Unauthorized);
    }

    let target = request.into_target()?;
    tracing::debug!("Principal '{}' deleting {:?}", principal.subject, target);

    state.strategist.delete(target).await
}

#[cfg(test)]
mod tests {
    use crate::app::{app, AppState};
    use crate::auth::{generate_jwt, Claims, RoleClaimsEvaluator};
    use crate::config::{AppConfig, Environment};
    use crate::deletion::{DATABASE_NAME_MISSING, OPEN_RESOURCE_MANAGERS};
    use crate::testing::{RecordingStorage, UnavailableEvaluator};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn config() -> AppConfig {
        let mut config = AppConfig::for_environment(Environment::Development);
        config.storage.location = "/srv/arbor".into();
        config.api.enable_request_logging = false;
        config
    }

    fn state(storage: &RecordingStorage) -> AppState {
        AppState::new(config(), Arc::new(storage.clone()), Arc::new(RoleClaimsEvaluator))
    }

    fn token(roles: &[&str]) -> String {
        let config = config();
        let claims = Claims::new(
            "alice".into(),
            roles.iter().map(|r| r.to_string()).collect(),
            1,
        );
        generate_jwt(&claims, &config.security.jwt_secret).unwrap()
    }

    async fn send(state: AppState, uri: &str, roles: &[&str]) -> (StatusCode, Value) {
        let request = Request::delete(uri)
            .header("authorization", format!("Bearer {}", token(roles)))
            .body(Body::empty())
            .unwrap();
        let response = app(state).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    #[tokio::test]
    async fn drop_database_answers_no_content() {
        let storage = RecordingStorage::new();
        let (status, body) = send(state(&storage), "/db1", &["db1-delete"]).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);
        assert_eq!(storage.calls(), vec!["remove_database(db1)"]);
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_handler() {
        let storage = RecordingStorage::new();
        let request = Request::delete("/db1").body(Body::empty()).unwrap();
        let response = app(state(&storage)).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn wrong_scope_is_unauthorized_without_storage_access() {
        let storage = RecordingStorage::new();
        let (status, _) = send(state(&storage), "/db1/r1?nodeId=42", &["db2-delete"]).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn scope_matches_lowercased_database() {
        let storage = RecordingStorage::new();
        let (status, _) = send(state(&storage), "/Sales", &["sales-delete"]).await;

        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn missing_database_requires_global_scope_first() {
        let storage = RecordingStorage::new();

        let (status, _) = send(state(&storage), "/", &["db1-delete"]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(state(&storage), "/", &["delete"]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], DATABASE_NAME_MISSING);
        assert!(storage.calls().is_empty());
    }

    #[tokio::test]
    async fn drop_resource_answers_ok() {
        let storage = RecordingStorage::new();
        let (status, body) = send(state(&storage), "/db1/r1", &["db1-delete"]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["deleted"], "resource");
        assert_eq!(body["data"]["resource"], "r1");
    }

    #[tokio::test]
    async fn open_managers_surface_as_conflict() {
        let storage = RecordingStorage::new().with_open_managers(1);
        let (status, body) = send(state(&storage), "/db1/r1", &["db1-delete"]).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["message"], OPEN_RESOURCE_MANAGERS);
        assert_eq!(storage.count("release_database"), 1);
    }

    #[tokio::test]
    async fn subtree_deletion_answers_ok() {
        let storage = RecordingStorage::new();
        let (status, body) = send(state(&storage), "/db1/r1?nodeId=42", &["db1-delete"]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], "subtree");
        assert_eq!(body["data"]["nodeId"], 42);
        assert_eq!(storage.count("commit"), 1);
    }

    #[tokio::test]
    async fn non_numeric_node_id_drops_resource() {
        let storage = RecordingStorage::new();
        let (status, body) = send(state(&storage), "/db1/r1?nodeId=abc", &["db1-delete"]).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["deleted"], "resource");
        assert_eq!(storage.count("remove_resource"), 1);
        assert_eq!(storage.count("begin_write_trx"), 0);
    }

    #[tokio::test]
    async fn negative_node_id_is_not_found_and_resource_kept() {
        let storage = RecordingStorage::new();
        let (status, _) = send(state(&storage), "/db1/r1?nodeId=-1", &["db1-delete"]).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(storage.count("remove_resource"), 0);
        assert_eq!(storage.count("commit"), 0);
    }

    #[tokio::test]
    async fn second_database_drop_is_a_server_error() {
        let storage = RecordingStorage::new();
        let (first, _) = send(state(&storage), "/db1", &["db1-delete"]).await;
        let (second, body) = send(state(&storage), "/db1", &["db1-delete"]).await;

        assert_eq!(first, StatusCode::NO_CONTENT);
        assert_eq!(second, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn permission_service_failure_is_not_unauthorized() {
        let storage = RecordingStorage::new();
        let state = AppState::new(
            config(),
            Arc::new(storage.clone()),
            Arc::new(UnavailableEvaluator),
        );
        let (status, _) = send(state, "/db1", &["db1-delete"]).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(storage.calls().is_empty());
    }
}
