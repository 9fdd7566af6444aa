use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{delete, get},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{Authorizer, PermissionEvaluator};
use crate::config::{AppConfig, SecurityConfig};
use crate::deletion::DeletionStrategist;
use crate::dispatch::Dispatcher;
use crate::handlers;
use crate::middleware::jwt_auth_middleware;
use crate::storage::StorageEngine;

/// Shared state for every request; built once at startup from explicit configuration
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub authorizer: Authorizer,
    pub strategist: Arc<DeletionStrategist>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        engine: Arc<dyn StorageEngine>,
        evaluator: Arc<dyn PermissionEvaluator>,
    ) -> Self {
        let dispatcher = Dispatcher::new(config.storage.blocking_timeout());
        let strategist =
            DeletionStrategist::new(config.storage.location.clone(), engine, dispatcher);

        Self {
            config: Arc::new(config),
            authorizer: Authorizer::new(evaluator),
            strategist: Arc::new(strategist),
        }
    }
}

pub fn app(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let mut router = Router::new()
        // Public
        .route("/health", get(handlers::health))
        // Protected
        .merge(delete_routes(state.clone()));

    // Global middleware
    if config.security.enable_cors {
        router = router.layer(cors_layer(&config.security));
    }
    if config.api.enable_request_logging {
        router = router.layer(TraceLayer::new_for_http());
    }

    router.with_state(state)
}

fn delete_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Without a database name the handler answers 401 or 400
        .route("/", delete(handlers::delete))
        .route("/:database", delete(handlers::delete))
        .route("/:database/:resource", delete(handlers::delete))
        .route_layer(middleware::from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}
