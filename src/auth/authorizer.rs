use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use super::Principal;

/// The permission service could not answer, which is different from answering "no"
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Permission service unavailable: {0}")]
    Unavailable(String),

    #[error("Permission check failed: {0}")]
    Failed(String),
}

/// Decides whether a principal holds a named scope
#[async_trait]
pub trait PermissionEvaluator: Send + Sync {
    async fn has_permission(&self, principal: &Principal, scope: &str) -> Result<bool, AuthError>;
}

/// Grants a scope when the principal's token carries it as a role
#[derive(Debug, Clone, Default)]
pub struct RoleClaimsEvaluator;

#[async_trait]
impl PermissionEvaluator for RoleClaimsEvaluator {
    async fn has_permission(&self, principal: &Principal, scope: &str) -> Result<bool, AuthError> {
        Ok(principal
            .roles
            .iter()
            .any(|role| role.eq_ignore_ascii_case(scope)))
    }
}

/// Gate in front of every deletion
#[derive(Clone)]
pub struct Authorizer {
    evaluator: Arc<dyn PermissionEvaluator>,
}

impl Authorizer {
    pub fn new(evaluator: Arc<dyn PermissionEvaluator>) -> Self {
        Self { evaluator }
    }

    /// `<database>-delete` for a named database, `delete` otherwise
    pub fn scope_for(database: Option<&str>) -> String {
        match database {
            Some(name) => format!("{}-delete", name.to_lowercase()),
            None => "delete".to_string(),
        }
    }

    pub async fn is_authorized(
        &self,
        principal: &Principal,
        database: Option<&str>,
    ) -> Result<bool, AuthError> {
        let scope = Self::scope_for(database);
        let granted = self.evaluator.has_permission(principal, &scope).await?;
        if !granted {
            tracing::warn!("Principal '{}' lacks scope '{}'", principal.subject, scope);
        }
        Ok(granted)
    }
}

impl std::fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer").finish_non_exhaustive()
    }
}
