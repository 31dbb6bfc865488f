// ============================================================================
// Identity Service Client
// ============================================================================
//
// Contract: ValidateToken(token) -> {valid, userId, email} | error.
//
// `BackendIdentityClient` reaches the identity service through the shared
// connection registry with the typed `auth.AuthService/ValidateToken`
// operation.
//
// ============================================================================

use crate::gateway::{BackendCall, ConnectionRegistry, ForwardingMetadata};
use crate::proxy::catalog::{ValidateToken, ValidateTokenRequest, ValidateTokenResponse};
use crate::proxy::operations::Operation;
use async_trait::async_trait;
use bytes::Bytes;
use hub_error::BackendCode;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    pub valid: bool,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("token rejected: {0}")]
    Rejected(String),

    #[error("identity service unavailable: {0}")]
    Unavailable(String),

    #[error("unexpected identity service response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait IdentityClient: Send + Sync {
    async fn validate_token(&self, token: &str) -> Result<IdentityClaims, IdentityError>;
}

pub struct BackendIdentityClient {
    registry: Arc<ConnectionRegistry>,
    service: String,
}

impl BackendIdentityClient {
    pub fn new(registry: Arc<ConnectionRegistry>, service: impl Into<String>) -> Self {
        Self {
            registry,
            service: service.into(),
        }
    }
}

#[async_trait]
impl IdentityClient for BackendIdentityClient {
    async fn validate_token(&self, token: &str) -> Result<IdentityClaims, IdentityError> {
        let connection = self
            .registry
            .get_connection(&self.service)
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;

        let payload = serde_json::to_vec(&ValidateTokenRequest {
            token: token.to_string(),
        })
        .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        let call = BackendCall {
            operation: ValidateToken::id(),
            payload: Bytes::from(payload),
            metadata: ForwardingMetadata::new(),
        };

        let body = connection.invoke(call).await.map_err(|failure| match failure.code {
            BackendCode::Unauthenticated
            | BackendCode::PermissionDenied
            | BackendCode::InvalidArgument
            | BackendCode::NotFound => IdentityError::Rejected(failure.message),
            _ => IdentityError::Unavailable(failure.to_string()),
        })?;

        let response: ValidateTokenResponse = serde_json::from_slice(&body)
            .map_err(|e| IdentityError::InvalidResponse(e.to_string()))?;

        if let Some(api_response) = &response.api_response {
            if !api_response.success {
                return Err(IdentityError::Rejected(api_response.message.clone()));
            }
        }

        let user_info = response
            .user_info
            .ok_or_else(|| IdentityError::InvalidResponse("missing userInfo".to_string()))?;

        Ok(IdentityClaims {
            valid: true,
            user_id: user_info.user_id,
            email: user_info.email,
        })
    }
}
