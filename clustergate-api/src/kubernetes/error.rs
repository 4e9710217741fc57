//! Gateway error types and kube-rs error mapping
//!
//! Every failure of a gateway operation is a `K8sError`; `kind()` places it in
//! the boundary taxonomy and `crate::error::ApiError` renders it.

use clustergate_common::{ClusterId, ErrorKind};
use thiserror::Error;

use super::types::ResourceReference;

/// Gateway errors
#[derive(Debug, Error)]
pub enum K8sError {
    /// Credential blob cannot be turned into connection parameters
    #[error("Invalid credential: {0}")]
    CredentialInvalid(String),

    /// Control plane unreachable or the call timed out
    #[error("Cluster unavailable: {0}")]
    Unavailable(String),

    /// Manifest is not a usable resource document
    #[error("Invalid manifest: {0}")]
    ManifestInvalid(String),

    /// Operation needs a resource name and none was resolvable
    #[error("Resource name required for {0}")]
    NameRequired(String),

    /// No credential registered under this identifier
    #[error("Cluster not found: {0}")]
    ClusterNotFound(ClusterId),

    /// Kubernetes resource not found
    #[error("Resource not found: {kind}/{name} in namespace {namespace}")]
    ResourceNotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Create collided with an existing object
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Optimistic-concurrency rejection
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Control plane refused the credential's identity
    #[error("Permission denied: {0}")]
    Forbidden(String),

    /// Control plane refused the document
    #[error("Rejected by control plane: {0}")]
    Rejected(String),

    /// Internal system error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl K8sError {
    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            K8sError::CredentialInvalid(_) => ErrorKind::CredentialInvalid,
            K8sError::Unavailable(_) => ErrorKind::Unavailable,
            K8sError::ManifestInvalid(_) => ErrorKind::ManifestInvalid,
            K8sError::NameRequired(_) => ErrorKind::NameRequired,
            K8sError::ClusterNotFound(_) | K8sError::ResourceNotFound { .. } => {
                ErrorKind::NotFound
            }
            K8sError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            K8sError::Conflict(_) => ErrorKind::Conflict,
            K8sError::Forbidden(_) => ErrorKind::Forbidden,
            K8sError::Rejected(_) => ErrorKind::Rejected,
            K8sError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub fn not_found(reference: &ResourceReference) -> Self {
        K8sError::ResourceNotFound {
            kind: reference.kind.clone(),
            name: reference.name.clone(),
            namespace: reference.namespace.clone(),
        }
    }

    /// Map a kube-rs error raised while operating on `reference`
    pub fn from_kube(err: kube::Error, reference: &ResourceReference) -> Self {
        match err {
            kube::Error::Api(resp) => match resp.code {
                404 => K8sError::not_found(reference),
                409 if resp.reason == "AlreadyExists" => {
                    K8sError::AlreadyExists(format!("{}: {}", reference, resp.message))
                }
                409 => K8sError::Conflict(format!("{}: {}", reference, resp.message)),
                _ => Self::from_status(resp.code, resp.message),
            },
            other => other.into(),
        }
    }

    fn from_status(code: u16, message: String) -> Self {
        match code {
            401 | 403 => K8sError::Forbidden(message),
            400 | 422 => K8sError::Rejected(message),
            404 => K8sError::Internal(format!("unexpected not found: {}", message)),
            409 => K8sError::Conflict(message),
            429 | 500..=599 => K8sError::Unavailable(message),
            _ => K8sError::Internal(format!("HTTP {}: {}", code, message)),
        }
    }
}

impl From<kube::Error> for K8sError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) => Self::from_status(resp.code, resp.message),
            kube::Error::Auth(e) => K8sError::CredentialInvalid(e.to_string()),
            kube::Error::InferConfig(e) => K8sError::CredentialInvalid(e.to_string()),
            kube::Error::SerdeError(e) => {
                K8sError::Internal(format!("Failed to decode control plane answer: {}", e))
            }
            kube::Error::BuildRequest(e) => {
                K8sError::Internal(format!("Failed to build request: {}", e))
            }
            other => K8sError::Unavailable(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for K8sError {
    fn from(err: sqlx::Error) -> Self {
        K8sError::Internal(format!("Credential store error: {}", err))
    }
}

/// Result type alias for gateway operations
pub type K8sResult<T> = std::result::Result<T, K8sError>;
