//! Common types shared between clustergate-api and its clients
//!
//! Everything here is plain wire data: identifiers, the error taxonomy,
//! the response envelope and the request bodies of the boundary API.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned to a registered cluster by the credential store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterId(pub i64);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ClusterId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Error taxonomy surfaced by every boundary operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    CredentialInvalid,
    Unavailable,
    ManifestInvalid,
    NameRequired,
    NotFound,
    AlreadyExists,
    Conflict,
    Forbidden,
    Rejected,
    BadRequest,
    Internal,
}

impl ErrorKind {
    /// Stable code used in error envelopes
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CredentialInvalid => "CREDENTIAL_INVALID",
            Self::Unavailable => "UNAVAILABLE",
            Self::ManifestInvalid => "MANIFEST_INVALID",
            Self::NameRequired => "NAME_REQUIRED",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::Conflict => "CONFLICT",
            Self::Forbidden => "FORBIDDEN",
            Self::Rejected => "REJECTED",
            Self::BadRequest => "BAD_REQUEST",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the transport boundary answers with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::CredentialInvalid => 422,
            Self::Unavailable => 503,
            Self::ManifestInvalid => 400,
            Self::NameRequired => 400,
            Self::NotFound => 404,
            Self::AlreadyExists => 409,
            Self::Conflict => 409,
            Self::Forbidden => 403,
            Self::Rejected => 422,
            Self::BadRequest => 400,
            Self::Internal => 500,
        }
    }

    /// Whether a caller may retry the same call unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable | Self::Conflict)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome marker carried in every envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// Uniform response envelope: `{"msg": "success" | "failure", "data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub msg: Outcome,
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            msg: Outcome::Success,
            data,
        }
    }

    pub fn failure(data: T) -> Self {
        Self {
            msg: Outcome::Failure,
            data,
        }
    }

    pub fn is_success(&self) -> bool {
        self.msg == Outcome::Success
    }
}

/// Body of `AddCluster`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddClusterRequest {
    /// Serialized cluster-access configuration (kubeconfig document)
    pub config: String,
}

/// Answer to `AddCluster`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddClusterResponse {
    pub id: ClusterId,
}

/// Registered cluster as listed by `ListClusters`; never carries the credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub id: ClusterId,
    /// Unix timestamp of registration
    pub created_at: i64,
}

/// Body of `CreateResource`, `UpdateResource` and `UpdateResourceAt`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestRequest {
    /// One resource as YAML or JSON text
    pub manifest: String,
}

/// Query string of `GetResource` and `DeleteResource`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceQueryParams {
    /// Required for kinds the gateway has no built-in knowledge of
    pub api_version: Option<String>,
}
