//! HTTP routes
//!
//! Thin axum layer over `KubernetesGateway`: decode the request, call one
//! gateway operation, wrap the answer in the response envelope.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use clustergate_common::{Envelope, ErrorKind};
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::error::ErrorResponse;
use crate::state::AppState;

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handlers::health))
        .route("/api/health/ready", get(health_handlers::ready))
        .route(
            "/api/clusters",
            get(cluster_handlers::list_clusters).post(cluster_handlers::add_cluster),
        )
        .route(
            "/api/clusters/:id/resources",
            post(resource_handlers::create_resource).put(resource_handlers::update_resource),
        )
        .route(
            "/api/clusters/:id/resources/:namespace/:kind/:name",
            put(resource_handlers::update_resource_at)
                .get(resource_handlers::get_resource)
                .delete(resource_handlers::delete_resource),
        )
        .route("/api/clusters/:id/pods/:namespace", get(pod_handlers::list_pods))
        .route(
            "/api/clusters/:id/pods/:namespace/:name",
            get(pod_handlers::get_pod),
        )
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Answer a panicking handler with the failure envelope instead of dropping
/// the connection
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(details = %details, "Request handler panicked");

    let kind = ErrorKind::Internal;
    let body = Envelope::failure(ErrorResponse::new(
        kind.status_code(),
        kind.as_str(),
        "An internal server error occurred",
    ));

    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

mod health_handlers {
    use super::*;
    use crate::error::ApiError;
    use axum::extract::State;
    use serde_json::{json, Value};

    pub async fn health() -> Json<Envelope<Value>> {
        Json(Envelope::success(json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
        })))
    }

    pub async fn ready(
        State(state): State<Arc<AppState>>,
    ) -> Result<Json<Envelope<Value>>, ApiError> {
        if state.database.ping().await {
            Ok(Json(Envelope::success(json!({"status": "ready"}))))
        } else {
            Err(ApiError::ServiceUnavailable(
                "Credential store is not reachable".to_string(),
            ))
        }
    }
}

mod cluster_handlers {
    use super::*;
    use crate::error::ApiError;
    use axum::extract::rejection::JsonRejection;
    use axum::extract::State;
    use clustergate_common::{AddClusterRequest, AddClusterResponse, ClusterSummary};

    pub async fn add_cluster(
        State(state): State<Arc<AppState>>,
        payload: Result<Json<AddClusterRequest>, JsonRejection>,
    ) -> Result<(StatusCode, Json<Envelope<AddClusterResponse>>), ApiError> {
        let Json(request) = payload?;
        let id = state.gateway.add_cluster(&request.config).await?;
        Ok((
            StatusCode::CREATED,
            Json(Envelope::success(AddClusterResponse { id })),
        ))
    }

    pub async fn list_clusters(
        State(state): State<Arc<AppState>>,
    ) -> Result<Json<Envelope<Vec<ClusterSummary>>>, ApiError> {
        let clusters = state.gateway.list_clusters().await?;
        Ok(Json(Envelope::success(clusters)))
    }
}

mod resource_handlers {
    use super::*;
    use crate::error::ApiError;
    use crate::kubernetes::types::ResourceDocument;
    use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
    use axum::extract::{Path, Query, State};
    use clustergate_common::{ClusterId, ManifestRequest, ResourceQueryParams};

    type ResourcePath = (ClusterId, String, String, String);

    pub async fn create_resource(
        State(state): State<Arc<AppState>>,
        id: Result<Path<ClusterId>, PathRejection>,
        payload: Result<Json<ManifestRequest>, JsonRejection>,
    ) -> Result<(StatusCode, Json<Envelope<ResourceDocument>>), ApiError> {
        let Path(id) = id?;
        let Json(request) = payload?;
        let created = state.gateway.create_resource(id, &request.manifest).await?;
        Ok((StatusCode::CREATED, Json(Envelope::success(created))))
    }

    pub async fn update_resource(
        State(state): State<Arc<AppState>>,
        id: Result<Path<ClusterId>, PathRejection>,
        payload: Result<Json<ManifestRequest>, JsonRejection>,
    ) -> Result<Json<Envelope<ResourceDocument>>, ApiError> {
        let Path(id) = id?;
        let Json(request) = payload?;
        let updated = state.gateway.update_resource(id, &request.manifest).await?;
        Ok(Json(Envelope::success(updated)))
    }

    pub async fn update_resource_at(
        State(state): State<Arc<AppState>>,
        path: Result<Path<ResourcePath>, PathRejection>,
        payload: Result<Json<ManifestRequest>, JsonRejection>,
    ) -> Result<Json<Envelope<ResourceDocument>>, ApiError> {
        let Path((id, namespace, kind, name)) = path?;
        let Json(request) = payload?;
        let updated = state
            .gateway
            .update_resource_at(id, &namespace, &kind, &name, &request.manifest)
            .await?;
        Ok(Json(Envelope::success(updated)))
    }

    pub async fn get_resource(
        State(state): State<Arc<AppState>>,
        path: Result<Path<ResourcePath>, PathRejection>,
        query: Result<Query<ResourceQueryParams>, QueryRejection>,
    ) -> Result<Json<Envelope<ResourceDocument>>, ApiError> {
        let Path((id, namespace, kind, name)) = path?;
        let Query(params) = query?;
        let object = state
            .gateway
            .get_resource(id, &namespace, &kind, &name, params.api_version.as_deref())
            .await?;
        Ok(Json(Envelope::success(object)))
    }

    pub async fn delete_resource(
        State(state): State<Arc<AppState>>,
        path: Result<Path<ResourcePath>, PathRejection>,
        query: Result<Query<ResourceQueryParams>, QueryRejection>,
    ) -> Result<Json<Envelope<ResourceDocument>>, ApiError> {
        let Path((id, namespace, kind, name)) = path?;
        let Query(params) = query?;
        let answer = state
            .gateway
            .delete_resource(id, &namespace, &kind, &name, params.api_version.as_deref())
            .await?;
        Ok(Json(Envelope::success(answer)))
    }
}

mod pod_handlers {
    use super::*;
    use crate::error::ApiError;
    use crate::kubernetes::types::PodSelection;
    use axum::extract::rejection::PathRejection;
    use axum::extract::{Path, State};
    use clustergate_common::ClusterId;

    pub async fn list_pods(
        State(state): State<Arc<AppState>>,
        path: Result<Path<(ClusterId, String)>, PathRejection>,
    ) -> Result<Json<Envelope<PodSelection>>, ApiError> {
        let Path((id, namespace)) = path?;
        let pods = state.gateway.list_pods(id, &namespace, None).await?;
        Ok(Json(Envelope::success(pods)))
    }

    pub async fn get_pod(
        State(state): State<Arc<AppState>>,
        path: Result<Path<(ClusterId, String, String)>, PathRejection>,
    ) -> Result<Json<Envelope<PodSelection>>, ApiError> {
        let Path((id, namespace, name)) = path?;
        let pod = state
            .gateway
            .list_pods(id, &namespace, Some(&name))
            .await?;
        Ok(Json(Envelope::success(pod)))
    }
}
