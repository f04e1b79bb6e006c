//! 集群与 YAML 处理器

use crate::{
    auth::AuthContext,
    error::AppError,
    middleware::AppState,
    models::k8s::*,
    services::cluster_service::Actor,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub async fn list_clusters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClusterListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = query.page;
    let page_size = query.page_size;
    let (clusters, total) = state.cluster_service.list_clusters(query).await?;

    Ok(Json(json!({
        "clusters": clusters,
        "total": total,
        "page": page,
        "page_size": page_size
    })))
}

pub async fn create_cluster(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateClusterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let cluster = state
        .cluster_service
        .create_cluster(req, auth_context.user_id)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "集群创建成功",
            "cluster": cluster
        })),
    ))
}

pub async fn get_cluster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let cluster = state.cluster_service.get_cluster(id).await?;
    Ok(Json(json!({ "cluster": cluster })))
}

pub async fn update_cluster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateClusterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let cluster = state.cluster_service.update_cluster(id, req).await?;

    Ok(Json(json!({
        "message": "集群更新成功",
        "cluster": cluster
    })))
}

pub async fn delete_cluster(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.cluster_service.delete_cluster(id).await?;
    Ok(Json(json!({ "message": "集群删除成功" })))
}

pub async fn test_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let overview = state.cluster_service.test_connection(id).await?;
    Ok(Json(json!({ "overview": overview })))
}

pub async fn get_resource_yaml(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<ResourceYamlQuery>,
) -> Result<impl IntoResponse, AppError> {
    let yaml = state.cluster_service.get_resource_yaml(id, query).await?;
    Ok(Json(json!({ "yaml": yaml })))
}

pub async fn list_yaml_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<YamlHistoryQuery>,
) -> Result<impl IntoResponse, AppError> {
    let history = state.cluster_service.list_yaml_history(id, query).await?;

    Ok(Json(json!({
        "history": history,
        "count": history.len()
    })))
}

pub async fn apply_yaml(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<ApplyYamlRequest>,
) -> Result<impl IntoResponse, AppError> {
    let actor = Actor {
        user_id: auth_context.user_id,
        username: auth_context.username,
    };
    let dry_run = req.dry_run;
    let results = state.cluster_service.apply_yaml(id, req, &actor).await?;

    Ok(Json(json!({
        "dry_run": dry_run,
        "results": results
    })))
}

pub async fn format_yaml(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FormatYamlRequest>,
) -> Result<impl IntoResponse, AppError> {
    let yaml = state.cluster_service.format_yaml(&req.yaml)?;
    Ok(Json(json!({ "yaml": yaml })))
}

// ===== 集群浏览 =====

pub async fn get_overview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let overview = state.cluster_service.get_overview(id).await?;
    Ok(Json(json!({ "overview": overview })))
}

pub async fn list_nodes(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let nodes = state.cluster_service.list_nodes(id).await?;
    Ok(Json(json!({ "nodes": nodes })))
}

pub async fn list_namespaces(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let namespaces = state.cluster_service.list_namespaces(id).await?;
    Ok(Json(json!({ "namespaces": namespaces })))
}

async fn list_workloads(
    state: &AppState,
    id: Uuid,
    kind: WorkloadKind,
    query: NamespaceQuery,
) -> Result<Json<serde_json::Value>, AppError> {
    let items = state
        .cluster_service
        .list_workloads(id, kind, query.namespace)
        .await?;

    Ok(Json(json!({
        "items": items,
        "count": items.len()
    })))
}

pub async fn list_deployments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<NamespaceQuery>,
) -> Result<impl IntoResponse, AppError> {
    list_workloads(&state, id, WorkloadKind::Deployment, query).await
}

pub async fn list_pods(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<NamespaceQuery>,
) -> Result<impl IntoResponse, AppError> {
    list_workloads(&state, id, WorkloadKind::Pod, query).await
}

pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<NamespaceQuery>,
) -> Result<impl IntoResponse, AppError> {
    list_workloads(&state, id, WorkloadKind::Service, query).await
}
