//! 权限管理处理器

use crate::{
    auth::AuthContext, error::AppError, middleware::AppState, models::rbac::*,
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

/// 当前用户的权限码
pub async fn my_permissions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let codes = state
        .permission_service
        .get_user_permission_codes(auth_context.user_id)
        .await?;

    Ok(Json(json!({
        "user_id": auth_context.user_id,
        "role": auth_context.role_code,
        "is_admin": auth_context.is_admin(),
        "permissions": codes
    })))
}

/// 指定用户的有效权限
pub async fn user_permissions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let service = &state.permission_service;
    let role_ids = service.get_user_role_ids(user_id).await?;
    let permissions = service.get_user_permissions(user_id).await?;

    Ok(Json(json!({
        "user_id": user_id,
        "role_ids": role_ids,
        "permissions": permissions
    })))
}

pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state.permission_service.list_permissions().await?;

    Ok(Json(json!({
        "permissions": permissions,
        "count": permissions.len()
    })))
}

pub async fn permission_tree(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let tree = state.permission_service.get_permission_tree().await?;
    Ok(Json(json!({ "tree": tree })))
}

pub async fn create_permission(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreatePermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let permission = state.permission_service.create_permission(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "权限创建成功",
            "permission": permission
        })),
    ))
}

pub async fn update_permission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdatePermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let permission = state.permission_service.update_permission(id, req).await?;

    Ok(Json(json!({
        "message": "权限更新成功",
        "permission": permission
    })))
}

pub async fn delete_permission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state.permission_service.delete_permission(id).await?;
    Ok(Json(json!({ "message": "权限删除成功" })))
}

pub async fn get_role_permissions(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state.permission_service.get_role_permissions(role_id).await?;

    Ok(Json(json!({
        "role_id": role_id,
        "permissions": permissions
    })))
}

/// 整体替换角色权限
pub async fn update_role_permissions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(role_id): Path<Uuid>,
    Json(req): Json<UpdateRolePermissionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .update_role_permissions(role_id, req.permission_ids)
        .await?;

    tracing::info!(
        operator = %auth_context.username,
        role_id = %role_id,
        "Role permissions updated"
    );

    Ok(Json(json!({ "message": "角色权限更新成功" })))
}

pub async fn list_resource_permissions(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ResourcePermissionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .permission_service
        .list_resource_permissions(filter)
        .await?;

    Ok(Json(json!({
        "resource_permissions": rows,
        "count": rows.len()
    })))
}

pub async fn create_resource_permission(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateResourcePermissionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let row = state
        .permission_service
        .create_resource_permission(req)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "资源权限创建成功",
            "resource_permission": row
        })),
    ))
}

pub async fn delete_resource_permission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .delete_resource_permission(id)
        .await?;
    Ok(Json(json!({ "message": "资源权限删除成功" })))
}
