//! 用户组处理器
//! 成员与角色变更都会让相关用户的权限缓存失效

use crate::{error::AppError, middleware::AppState, models::rbac::*};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub async fn group_tree(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, AppError> {
    let tree = state.permission_service.get_group_tree().await?;
    Ok(Json(json!({ "tree": tree })))
}

pub async fn add_members(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<AddGroupMembersRequest>,
) -> Result<impl IntoResponse, AppError> {
    let count = req.user_ids.len();
    state
        .permission_service
        .add_group_members(group_id, req.user_ids)
        .await?;

    Ok(Json(json!({
        "message": "成员添加成功",
        "count": count
    })))
}

pub async fn remove_member(
    State(state): State<Arc<AppState>>,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .remove_group_member(group_id, user_id)
        .await?;
    Ok(Json(json!({ "message": "成员移除成功" })))
}

pub async fn set_roles(
    State(state): State<Arc<AppState>>,
    Path(group_id): Path<Uuid>,
    Json(req): Json<SetGroupRolesRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .permission_service
        .set_group_roles(group_id, req.role_ids)
        .await?;
    Ok(Json(json!({ "message": "分组角色更新成功" })))
}
