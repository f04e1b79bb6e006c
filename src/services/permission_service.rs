//! 权限解析服务
//! 合并角色权限与分组权限，负责缓存填充与失效

use crate::{
    error::AppError,
    models::rbac::*,
    repository::{EntityRef, PermissionStore},
    services::permission_cache::PermissionCache,
    tree::{self, TreeItem},
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct PermissionService {
    store: Arc<dyn PermissionStore>,
    cache: Arc<PermissionCache>,
}

impl PermissionService {
    pub fn new(store: Arc<dyn PermissionStore>, cache: Arc<PermissionCache>) -> Self {
        Self { store, cache }
    }

    pub fn cache(&self) -> &PermissionCache {
        &self.cache
    }

    // ==================== 解析 ====================

    /// 用户有效权限：直接角色权限 ∪ 分组角色权限，按 ID 去重，先出现者保留
    pub async fn get_user_permissions(&self, user_id: Uuid) -> Result<Vec<Permission>, AppError> {
        let role_ids = self.get_user_role_ids(user_id).await?;

        let mut seen = HashSet::new();
        let mut permissions = Vec::new();
        for role_id in role_ids {
            for permission in self.store.role_permissions(role_id).await? {
                if permission.is_enabled() && seen.insert(permission.id) {
                    permissions.push(permission);
                }
            }
        }

        Ok(permissions)
    }

    /// 用户有效权限码
    pub async fn get_user_permission_codes(&self, user_id: Uuid) -> Result<Vec<String>, AppError> {
        let permissions = self.get_user_permissions(user_id).await?;
        Ok(permissions.into_iter().map(|p| p.code).collect())
    }

    /// 用户角色：直接角色在前，其后是分组角色，去重
    pub async fn get_user_role_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let mut role_ids = Vec::new();
        if let Some(role_id) = self.store.user_role_id(user_id).await? {
            role_ids.push(role_id);
        }
        for role_id in self.store.group_role_ids(user_id).await? {
            if !role_ids.contains(&role_id) {
                role_ids.push(role_id);
            }
        }
        Ok(role_ids)
    }

    /// 检查单个权限码，缓存未命中时重新解析并填充
    pub async fn has_permission(&self, user_id: Uuid, code: &str) -> Result<bool, AppError> {
        if let Some(granted) = self.cache.get(user_id, code) {
            return Ok(granted);
        }

        let codes: HashMap<String, bool> = self
            .get_user_permission_codes(user_id)
            .await?
            .into_iter()
            .map(|c| (c, true))
            .collect();
        let granted = codes.contains_key(code);
        self.cache.set(user_id, codes);

        tracing::debug!(user_id = %user_id, code = code, granted = granted, "Permission resolved");
        Ok(granted)
    }

    /// 任一权限满足即可；空列表为 false
    pub async fn has_any_permission(
        &self,
        user_id: Uuid,
        codes: &[String],
    ) -> Result<bool, AppError> {
        for code in codes {
            if self.has_permission(user_id, code).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// 全部权限满足；空列表为 true
    pub async fn has_all_permissions(
        &self,
        user_id: Uuid,
        codes: &[String],
    ) -> Result<bool, AppError> {
        for code in codes {
            if !self.has_permission(user_id, code).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// 资源级权限检查
    ///
    /// 不带 resource_id 的行对该类型所有实例生效；带 resource_id 的行只对同一实例生效。
    pub async fn has_resource_permission(
        &self,
        user_id: Uuid,
        resource_type: &str,
        resource_id: Option<Uuid>,
        action: &str,
    ) -> Result<bool, AppError> {
        let role_ids = self.get_user_role_ids(user_id).await?;
        if role_ids.is_empty() {
            return Ok(false);
        }

        let rows = self
            .store
            .resource_permissions_for_roles(&role_ids, resource_type)
            .await?;

        Ok(rows.iter().any(|row| row.grants(resource_id, action)))
    }

    /// 路由模板对应的权限；未配置返回 None
    pub async fn get_required_permission(
        &self,
        path: &str,
        method: &str,
    ) -> Result<Option<Permission>, AppError> {
        let candidates = self.store.permissions_by_path(path).await?;
        Ok(candidates
            .into_iter()
            .find(|p| p.matches_route(path, method)))
    }

    pub fn invalidate_user_cache(&self, user_id: Uuid) {
        self.cache.invalidate(user_id);
    }

    pub fn invalidate_all_cache(&self) {
        self.cache.invalidate_all();
    }

    // ==================== 权限维护 ====================

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        self.store.list_permissions().await
    }

    pub async fn get_permission_tree(&self) -> Result<Vec<TreeItem<Permission>>, AppError> {
        let permissions = self.store.list_permissions().await?;
        Ok(tree::permission_tree(permissions))
    }

    pub async fn create_permission(
        &self,
        req: CreatePermissionRequest,
    ) -> Result<Permission, AppError> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let permission = self.store.create_permission(&req).await?;
        tracing::info!(code = %permission.code, "Permission created");
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        id: Uuid,
        req: UpdatePermissionRequest,
    ) -> Result<Permission, AppError> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;

        let permission = self
            .store
            .update_permission(id, &req)
            .await?
            .ok_or_else(|| AppError::not_found("Permission not found"))?;

        self.invalidate_all_cache();
        tracing::info!(code = %permission.code, "Permission updated");
        Ok(permission)
    }

    pub async fn delete_permission(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_permission(id).await? {
            return Err(AppError::not_found("Permission not found"));
        }

        self.invalidate_all_cache();
        tracing::info!(permission_id = %id, "Permission deleted");
        Ok(())
    }

    pub async fn get_role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError> {
        self.require_role(role_id).await?;
        self.store.role_permissions(role_id).await
    }

    /// 整体替换角色权限
    pub async fn update_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: Vec<Uuid>,
    ) -> Result<(), AppError> {
        self.require_role(role_id).await?;

        let mut unique = Vec::with_capacity(permission_ids.len());
        for id in permission_ids {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }

        self.ensure_exist(EntityRef::Permission, &unique).await?;

        self.store.set_role_permissions(role_id, &unique).await?;
        self.invalidate_all_cache();
        tracing::info!(role_id = %role_id, count = unique.len(), "Role permissions replaced");
        Ok(())
    }

    /// 关联写入前拒绝未知 ID，避免整体替换只完成一半
    async fn ensure_exist(&self, entity: EntityRef, ids: &[Uuid]) -> Result<(), AppError> {
        let missing = self.store.missing_ids(entity, ids).await?;
        if missing.is_empty() {
            return Ok(());
        }

        let missing: Vec<String> = missing.iter().map(Uuid::to_string).collect();
        Err(AppError::BadRequest(format!(
            "Unknown {} ids: {}",
            entity.label(),
            missing.join(", ")
        )))
    }

    async fn require_role(&self, role_id: Uuid) -> Result<Role, AppError> {
        self.store
            .find_role(role_id)
            .await?
            .ok_or_else(|| AppError::not_found("Role not found"))
    }

    // ==================== 资源权限 ====================

    pub async fn list_resource_permissions(
        &self,
        filter: ResourcePermissionFilter,
    ) -> Result<Vec<ResourcePermission>, AppError> {
        self.store.list_resource_permissions(&filter).await
    }

    pub async fn create_resource_permission(
        &self,
        req: CreateResourcePermissionRequest,
    ) -> Result<ResourcePermission, AppError> {
        req.validate()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        if req.actions.iter().any(|a| a.trim().is_empty()) {
            return Err(AppError::validation("actions must not contain empty entries"));
        }
        self.require_role(req.role_id).await?;

        let row = self.store.create_resource_permission(&req).await?;
        tracing::info!(
            role_id = %row.role_id,
            resource_type = %row.resource_type,
            "Resource permission created"
        );
        Ok(row)
    }

    pub async fn delete_resource_permission(&self, id: Uuid) -> Result<(), AppError> {
        if !self.store.delete_resource_permission(id).await? {
            return Err(AppError::not_found("Resource permission not found"));
        }
        Ok(())
    }

    // ==================== 用户组 ====================

    pub async fn get_group_tree(&self) -> Result<Vec<TreeItem<UserGroup>>, AppError> {
        let groups = self.store.list_groups().await?;
        Ok(tree::group_tree(groups))
    }

    /// 添加分组成员，逐个失效新成员的缓存
    pub async fn add_group_members(
        &self,
        group_id: Uuid,
        user_ids: Vec<Uuid>,
    ) -> Result<(), AppError> {
        self.require_group(group_id).await?;
        self.ensure_exist(EntityRef::User, &user_ids).await?;

        self.store.add_group_members(group_id, &user_ids).await?;
        for user_id in &user_ids {
            self.invalidate_user_cache(*user_id);
        }
        tracing::info!(group_id = %group_id, count = user_ids.len(), "Group members added");
        Ok(())
    }

    pub async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
        if !self.store.remove_group_member(group_id, user_id).await? {
            return Err(AppError::not_found("Group member not found"));
        }

        self.invalidate_user_cache(user_id);
        tracing::info!(group_id = %group_id, user_id = %user_id, "Group member removed");
        Ok(())
    }

    /// 整体替换分组角色
    pub async fn set_group_roles(&self, group_id: Uuid, role_ids: Vec<Uuid>) -> Result<(), AppError> {
        self.require_group(group_id).await?;
        self.ensure_exist(EntityRef::Role, &role_ids).await?;

        self.store.set_group_roles(group_id, &role_ids).await?;
        self.invalidate_all_cache();
        tracing::info!(group_id = %group_id, count = role_ids.len(), "Group roles replaced");
        Ok(())
    }

    async fn require_group(&self, group_id: Uuid) -> Result<UserGroup, AppError> {
        self.store
            .find_group(group_id)
            .await?
            .ok_or_else(|| AppError::not_found("User group not found"))
    }
}
