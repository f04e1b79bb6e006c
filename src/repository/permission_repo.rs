//! 权限数据访问
//! 角色/权限/用户组/资源权限的读取与维护

use crate::{error::AppError, models::rbac::*};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// 关联写入引用的实体
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Permission,
    User,
    Role,
}

impl EntityRef {
    fn table(&self) -> &'static str {
        match self {
            EntityRef::Permission => "permissions",
            EntityRef::User => "users",
            EntityRef::Role => "roles",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EntityRef::Permission => "permission",
            EntityRef::User => "user",
            EntityRef::Role => "role",
        }
    }
}

/// 权限存储
///
/// 权限服务只依赖这个 trait，测试中使用内存实现。
#[async_trait]
pub trait PermissionStore: Send + Sync {
    // ==================== 解析 ====================

    /// 用户的直接角色
    async fn user_role_id(&self, user_id: Uuid) -> Result<Option<Uuid>, AppError>;

    /// 用户所在分组被授予的角色
    async fn group_role_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    /// 角色关联的权限（含禁用项）
    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError>;

    /// 多个角色在某资源类型上的资源权限
    async fn resource_permissions_for_roles(
        &self,
        role_ids: &[Uuid],
        resource_type: &str,
    ) -> Result<Vec<ResourcePermission>, AppError>;

    /// 映射到指定路由模板的权限
    async fn permissions_by_path(&self, path: &str) -> Result<Vec<Permission>, AppError>;

    // ==================== 维护 ====================

    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, AppError>;

    /// 给定 ID 中不存在的部分
    async fn missing_ids(&self, entity: EntityRef, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError>;

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError>;

    async fn create_permission(
        &self,
        req: &CreatePermissionRequest,
    ) -> Result<Permission, AppError>;

    async fn update_permission(
        &self,
        id: Uuid,
        req: &UpdatePermissionRequest,
    ) -> Result<Option<Permission>, AppError>;

    async fn delete_permission(&self, id: Uuid) -> Result<bool, AppError>;

    /// 整体替换角色权限
    async fn set_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), AppError>;

    async fn list_resource_permissions(
        &self,
        filter: &ResourcePermissionFilter,
    ) -> Result<Vec<ResourcePermission>, AppError>;

    async fn create_resource_permission(
        &self,
        req: &CreateResourcePermissionRequest,
    ) -> Result<ResourcePermission, AppError>;

    async fn delete_resource_permission(&self, id: Uuid) -> Result<bool, AppError>;

    async fn list_groups(&self) -> Result<Vec<UserGroup>, AppError>;

    async fn find_group(&self, group_id: Uuid) -> Result<Option<UserGroup>, AppError>;

    /// 添加成员，已存在的忽略
    async fn add_group_members(&self, group_id: Uuid, user_ids: &[Uuid]) -> Result<(), AppError>;

    async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, AppError>;

    /// 整体替换分组角色
    async fn set_group_roles(&self, group_id: Uuid, role_ids: &[Uuid]) -> Result<(), AppError>;
}

/// PostgreSQL 实现
pub struct PgPermissionStore {
    db: PgPool,
}

impl PgPermissionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// 唯一约束与外键冲突转为 BadRequest
fn map_constraint_violation(e: sqlx::Error, what: &str) -> AppError {
    if let Some(db_err) = e.as_database_error() {
        match db_err.code().as_deref() {
            Some("23505") => return AppError::BadRequest(format!("{} already exists", what)),
            Some("23503") => {
                return AppError::BadRequest(format!("{} references a missing record", what))
            }
            _ => {}
        }
    }
    AppError::Database(e)
}

#[async_trait]
impl PermissionStore for PgPermissionStore {
    async fn user_role_id(&self, user_id: Uuid) -> Result<Option<Uuid>, AppError> {
        let role_id =
            sqlx::query_scalar::<_, Option<Uuid>>("SELECT role_id FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;

        Ok(role_id.flatten())
    }

    async fn group_role_ids(&self, user_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let role_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT DISTINCT ugr.role_id
            FROM user_group_roles ugr
            INNER JOIN user_group_members ugm ON ugm.user_group_id = ugr.user_group_id
            WHERE ugm.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(role_ids)
    }

    async fn role_permissions(&self, role_id: Uuid) -> Result<Vec<Permission>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.*
            FROM permissions p
            INNER JOIN role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.sort, p.code
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    async fn resource_permissions_for_roles(
        &self,
        role_ids: &[Uuid],
        resource_type: &str,
    ) -> Result<Vec<ResourcePermission>, AppError> {
        if role_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, ResourcePermission>(
            r#"
            SELECT * FROM resource_permissions
            WHERE role_id = ANY($1) AND resource_type = $2
            "#,
        )
        .bind(role_ids)
        .bind(resource_type)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn permissions_by_path(&self, path: &str) -> Result<Vec<Permission>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT * FROM permissions WHERE path = $1 AND status = 1 ORDER BY sort",
        )
        .bind(path)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    async fn find_role(&self, role_id: Uuid) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(role)
    }

    async fn missing_ids(&self, entity: EntityRef, ids: &[Uuid]) -> Result<Vec<Uuid>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("SELECT id FROM {} WHERE id = ANY($1)", entity.table());
        let existing: Vec<Uuid> = sqlx::query_scalar(&query)
            .bind(ids)
            .fetch_all(&self.db)
            .await?;

        Ok(ids
            .iter()
            .filter(|id| !existing.contains(id))
            .copied()
            .collect())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        let permissions =
            sqlx::query_as::<_, Permission>("SELECT * FROM permissions ORDER BY sort, code")
                .fetch_all(&self.db)
                .await?;

        Ok(permissions)
    }

    async fn create_permission(
        &self,
        req: &CreatePermissionRequest,
    ) -> Result<Permission, AppError> {
        sqlx::query_as::<_, Permission>(
            r#"
            INSERT INTO permissions (name, code, type, resource, action, parent_id, path, method, sort)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(&req.code)
        .bind(&req.perm_type)
        .bind(&req.resource)
        .bind(&req.action)
        .bind(req.parent_id)
        .bind(&req.path)
        .bind(&req.method)
        .bind(req.sort)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_constraint_violation(e, "Permission code"))
    }

    async fn update_permission(
        &self,
        id: Uuid,
        req: &UpdatePermissionRequest,
    ) -> Result<Option<Permission>, AppError> {
        let permission = sqlx::query_as::<_, Permission>(
            r#"
            UPDATE permissions
            SET
                name = COALESCE($2, name),
                resource = COALESCE($3, resource),
                action = COALESCE($4, action),
                parent_id = COALESCE($5, parent_id),
                path = COALESCE($6, path),
                method = COALESCE($7, method),
                sort = COALESCE($8, sort),
                status = COALESCE($9, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.name)
        .bind(&req.resource)
        .bind(&req.action)
        .bind(req.parent_id)
        .bind(&req.path)
        .bind(&req.method)
        .bind(req.sort)
        .bind(req.status)
        .fetch_optional(&self.db)
        .await?;

        Ok(permission)
    }

    async fn delete_permission(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_role_permissions(
        &self,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        if !permission_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                SELECT $1, id FROM permissions WHERE id = ANY($2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(role_id)
            .bind(permission_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint_violation(e, "Role permission"))?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_resource_permissions(
        &self,
        filter: &ResourcePermissionFilter,
    ) -> Result<Vec<ResourcePermission>, AppError> {
        let rows = sqlx::query_as::<_, ResourcePermission>(
            r#"
            SELECT * FROM resource_permissions
            WHERE ($1::uuid IS NULL OR role_id = $1)
              AND ($2::varchar IS NULL OR resource_type = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.role_id)
        .bind(&filter.resource_type)
        .fetch_all(&self.db)
        .await?;

        Ok(rows)
    }

    async fn create_resource_permission(
        &self,
        req: &CreateResourcePermissionRequest,
    ) -> Result<ResourcePermission, AppError> {
        let actions = serde_json::to_string(&req.actions)
            .map_err(|e| AppError::Internal(format!("Failed to encode actions: {}", e)))?;

        let row = sqlx::query_as::<_, ResourcePermission>(
            r#"
            INSERT INTO resource_permissions (role_id, resource_type, resource_id, actions, conditions)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(req.role_id)
        .bind(&req.resource_type)
        .bind(req.resource_id)
        .bind(actions)
        .bind(&req.conditions)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_constraint_violation(e, "Resource permission"))?;

        Ok(row)
    }

    async fn delete_resource_permission(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM resource_permissions WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_groups(&self) -> Result<Vec<UserGroup>, AppError> {
        let groups = sqlx::query_as::<_, UserGroup>("SELECT * FROM user_groups ORDER BY name")
            .fetch_all(&self.db)
            .await?;

        Ok(groups)
    }

    async fn find_group(&self, group_id: Uuid) -> Result<Option<UserGroup>, AppError> {
        let group = sqlx::query_as::<_, UserGroup>("SELECT * FROM user_groups WHERE id = $1")
            .bind(group_id)
            .fetch_optional(&self.db)
            .await?;

        Ok(group)
    }

    async fn add_group_members(&self, group_id: Uuid, user_ids: &[Uuid]) -> Result<(), AppError> {
        if user_ids.is_empty() {
            return Ok(());
        }

        sqlx::query(
            r#"
            INSERT INTO user_group_members (user_group_id, user_id)
            SELECT $1, id FROM users WHERE id = ANY($2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(group_id)
        .bind(user_ids)
        .execute(&self.db)
        .await
        .map_err(|e| map_constraint_violation(e, "Group member"))?;

        Ok(())
    }

    async fn remove_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result =
            sqlx::query("DELETE FROM user_group_members WHERE user_group_id = $1 AND user_id = $2")
                .bind(group_id)
                .bind(user_id)
                .execute(&self.db)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_group_roles(&self, group_id: Uuid, role_ids: &[Uuid]) -> Result<(), AppError> {
        let mut tx = self.db.begin().await?;

        sqlx::query("DELETE FROM user_group_roles WHERE user_group_id = $1")
            .bind(group_id)
            .execute(&mut *tx)
            .await?;

        if !role_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO user_group_roles (user_group_id, role_id)
                SELECT $1, id FROM roles WHERE id = ANY($2)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(group_id)
            .bind(role_ids)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_constraint_violation(e, "Group role"))?;
        }

        tx.commit().await?;
        Ok(())
    }
}
