//! RBAC 权限门
//!
//! 每个门按相同流程处理请求：
//! 1. 取认证上下文，缺失返回 401
//! 2. admin 角色直接放行（纯角色门除外，只比较角色编码）
//! 3. 交给权限服务判断
//! 4. 拒绝返回 403
//!
//! 路由上通过 `route_layer(from_fn_with_state(RbacGate::new(..), enforce))` 挂载。

use crate::{
    auth::AuthContext,
    config::UnmappedRoutePolicy,
    error::AppError,
    models::rbac::ROLE_ADMIN,
    services::PermissionService,
};
use axum::{
    extract::{FromRequestParts, MatchedPath, RawPathParams, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// 权限门
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// 需要指定权限码
    Permission(String),
    /// 任一权限码
    AnyPermission(Vec<String>),
    /// 全部权限码
    AllPermissions(Vec<String>),
    /// 资源级权限，资源 ID 取自路径参数 `id`
    Resource {
        resource_type: String,
        action: String,
    },
    /// 按路由模板查找所需权限
    Dynamic,
    /// 按 HTTP 方法推导 `<resource>:<action>`
    Write(String),
    /// 角色编码在列表中
    Role(Vec<String>),
    /// 角色匹配或拥有权限码
    PermissionOrRole { code: String, roles: Vec<String> },
}

impl Gate {
    pub fn permission(code: &str) -> Self {
        Gate::Permission(code.to_string())
    }

    pub fn any(codes: &[&str]) -> Self {
        Gate::AnyPermission(codes.iter().map(|c| c.to_string()).collect())
    }

    pub fn all(codes: &[&str]) -> Self {
        Gate::AllPermissions(codes.iter().map(|c| c.to_string()).collect())
    }

    pub fn resource(resource_type: &str, action: &str) -> Self {
        Gate::Resource {
            resource_type: resource_type.to_string(),
            action: action.to_string(),
        }
    }

    pub fn write(resource_type: &str) -> Self {
        Gate::Write(resource_type.to_string())
    }

    pub fn role(roles: &[&str]) -> Self {
        Gate::Role(roles.iter().map(|r| r.to_string()).collect())
    }

    pub fn permission_or_role(code: &str, roles: &[&str]) -> Self {
        Gate::PermissionOrRole {
            code: code.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    /// 指标标签
    fn kind(&self) -> &'static str {
        match self {
            Gate::Permission(_) => "permission",
            Gate::AnyPermission(_) => "any_permission",
            Gate::AllPermissions(_) => "all_permissions",
            Gate::Resource { .. } => "resource",
            Gate::Dynamic => "dynamic",
            Gate::Write(_) => "write",
            Gate::Role(_) => "role",
            Gate::PermissionOrRole { .. } => "permission_or_role",
        }
    }
}

/// HTTP 方法对应的动作
pub fn write_action(method: &Method) -> &'static str {
    match *method {
        Method::POST => "create",
        Method::PUT | Method::PATCH => "update",
        Method::DELETE => "delete",
        _ => "view",
    }
}

/// 被检查的请求
#[derive(Debug, Clone)]
pub struct RequestTarget {
    pub method: Method,
    /// 匹配到的路由模板，例如 `/api/v1/clusters/{id}`
    pub route: Option<String>,
    /// 路径参数 `id`
    pub resource_id: Option<Uuid>,
}

/// 核心判定
pub async fn authorize(
    service: &PermissionService,
    policy: UnmappedRoutePolicy,
    gate: &Gate,
    auth: Option<&AuthContext>,
    target: &RequestTarget,
) -> Result<(), AppError> {
    let auth = auth.ok_or(AppError::Unauthorized)?;

    // 纯角色门不走 admin 放行
    if auth.role_code == ROLE_ADMIN && !matches!(gate, Gate::Role(_)) {
        return Ok(());
    }

    let user_id = auth.user_id;
    let granted = match gate {
        Gate::Permission(code) => service.has_permission(user_id, code).await?,
        Gate::AnyPermission(codes) => service.has_any_permission(user_id, codes).await?,
        Gate::AllPermissions(codes) => service.has_all_permissions(user_id, codes).await?,
        Gate::Resource {
            resource_type,
            action,
        } => {
            service
                .has_resource_permission(user_id, resource_type, target.resource_id, action)
                .await?
        }
        Gate::Dynamic => {
            let required = match target.route.as_deref() {
                Some(route) => {
                    service
                        .get_required_permission(route, target.method.as_str())
                        .await?
                }
                None => None,
            };
            match required {
                Some(permission) => service.has_permission(user_id, &permission.code).await?,
                None => policy == UnmappedRoutePolicy::Allow,
            }
        }
        Gate::Write(resource_type) => {
            let code = format!("{}:{}", resource_type, write_action(&target.method));
            service.has_permission(user_id, &code).await?
        }
        Gate::PermissionOrRole { code, roles } => {
            roles.iter().any(|r| *r == auth.role_code)
                || service.has_permission(user_id, code).await?
        }
        Gate::Role(roles) => roles.iter().any(|r| *r == auth.role_code),
    };

    if granted {
        Ok(())
    } else {
        metrics::counter!("rbac_denied_total", "gate" => gate.kind()).increment(1);
        tracing::info!(
            user_id = %user_id,
            gate = gate.kind(),
            method = %target.method,
            route = target.route.as_deref().unwrap_or(""),
            "Permission denied"
        );
        Err(AppError::forbidden("insufficient permissions"))
    }
}

/// 中间件状态：一个路由组共享一个门
#[derive(Clone)]
pub struct RbacGate {
    service: Arc<PermissionService>,
    policy: UnmappedRoutePolicy,
    gate: Gate,
}

impl RbacGate {
    pub fn new(service: Arc<PermissionService>, policy: UnmappedRoutePolicy, gate: Gate) -> Self {
        Self {
            service,
            policy,
            gate,
        }
    }
}

/// 权限门中间件
pub async fn enforce(
    State(gate): State<RbacGate>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let route = parts
        .extensions
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string());
    let resource_id = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .ok()
        .and_then(|params| {
            params
                .iter()
                .find(|(key, _)| *key == "id")
                .and_then(|(_, value)| Uuid::parse_str(value).ok())
        });

    let target = RequestTarget {
        method: parts.method.clone(),
        route,
        resource_id,
    };

    authorize(
        &gate.service,
        gate.policy,
        &gate.gate,
        parts.extensions.get::<AuthContext>(),
        &target,
    )
    .await?;

    Ok(next.run(Request::from_parts(parts, body)).await)
}
