//! 路由注册
//! 每组路由挂一个权限门，整体外层是 JWT 认证与请求追踪

use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer};

use crate::{
    handlers,
    middleware::AppState,
    rbac::{self, Gate, RbacGate},
};

/// YAML 请求体上限
const MAX_BODY_BYTES: usize = 4 * 1024 * 1024;

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    let policy = state.config.rbac.unmapped_route_policy;
    let permission_service = state.permission_service.clone();
    let guard = move |gate: Gate| {
        from_fn_with_state(
            RbacGate::new(permission_service.clone(), policy, gate),
            rbac::enforce,
        )
    };

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // ===== 权限 =====
    let self_routes = Router::new().route(
        "/api/v1/auth/permissions",
        get(handlers::permission::my_permissions),
    );

    let permission_read_routes = Router::new()
        .route("/api/v1/permissions", get(handlers::permission::list_permissions))
        .route("/api/v1/permissions/tree", get(handlers::permission::permission_tree))
        .route_layer(guard(Gate::permission("role:view")));

    let permission_write_routes = Router::new()
        .route("/api/v1/permissions", post(handlers::permission::create_permission))
        .route(
            "/api/v1/permissions/{id}",
            put(handlers::permission::update_permission)
                .delete(handlers::permission::delete_permission),
        )
        .route(
            "/api/v1/roles/{id}/permissions",
            get(handlers::permission::get_role_permissions)
                .put(handlers::permission::update_role_permissions),
        )
        .route(
            "/api/v1/resource-permissions",
            get(handlers::permission::list_resource_permissions)
                .post(handlers::permission::create_resource_permission),
        )
        .route(
            "/api/v1/resource-permissions/{id}",
            axum::routing::delete(handlers::permission::delete_resource_permission),
        )
        .route_layer(guard(Gate::write("role")));

    let user_routes = Router::new()
        .route(
            "/api/v1/users/{id}/permissions",
            get(handlers::permission::user_permissions),
        )
        .route_layer(guard(Gate::permission("user:view")));

    // ===== 用户组 =====
    let group_read_routes = Router::new()
        .route("/api/v1/groups/tree", get(handlers::group::group_tree))
        .route_layer(guard(Gate::permission("group:view")));

    let group_write_routes = Router::new()
        .route("/api/v1/groups/{id}/members", post(handlers::group::add_members))
        .route(
            "/api/v1/groups/{id}/members/{user_id}",
            axum::routing::delete(handlers::group::remove_member),
        )
        .route("/api/v1/groups/{id}/roles", put(handlers::group::set_roles))
        .route_layer(guard(Gate::write("group")));

    // ===== 集群 =====
    let cluster_write_routes = Router::new()
        .route(
            "/api/v1/clusters",
            get(handlers::cluster::list_clusters).post(handlers::cluster::create_cluster),
        )
        .route(
            "/api/v1/clusters/{id}",
            put(handlers::cluster::update_cluster).delete(handlers::cluster::delete_cluster),
        )
        .route_layer(guard(Gate::write("cluster")));

    let cluster_detail_routes = Router::new()
        .route("/api/v1/clusters/{id}", get(handlers::cluster::get_cluster))
        .route_layer(guard(Gate::resource("cluster", "view")));

    let cluster_test_routes = Router::new()
        .route("/api/v1/clusters/{id}/test", post(handlers::cluster::test_connection))
        .route_layer(guard(Gate::permission("cluster:update")));

    let cluster_view_routes = Router::new()
        .route("/api/v1/clusters/{id}/yaml", get(handlers::cluster::get_resource_yaml))
        .route("/api/v1/clusters/{id}/format", post(handlers::cluster::format_yaml))
        .route("/api/v1/clusters/{id}/overview", get(handlers::cluster::get_overview))
        .route("/api/v1/clusters/{id}/nodes", get(handlers::cluster::list_nodes))
        .route("/api/v1/clusters/{id}/namespaces", get(handlers::cluster::list_namespaces))
        .route("/api/v1/clusters/{id}/deployments", get(handlers::cluster::list_deployments))
        .route("/api/v1/clusters/{id}/pods", get(handlers::cluster::list_pods))
        .route("/api/v1/clusters/{id}/services", get(handlers::cluster::list_services))
        .route_layer(guard(Gate::permission("cluster:view")));

    // 所需权限由 permissions.path 映射决定
    let cluster_history_routes = Router::new()
        .route(
            "/api/v1/clusters/{id}/history",
            get(handlers::cluster::list_yaml_history),
        )
        .route_layer(guard(Gate::Dynamic));

    let cluster_apply_routes = Router::new()
        .route("/api/v1/clusters/{id}/apply", post(handlers::cluster::apply_yaml))
        .route_layer(guard(Gate::any(&["k8s:apply-yaml", "cluster:update"])));

    let authenticated_routes = Router::new()
        .merge(self_routes)
        .merge(permission_read_routes)
        .merge(permission_write_routes)
        .merge(user_routes)
        .merge(group_read_routes)
        .merge(group_write_routes)
        .merge(cluster_write_routes)
        .merge(cluster_detail_routes)
        .merge(cluster_test_routes)
        .merge(cluster_view_routes)
        .merge(cluster_history_routes)
        .merge(cluster_apply_routes)
        .layer(from_fn_with_state(
            state.jwt_service.clone(),
            crate::auth::jwt_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(authenticated_routes)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(from_fn(crate::middleware::request_tracking_middleware))
        .with_state(state)
}
