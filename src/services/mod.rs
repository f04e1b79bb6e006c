//! 业务服务层

pub mod cluster_service;
pub mod permission_cache;
pub mod permission_service;

pub use cluster_service::ClusterService;
pub use permission_cache::PermissionCache;
pub use permission_service::PermissionService;
