//! 数据访问层

pub mod cluster_repo;
pub mod permission_repo;
pub mod yaml_history_repo;

pub use cluster_repo::{ClusterStore, PgClusterStore};
pub use permission_repo::{EntityRef, PermissionStore, PgPermissionStore};
pub use yaml_history_repo::{PgYamlHistoryStore, YamlHistoryStore};
