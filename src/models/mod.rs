//! 数据模型模块
//! 权限体系（角色、权限、分组、资源权限）与 Kubernetes 集群模型

pub mod k8s;
pub mod rbac;
