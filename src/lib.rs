//! DevOps 控制台库
//! 权限解析与 RBAC 网关、用户组与权限树、Kubernetes 集群登记与 YAML 下发

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod k8s;
pub mod middleware;
pub mod models;
pub mod rbac;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
pub mod tree;
