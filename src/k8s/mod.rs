//! Kubernetes 集成
//! 清单解析、资源映射、server-side apply、集群浏览与 kubeconfig 加密

pub mod apply;
pub mod cipher;
pub mod client;
pub mod manifest;
pub mod mapper;
pub mod summary;

pub use apply::{ApplyContext, YamlApplyEngine};
pub use cipher::KubeconfigCipher;
pub use client::{ClusterConnector, KubeConnector, KubeResourceClient, ResourceClient};
pub use manifest::Manifest;
pub use mapper::{ResourceMapper, ResourceMapping};
