//! GVK 到 REST 资源的映射
//! 单次调用内缓存发现结果，同一批清单里重复的 kind 只查询一次

use crate::{error::AppError, k8s::client::ResourceClient};
use kube::core::{ApiResource, GroupVersionKind};
use std::collections::HashMap;

/// 解析后的资源：REST 资源名与作用域
#[derive(Debug, Clone)]
pub struct ResourceMapping {
    pub resource: ApiResource,
    pub namespaced: bool,
}

impl ResourceMapping {
    pub fn kind(&self) -> &str {
        &self.resource.kind
    }

    pub fn plural(&self) -> &str {
        &self.resource.plural
    }
}

pub struct ResourceMapper<'a> {
    client: &'a dyn ResourceClient,
    resolved: HashMap<(String, String, String), ResourceMapping>,
}

impl<'a> ResourceMapper<'a> {
    pub fn new(client: &'a dyn ResourceClient) -> Self {
        Self {
            client,
            resolved: HashMap::new(),
        }
    }

    /// 解析 GVK；未知类型返回错误
    pub async fn resolve(&mut self, gvk: &GroupVersionKind) -> Result<ResourceMapping, AppError> {
        let key = (gvk.group.clone(), gvk.version.clone(), gvk.kind.clone());
        if let Some(mapping) = self.resolved.get(&key) {
            return Ok(mapping.clone());
        }

        let mapping = self.client.resolve(gvk).await?;
        tracing::debug!(
            kind = %gvk.kind,
            plural = %mapping.plural(),
            namespaced = mapping.namespaced,
            "Resource mapping resolved"
        );
        self.resolved.insert(key, mapping.clone());
        Ok(mapping)
    }

    /// 仅凭 kind 查找（跨组，取推荐版本）
    pub async fn resolve_kind(&mut self, kind: &str) -> Result<ResourceMapping, AppError> {
        let mapping = self.client.find_kind(kind).await?;
        let key = (
            mapping.resource.group.clone(),
            mapping.resource.version.clone(),
            mapping.resource.kind.clone(),
        );
        self.resolved.insert(key, mapping.clone());
        Ok(mapping)
    }
}
