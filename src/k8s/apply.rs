//! YAML 应用引擎
//!
//! 流程：解析多文档 → 展开 List → 校验 GVK 与名称 → 解析资源映射 →
//! 处理命名空间 → 剥离服务端字段 → server-side apply → 记录历史并裁剪。
//! 第一个失败即中止，已应用的对象不回滚。

use crate::{
    error::AppError,
    k8s::{
        client::ResourceClient,
        manifest::{parse_documents, Manifest},
        mapper::ResourceMapper,
    },
    models::k8s::*,
    repository::YamlHistoryStore,
};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_HISTORY_ACTION: &str = "apply";
const DEFAULT_HISTORY_LIMIT: i64 = 20;

/// 一次应用的上下文
#[derive(Debug, Clone)]
pub struct ApplyContext {
    pub cluster_id: Uuid,
    pub actor_id: Option<Uuid>,
    pub username: Option<String>,
    /// 清单未指定命名空间时使用
    pub default_namespace: Option<String>,
    pub dry_run: bool,
    /// 历史记录中的动作标签
    pub action: String,
}

pub struct YamlApplyEngine {
    history: Arc<dyn YamlHistoryStore>,
    field_manager: String,
    history_retention: i64,
}

impl YamlApplyEngine {
    pub fn new(history: Arc<dyn YamlHistoryStore>, field_manager: &str, history_retention: i64) -> Self {
        Self {
            history,
            field_manager: field_manager.to_string(),
            history_retention,
        }
    }

    pub async fn apply(
        &self,
        client: &dyn ResourceClient,
        ctx: &ApplyContext,
        yaml: &str,
    ) -> Result<Vec<ApplyResult>, AppError> {
        let manifests = parse_documents(yaml)?;
        if manifests.is_empty() {
            return Err(AppError::validation("No Kubernetes objects found in input"));
        }

        // 先整体校验，任何对象缺字段都不提交
        for manifest in &manifests {
            manifest.gvk()?;
            if manifest.name().is_none() {
                return Err(AppError::Validation(format!(
                    "{} is missing metadata.name",
                    manifest.describe()
                )));
            }
        }

        let default_namespace = ctx
            .default_namespace
            .as_deref()
            .filter(|ns| !ns.is_empty());
        let mut mapper = ResourceMapper::new(client);
        let mut results = Vec::with_capacity(manifests.len());

        for mut manifest in manifests {
            let gvk = manifest.gvk()?;
            let mapping = mapper.resolve(&gvk).await?;

            if mapping.namespaced {
                if manifest.namespace().is_none() {
                    let namespace = default_namespace.ok_or_else(|| {
                        AppError::Validation(format!(
                            "{} requires a namespace",
                            manifest.describe()
                        ))
                    })?;
                    manifest.set_namespace(namespace);
                }
            } else {
                manifest.clear_namespace();
            }
            manifest.sanitize();

            client
                .apply(&mapping, &manifest, &self.field_manager, ctx.dry_run)
                .await?;

            let kind = gvk.kind.clone();
            let name = manifest.name().unwrap_or_default().to_string();
            let namespace = manifest.namespace().map(str::to_string);

            tracing::info!(
                cluster_id = %ctx.cluster_id,
                kind = %kind,
                name = %name,
                namespace = namespace.as_deref().unwrap_or(""),
                dry_run = ctx.dry_run,
                "Kubernetes object applied"
            );

            if !ctx.dry_run {
                self.record_history(ctx, &manifest, &kind, &name, namespace.as_deref())
                    .await;
            }

            results.push(ApplyResult {
                kind,
                name,
                namespace,
                action: if ctx.dry_run {
                    ApplyAction::Validated
                } else {
                    ApplyAction::Applied
                },
            });
        }

        Ok(results)
    }

    /// 写入历史并裁剪；失败只记日志
    async fn record_history(
        &self,
        ctx: &ApplyContext,
        manifest: &Manifest,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
    ) {
        let yaml = match manifest.to_yaml() {
            Ok(yaml) => yaml,
            Err(e) => {
                tracing::warn!(error = %e, object = %manifest.describe(), "Failed to encode history YAML");
                return;
            }
        };

        let entry = NewYamlHistory {
            cluster_id: ctx.cluster_id,
            kind: kind.to_string(),
            namespace: namespace.unwrap_or_default().to_string(),
            name: name.to_string(),
            yaml,
            action: ctx.action.clone(),
            created_by: ctx.actor_id,
            username: ctx.username.clone(),
        };

        if let Err(e) = self.history.create(&entry).await {
            tracing::warn!(error = %e, object = %manifest.describe(), "Failed to record YAML history");
            return;
        }

        if let Err(e) = self.history.trim(&entry.key(), self.history_retention).await {
            tracing::warn!(error = %e, object = %manifest.describe(), "Failed to trim YAML history");
        }
    }

    /// 读取集群中的对象并输出为清理后的 YAML
    pub async fn get_resource_yaml(
        &self,
        client: &dyn ResourceClient,
        query: &ResourceYamlQuery,
    ) -> Result<String, AppError> {
        if query.kind.is_empty() || query.name.is_empty() {
            return Err(AppError::validation("kind and name are required"));
        }

        let mut mapper = ResourceMapper::new(client);
        let mapping = match query.api_version.as_deref().filter(|v| !v.is_empty()) {
            Some(api_version) => {
                let (group, version) = crate::k8s::manifest::split_api_version(api_version);
                let gvk = kube::core::GroupVersionKind::gvk(group, version, &query.kind);
                mapper.resolve(&gvk).await?
            }
            None => mapper.resolve_kind(&query.kind).await?,
        };

        let namespace = if mapping.namespaced {
            Some(
                query
                    .namespace
                    .as_deref()
                    .filter(|ns| !ns.is_empty())
                    .ok_or_else(|| {
                        AppError::Validation(format!("{}/{} requires a namespace", query.kind, query.name))
                    })?,
            )
        } else {
            None
        };

        let mut manifest = client.get(&mapping, namespace, &query.name).await?;
        manifest.sanitize();
        manifest.to_yaml()
    }

    /// 本地格式化，不访问集群
    pub fn format_yaml(input: &str) -> Result<String, AppError> {
        let manifests = parse_documents(input)?;
        if manifests.is_empty() {
            return Err(AppError::validation("No Kubernetes objects found in input"));
        }

        let mut documents = Vec::with_capacity(manifests.len());
        for mut manifest in manifests {
            manifest.sanitize();
            documents.push(manifest.to_yaml()?);
        }
        Ok(documents.join("---\n"))
    }

    /// 历史记录，最新在前；limit ≤ 0 时取 20
    pub async fn list_history(
        &self,
        key: &YamlHistoryKey,
        limit: Option<i64>,
    ) -> Result<Vec<K8sYamlHistory>, AppError> {
        let limit = match limit {
            Some(n) if n > 0 => n,
            _ => DEFAULT_HISTORY_LIMIT,
        };
        self.history.list(key, limit).await
    }
}
