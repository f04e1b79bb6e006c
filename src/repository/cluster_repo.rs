//! 集群数据访问

use crate::{error::AppError, models::k8s::*};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[async_trait]
pub trait ClusterStore: Send + Sync {
    async fn create(&self, cluster: &NewCluster) -> Result<Cluster, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Cluster>, AppError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Cluster>, AppError>;

    /// 部分更新，None 字段保持原值
    async fn update(&self, id: Uuid, changes: &UpdateClusterRequest) -> Result<Option<Cluster>, AppError>;

    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;

    /// 分页列表，返回 (当前页, 总数)
    async fn list(&self, query: &ClusterListQuery) -> Result<(Vec<Cluster>, i64), AppError>;

    async fn update_status(&self, id: Uuid, update: &ClusterStatusUpdate) -> Result<(), AppError>;
}

pub struct PgClusterStore {
    db: PgPool,
}

impl PgClusterStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ClusterStore for PgClusterStore {
    async fn create(&self, cluster: &NewCluster) -> Result<Cluster, AppError> {
        let created = sqlx::query_as::<_, Cluster>(
            r#"
            INSERT INTO clusters (
                name, code, api_server, kubeconfig, env_code, description,
                version, status, node_count, pod_count, last_check_at, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(&cluster.name)
        .bind(&cluster.code)
        .bind(&cluster.api_server)
        .bind(&cluster.kubeconfig)
        .bind(&cluster.env_code)
        .bind(&cluster.description)
        .bind(&cluster.version)
        .bind(cluster.status)
        .bind(cluster.node_count)
        .bind(cluster.pod_count)
        .bind(cluster.last_check_at)
        .bind(cluster.created_by)
        .fetch_one(&self.db)
        .await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Cluster>, AppError> {
        let cluster = sqlx::query_as::<_, Cluster>("SELECT * FROM clusters WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;

        Ok(cluster)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Cluster>, AppError> {
        let cluster = sqlx::query_as::<_, Cluster>("SELECT * FROM clusters WHERE code = $1")
            .bind(code)
            .fetch_optional(&self.db)
            .await?;

        Ok(cluster)
    }

    async fn update(&self, id: Uuid, changes: &UpdateClusterRequest) -> Result<Option<Cluster>, AppError> {
        let cluster = sqlx::query_as::<_, Cluster>(
            r#"
            UPDATE clusters
            SET
                name = COALESCE($2, name),
                api_server = COALESCE($3, api_server),
                kubeconfig = COALESCE($4, kubeconfig),
                env_code = COALESCE($5, env_code),
                description = COALESCE($6, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.api_server)
        .bind(&changes.kubeconfig)
        .bind(&changes.env_code)
        .bind(&changes.description)
        .fetch_optional(&self.db)
        .await?;

        Ok(cluster)
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM clusters WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, query: &ClusterListQuery) -> Result<(Vec<Cluster>, i64), AppError> {
        let page = query.page.max(1);
        let page_size = query.page_size.clamp(1, 100);
        let keyword = query
            .keyword
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| format!("%{}%", k));
        let env_code = query.env_code.as_deref().filter(|e| !e.is_empty());

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM clusters
            WHERE ($1::varchar IS NULL OR env_code = $1)
              AND ($2::varchar IS NULL OR name ILIKE $2 OR code ILIKE $2)
            "#,
        )
        .bind(env_code)
        .bind(&keyword)
        .fetch_one(&self.db)
        .await?;

        let clusters = sqlx::query_as::<_, Cluster>(
            r#"
            SELECT * FROM clusters
            WHERE ($1::varchar IS NULL OR env_code = $1)
              AND ($2::varchar IS NULL OR name ILIKE $2 OR code ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(env_code)
        .bind(&keyword)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&self.db)
        .await?;

        Ok((clusters, total))
    }

    async fn update_status(&self, id: Uuid, update: &ClusterStatusUpdate) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE clusters
            SET
                status = $2,
                version = COALESCE($3, version),
                node_count = $4,
                pod_count = $5,
                last_check_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status)
        .bind(&update.version)
        .bind(update.node_count)
        .bind(update.pod_count)
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
