//! DevOps 控制台主入口

use devops_console::{
    auth::JwtService,
    config::AppConfig,
    db,
    handlers::health,
    k8s::KubeConnector,
    middleware::AppState,
    repository::{PgClusterStore, PgPermissionStore, PgYamlHistoryStore},
    routes,
    services::{ClusterService, PermissionCache, PermissionService},
    telemetry,
};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("devops-console {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    // .env.local > .env.development > .env，生产环境直接使用环境变量
    if let Ok(env) = std::env::var("DEVOPS_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    // 1. 配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 日志
    telemetry::init_telemetry(&config);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "DevOps console starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;
    db::record_pool_metrics(&db_pool);
    tracing::info!("Database initialized");

    // 4. 服务装配
    let permission_cache = Arc::new(PermissionCache::new(Duration::from_secs(
        config.rbac.cache_ttl_secs,
    )));
    let permission_service = Arc::new(PermissionService::new(
        Arc::new(PgPermissionStore::new(db_pool.clone())),
        permission_cache,
    ));

    let connector = Arc::new(KubeConnector::new(Duration::from_secs(
        config.kubernetes.request_timeout_secs,
    )));
    let cluster_service = Arc::new(ClusterService::new(
        Arc::new(PgClusterStore::new(db_pool.clone())),
        Arc::new(PgYamlHistoryStore::new(db_pool.clone())),
        connector,
        &config.kubernetes,
    ));

    let jwt_service = Arc::new(JwtService::from_config(&config)?);

    let app_state = Arc::new(AppState {
        config: config.clone(),
        db: db_pool,
        permission_service,
        cluster_service,
        jwt_service,
    });

    // 5. 路由
    let app = routes::create_router(app_state);

    // 6. 启动
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 等待退出信号，之后进入优雅关闭，超时强制退出
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

fn print_help() {
    println!("devops-console {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: devops-console [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 DEVOPS_ 前缀的环境变量完成，层级用 __ 分隔");
    println!("  例如 DEVOPS_DATABASE__URL、DEVOPS_KUBERNETES__ENCRYPTION_KEY");
}
