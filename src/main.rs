//! 咨询服务 API 主入口

use advisory_api::{
    config::AppConfig,
    db,
    handlers::health,
    middleware::{AppState, RateLimiters},
    repository::{PgContactRepository, PgInquiryRepository, PgUserDirectory},
    routes, telemetry,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ===== CLI 参数处理 =====
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("advisory-api {}", env!("CARGO_PKG_VERSION"));
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

    // 加载 .env 文件（开发环境）
    // 按优先级加载：.env.local > .env.development > .env
    if let Ok(env) = std::env::var("ADVISORY_ENV") {
        dotenv::from_filename(format!(".env.{}", env)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::from_filename(".env.development").ok();
        dotenv::dotenv().ok();
    }

    // 设置应用启动时间
    health::set_start_time();

    // 1. 加载配置
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    // 2. 初始化日志
    telemetry::init_telemetry(&config);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Advisory API starting...");

    // 3. 数据库连接池 + 迁移
    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    tracing::info!("Database initialized");

    // 4. 构建应用状态
    let query_timeout = Duration::from_secs(config.database.query_timeout_secs);
    let app_state = Arc::new(AppState::new(
        config.clone(),
        Arc::new(PgUserDirectory::new(db_pool.clone(), query_timeout)),
        Arc::new(PgContactRepository::new(db_pool.clone(), query_timeout)),
        Arc::new(PgInquiryRepository::new(db_pool.clone(), query_timeout)),
    )?);

    spawn_rate_limit_cleanup(app_state.rate_limiters.clone());

    // 5. 构建路由
    let app = routes::create_router(app_state);

    // 6. 启动服务器
    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    // 7. 优雅关闭
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(config.server.graceful_shutdown_timeout_secs))
    .await?;

    db_pool.close().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// 定期清理不再活跃的限流记录
fn spawn_rate_limit_cleanup(limiters: RateLimiters) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            for limiter in [
                &limiters.global,
                &limiters.auth,
                &limiters.contact,
                &limiters.inquiry,
            ] {
                limiter.cleanup_expired();
            }
            tracing::debug!(
                tracked_ips = limiters.global.tracked_ips(),
                "Rate limiter cleanup finished"
            );
        }
    });
}

/// 优雅关闭信号处理
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    // 超时后强制退出
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        tracing::warn!("Graceful shutdown timeout reached, forcing exit");
        std::process::exit(1);
    });
}

/// 打印帮助信息
fn print_help() {
    println!("advisory-api {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: advisory-api [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过 ADVISORY_ 前缀的环境变量完成");
    println!("  例如 ADVISORY_DATABASE__URL, ADVISORY_SECURITY__JWT_SECRET");
    println!("  设置 ADVISORY_ENV 时加载 .env.$ADVISORY_ENV");
}
