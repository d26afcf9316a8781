use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use xpanel::api::{self, AppState};
use xpanel::broadcast::BroadcastPublisher;
use xpanel::config::Config;
use xpanel::config_manager::ConfigManager;
use xpanel::engine_client::RemoteEngine;
use xpanel::job::TrafficJob;
use xpanel::migration::{connect_sqlite, Migrator};
use xpanel::notifier::ExternalNotifier;
use xpanel::online::OnlineClientTracker;
use xpanel::store::SeaOrmStore;

#[derive(Parser)]
#[command(name = "xpanel", version, about = "代理面板流量统计服务")]
struct Cli {
    /// 配置文件路径（默认依次查找 xpanel.toml、../xpanel.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// 前台运行面板（默认）
    Run,
    /// 只执行数据库迁移
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_tracing(config.log_dir.as_deref());

    let db = connect_sqlite(&config.db_path).await?;
    Migrator::up(&db, None).await?;
    info!("✅ 数据库初始化完成: {}", config.db_path);

    if matches!(cli.command, Some(Command::Migrate)) {
        return Ok(());
    }

    info!("📋 xpanel 启动");
    info!("🌐 Web端口: {}", config.web_port);
    info!("🔗 代理引擎: {}", config.engine_url);

    let config_manager = Arc::new(ConfigManager::with_db(db.clone()));
    if let Err(e) = config_manager.load_from_db().await {
        tracing::error!("加载系统配置失败: {}", e);
    }

    let engine = Arc::new(RemoteEngine::new(
        config.engine_url.clone(),
        config.engine_secret(),
        config.traffic_interval(),
    )?);
    let tracker = Arc::new(OnlineClientTracker::new());
    let publisher = BroadcastPublisher::new(config.subscriber_buffer);

    let job = Arc::new(TrafficJob::new(
        Arc::new(SeaOrmStore::new(db)),
        engine,
        tracker.clone(),
        publisher.clone(),
        ExternalNotifier::new(config.inform_timeout())?,
        config_manager.clone(),
    ));
    job.clone().spawn(config.traffic_interval());

    let app_state = AppState {
        job,
        tracker,
        publisher,
        config_manager,
        panel_secret: config.panel_secret(),
    };
    api::start_web_server(app_state, config.web_port);

    info!("✅ 所有服务已启动，等待终止信号...");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C 信号，正在关闭服务...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("failed to listen for SIGTERM");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("收到 SIGTERM 信号，正在关闭服务...");
        }
    }

    Ok(())
}

/// 初始化日志；设置了日志目录时按天轮转写文件
fn init_tracing(log_dir: Option<&str>) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx::query=warn"));

    if let Some(dir) = log_dir {
        let file_appender = tracing_appender::rolling::daily(dir, "xpanel.log");
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(file_appender).with_ansi(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer())
            .init();
    }
}
