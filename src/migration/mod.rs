use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::prelude::*;
use std::fs::create_dir_all;
use std::path::Path;

mod m20250301_000001_init;
mod m20250318_000001_add_traffic_reset;
mod m20250405_000001_unique_client_email;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_init::Migration),
            Box::new(m20250318_000001_add_traffic_reset::Migration),
            Box::new(m20250405_000001_unique_client_email::Migration),
        ]
    }
}

/// 打开（必要时创建）SQLite 数据库
pub async fn connect_sqlite(db_path: &str) -> anyhow::Result<DatabaseConnection> {
    let path = Path::new(db_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            create_dir_all(parent)
                .with_context(|| format!("无法创建数据库目录: {}", parent.display()))?;
        }
    }

    let url = format!("sqlite://{}?mode=rwc", db_path);
    connect(&url).await
}

/// 按 URL 连接数据库（测试中使用 `sqlite::memory:`）
pub async fn connect(url: &str) -> anyhow::Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(url.to_string());
    // SQLite 单写者，内存库也要求所有查询落在同一连接上
    options.max_connections(1).sqlx_logging(false);

    let db = Database::connect(options)
        .await
        .with_context(|| format!("连接数据库失败: {}", url))?;
    Ok(db)
}
