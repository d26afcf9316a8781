use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::entity::system_config::{config_keys, SystemConfigItem};
use crate::entity::{system_config, SystemConfig};

/// 运行时配置缓存管理器
///
/// 配置持久化在 `system_config` 表中，流量任务每个周期从缓存读取，
/// 修改后下一个周期即生效。
#[derive(Clone)]
pub struct ConfigManager {
    cache: Arc<RwLock<HashMap<String, ConfigValue>>>,
    db: Option<DatabaseConnection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Number(i64),
    Float(f64),
    String(String),
    Boolean(bool),
}

impl ConfigValue {
    pub fn as_string(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// 按 JSON 值转换，未知类型退化为字符串
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => ConfigValue::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Number(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => ConfigValue::String(s.clone()),
            other => ConfigValue::String(other.to_string()),
        }
    }

    fn to_db_string(&self) -> anyhow::Result<String> {
        Ok(match self {
            ConfigValue::Number(n) => n.to_string(),
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::String(s) => serde_json::to_string(s)?,
            ConfigValue::Boolean(b) => b.to_string(),
        })
    }
}

impl ConfigManager {
    /// 仅内存缓存，不落库
    pub fn new() -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            db: None,
        }
    }

    pub fn with_db(db: DatabaseConnection) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            db: Some(db),
        }
    }

    /// 从数据库加载所有配置到缓存
    pub async fn load_from_db(&self) -> anyhow::Result<()> {
        let Some(db) = &self.db else {
            return Ok(());
        };
        let configs = SystemConfig::find().all(db).await?;

        let mut cache = self.cache.write().await;
        for config in configs {
            let value = parse_value(&config.value, &config.value_type);
            cache.insert(config.key.clone(), value);
        }

        info!("✅ 已加载 {} 个系统配置项", cache.len());
        Ok(())
    }

    /// 获取配置值
    pub async fn get(&self, key: &str) -> Option<ConfigValue> {
        let cache = self.cache.read().await;
        cache.get(key).cloned()
    }

    /// 获取字符串配置（带默认值）
    pub async fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key).await
            .and_then(|v| v.as_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// 获取布尔配置（带默认值）
    pub async fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).await
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    /// 外部流量推送地址；未开启或地址为空时返回 None
    pub async fn external_traffic_inform(&self) -> Option<String> {
        if !self.get_bool(config_keys::EXTERNAL_TRAFFIC_INFORM_ENABLE, false).await {
            return None;
        }
        let uri = self.get_string(config_keys::EXTERNAL_TRAFFIC_INFORM_URI, "").await;
        let uri = uri.trim();
        if uri.is_empty() {
            warn!("外部流量推送已开启，但推送地址为空");
            return None;
        }
        Some(uri.to_string())
    }

    /// 更新配置值
    pub async fn set(&self, key: &str, value: ConfigValue) -> anyhow::Result<()> {
        // 先落库，失败时缓存保持不变
        if let Some(db) = &self.db {
            let config = SystemConfig::find()
                .filter(system_config::Column::Key.eq(key))
                .one(db)
                .await?
                .ok_or_else(|| anyhow!("未知配置项: {}", key))?;

            let mut active_model: system_config::ActiveModel = config.into();
            active_model.value = Set(value.to_db_string()?);
            active_model.updated_at = Set(chrono::Utc::now().naive_utc());
            active_model.update(db).await?;
        }

        let mut cache = self.cache.write().await;
        cache.insert(key.to_string(), value);
        Ok(())
    }

    /// 列出全部配置项（管理 API 使用）
    pub async fn list_items(&self) -> anyhow::Result<Vec<SystemConfigItem>> {
        let Some(db) = &self.db else {
            return Ok(Vec::new());
        };
        let configs = SystemConfig::find()
            .order_by_asc(system_config::Column::Id)
            .all(db)
            .await?;
        Ok(configs.into_iter().map(SystemConfigItem::from).collect())
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 解析配置值
fn parse_value(value_str: &str, value_type: &str) -> ConfigValue {
    match value_type {
        "number" => {
            if let Ok(n) = value_str.parse::<i64>() {
                ConfigValue::Number(n)
            } else if let Ok(f) = value_str.parse::<f64>() {
                ConfigValue::Float(f)
            } else {
                warn!("无法解析数值配置: {}", value_str);
                ConfigValue::Number(0)
            }
        }
        "boolean" => {
            ConfigValue::Boolean(value_str.parse::<bool>().unwrap_or(false))
        }
        "string" => {
            // 尝试解析 JSON 字符串
            if let Ok(s) = serde_json::from_str::<String>(value_str) {
                ConfigValue::String(s)
            } else {
                ConfigValue::String(value_str.to_string())
            }
        }
        _ => ConfigValue::String(value_str.to_string()),
    }
}
