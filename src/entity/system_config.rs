use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "system_config")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// 配置键名
    pub key: String,
    /// 配置值（JSON格式）
    pub value: String,
    /// 配置说明
    pub description: String,
    /// 配置类型：number, string, boolean
    pub value_type: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// 系统配置项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemConfigItem {
    pub key: String,
    pub value: serde_json::Value,
    pub description: String,
    #[serde(rename = "valueType")]
    pub value_type: String,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime,
}

impl From<Model> for SystemConfigItem {
    fn from(model: Model) -> Self {
        let value = serde_json::from_str(&model.value).unwrap_or(serde_json::Value::Null);
        Self {
            key: model.key,
            value,
            description: model.description,
            value_type: model.value_type,
            updated_at: model.updated_at,
        }
    }
}

/// 配置键常量
pub mod config_keys {
    /// 是否把每周期流量推送到外部接口
    pub const EXTERNAL_TRAFFIC_INFORM_ENABLE: &str = "external_traffic_inform_enable";
    /// 外部流量推送地址
    pub const EXTERNAL_TRAFFIC_INFORM_URI: &str = "external_traffic_inform_uri";
}
