use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 入站协议
///
/// 协议相关的 settings 以不透明文本保存，格式由配置层按协议校验，
/// 流量核心只认协议标签，不解析内容。
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum Protocol {
    #[sea_orm(string_value = "vmess")]
    #[serde(rename = "vmess")]
    Vmess,
    #[sea_orm(string_value = "vless")]
    #[serde(rename = "vless")]
    Vless,
    #[sea_orm(string_value = "trojan")]
    #[serde(rename = "trojan")]
    Trojan,
    #[sea_orm(string_value = "shadowsocks")]
    #[serde(rename = "shadowsocks")]
    Shadowsocks,
    #[sea_orm(string_value = "dokodemo-door")]
    #[serde(rename = "dokodemo-door")]
    DokodemoDoor,
    #[sea_orm(string_value = "socks")]
    #[serde(rename = "socks")]
    Socks,
    #[sea_orm(string_value = "http")]
    #[serde(rename = "http")]
    Http,
    #[sea_orm(string_value = "wireguard")]
    #[serde(rename = "wireguard")]
    Wireguard,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inbounds")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub up: i64,
    pub down: i64,
    /// 流量配额（字节），0 表示不限
    pub total: i64,
    /// 历次重置前累计的流量
    pub all_time: i64,
    pub remark: String,
    pub enable: bool,
    /// 到期时间（毫秒时间戳），0 表示永不过期
    pub expiry_time: i64,
    /// 流量重置周期表达式，空或 "never" 表示不重置
    pub traffic_reset: String,
    pub last_traffic_reset_time: i64,
    pub listen: String,
    pub port: i32,
    pub protocol: Protocol,
    pub settings: String,
    pub stream_settings: String,
    #[sea_orm(unique)]
    pub tag: String,
    pub sniffing: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::client_traffic::Entity")]
    ClientTraffic,
}

impl Related<super::client_traffic::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ClientTraffic.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn used(&self) -> i64 {
        self.up + self.down
    }

    pub fn quota_exhausted(&self) -> bool {
        self.total > 0 && self.used() >= self.total
    }

    pub fn expired_at(&self, now_ms: i64) -> bool {
        self.expiry_time > 0 && now_ms >= self.expiry_time
    }

    pub fn is_depleted(&self, now_ms: i64) -> bool {
        self.quota_exhausted() || self.expired_at(now_ms)
    }
}
