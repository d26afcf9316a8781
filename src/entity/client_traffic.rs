use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 入站内嵌客户端的流量与状态
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "client_traffics")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub inbound_id: i64,
    pub enable: bool,
    /// 客户端唯一标识，全局唯一，引擎按它上报流量
    #[sea_orm(unique)]
    pub email: String,
    pub up: i64,
    pub down: i64,
    pub all_time: i64,
    /// 流量配额（字节），0 表示不限
    pub total: i64,
    /// 到期时间（毫秒时间戳），0 表示永不过期
    pub expiry_time: i64,
    /// 自动续期天数，0 表示不续期
    pub reset: i32,
    pub sub_id: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::inbound::Entity",
        from = "Column::InboundId",
        to = "super::inbound::Column::Id"
    )]
    Inbound,
}

impl Related<super::inbound::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inbound.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn used(&self) -> i64 {
        self.up + self.down
    }

    /// 配额用尽（`>=`，恰好用满也算）
    pub fn quota_exhausted(&self) -> bool {
        self.total > 0 && self.used() >= self.total
    }

    /// 已到期（`>=`，到期时刻当场生效）
    pub fn expired_at(&self, now_ms: i64) -> bool {
        self.expiry_time > 0 && now_ms >= self.expiry_time
    }

    pub fn is_depleted(&self, now_ms: i64) -> bool {
        self.quota_exhausted() || self.expired_at(now_ms)
    }
}
