//! 入站与客户端计数器的持久化接口
//!
//! 流量核心只通过 [`InboundStore`] 访问数据库。每个实体的 up/down
//! 总是在同一条 UPDATE 中一起写入，不会出现只写了一半的计数。

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, TransactionTrait,
};
use serde::Serialize;

use crate::entity::{client_traffic, inbound, ClientTraffic, Inbound};

/// 入站及其内嵌客户端
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundWithClients {
    #[serde(flatten)]
    pub inbound: inbound::Model,
    pub client_stats: Vec<client_traffic::Model>,
}

/// 一次定期重置的写入内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundReset {
    pub inbound_id: i64,
    /// 新的 `last_traffic_reset_time`（毫秒）
    pub boundary: i64,
    /// false 时只设置锚点，不折算计数
    pub fold_traffic: bool,
    pub reenable_inbound: bool,
    pub reenable_clients: Vec<i64>,
}

#[async_trait]
pub trait InboundStore: Send + Sync {
    /// 按 tag 累加入站流量，返回是否命中入站
    async fn add_inbound_traffic(&self, tag: &str, up: i64, down: i64) -> Result<bool>;

    /// 按 email 累加客户端流量（email 全局唯一），返回是否命中客户端
    async fn add_client_traffic(&self, email: &str, up: i64, down: i64) -> Result<bool>;

    /// 读取全部入站（含客户端），按 id 排序
    async fn list_inbounds(&self) -> Result<Vec<InboundWithClients>>;

    async fn set_inbound_enable(&self, inbound_id: i64, enable: bool) -> Result<()>;

    async fn set_client_enable(&self, client_id: i64, enable: bool) -> Result<()>;

    /// 在一个事务内完成定期重置
    ///
    /// 仅当 `last_traffic_reset_time < boundary` 时生效，返回 false 表示该边界已处理过。
    async fn reset_inbound_traffic(&self, reset: &InboundReset) -> Result<bool>;

    /// 续期客户端：折算计数、更新到期时间并启用
    async fn renew_client(&self, client_id: i64, expiry_time: i64) -> Result<()>;

    /// 清零单个入站计数（折算进 all_time），可选同时启用，不涉及其客户端
    async fn reset_inbound_counters(&self, inbound_id: i64, enable: bool) -> Result<()>;

    /// 清零单个客户端计数（折算进 all_time），可选同时启用
    async fn reset_client_traffic(&self, client_id: i64, enable: bool) -> Result<()>;

    /// 删除客户端，返回删除数量
    async fn delete_clients(&self, client_ids: &[i64]) -> Result<u64>;
}

/// 基于 sea-orm 的实现
#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl InboundStore for SeaOrmStore {
    async fn add_inbound_traffic(&self, tag: &str, up: i64, down: i64) -> Result<bool> {
        let result = Inbound::update_many()
            .col_expr(inbound::Column::Up, Expr::col(inbound::Column::Up).add(up))
            .col_expr(inbound::Column::Down, Expr::col(inbound::Column::Down).add(down))
            .filter(inbound::Column::Tag.eq(tag))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn add_client_traffic(&self, email: &str, up: i64, down: i64) -> Result<bool> {
        let result = ClientTraffic::update_many()
            .col_expr(client_traffic::Column::Up, Expr::col(client_traffic::Column::Up).add(up))
            .col_expr(client_traffic::Column::Down, Expr::col(client_traffic::Column::Down).add(down))
            .filter(client_traffic::Column::Email.eq(email))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn list_inbounds(&self) -> Result<Vec<InboundWithClients>> {
        // 同一事务内读取，保证入站与客户端来自同一时刻
        let txn = self.db.begin().await?;
        let inbounds = Inbound::find()
            .order_by_asc(inbound::Column::Id)
            .all(&txn)
            .await?;
        let clients = ClientTraffic::find()
            .order_by_asc(client_traffic::Column::Id)
            .all(&txn)
            .await?;
        txn.commit().await?;

        let mut by_inbound: HashMap<i64, Vec<client_traffic::Model>> = HashMap::new();
        for client in clients {
            by_inbound.entry(client.inbound_id).or_default().push(client);
        }

        Ok(inbounds
            .into_iter()
            .map(|inbound| {
                let client_stats = by_inbound.remove(&inbound.id).unwrap_or_default();
                InboundWithClients { inbound, client_stats }
            })
            .collect())
    }

    async fn set_inbound_enable(&self, inbound_id: i64, enable: bool) -> Result<()> {
        let result = Inbound::update_many()
            .col_expr(inbound::Column::Enable, Expr::value(enable))
            .filter(inbound::Column::Id.eq(inbound_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(anyhow!("入站 #{} 不存在", inbound_id));
        }
        Ok(())
    }

    async fn set_client_enable(&self, client_id: i64, enable: bool) -> Result<()> {
        let result = ClientTraffic::update_many()
            .col_expr(client_traffic::Column::Enable, Expr::value(enable))
            .filter(client_traffic::Column::Id.eq(client_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(anyhow!("客户端 #{} 不存在", client_id));
        }
        Ok(())
    }

    async fn reset_inbound_traffic(&self, reset: &InboundReset) -> Result<bool> {
        let txn = self.db.begin().await?;

        let mut update = Inbound::update_many()
            .col_expr(inbound::Column::LastTrafficResetTime, Expr::value(reset.boundary));
        if reset.fold_traffic {
            update = update
                .col_expr(inbound::Column::AllTime, Expr::cust("all_time + up + down"))
                .col_expr(inbound::Column::Up, Expr::value(0i64))
                .col_expr(inbound::Column::Down, Expr::value(0i64));
        }
        if reset.reenable_inbound {
            update = update.col_expr(inbound::Column::Enable, Expr::value(true));
        }
        let result = update
            .filter(inbound::Column::Id.eq(reset.inbound_id))
            .filter(inbound::Column::LastTrafficResetTime.lt(reset.boundary))
            .exec(&txn)
            .await?;

        if result.rows_affected == 0 {
            // 边界已被处理
            txn.rollback().await?;
            return Ok(false);
        }

        if reset.fold_traffic {
            ClientTraffic::update_many()
                .col_expr(client_traffic::Column::AllTime, Expr::cust("all_time + up + down"))
                .col_expr(client_traffic::Column::Up, Expr::value(0i64))
                .col_expr(client_traffic::Column::Down, Expr::value(0i64))
                .filter(client_traffic::Column::InboundId.eq(reset.inbound_id))
                .exec(&txn)
                .await?;
        }

        if !reset.reenable_clients.is_empty() {
            ClientTraffic::update_many()
                .col_expr(client_traffic::Column::Enable, Expr::value(true))
                .filter(client_traffic::Column::InboundId.eq(reset.inbound_id))
                .filter(client_traffic::Column::Id.is_in(reset.reenable_clients.iter().copied()))
                .exec(&txn)
                .await?;
        }

        txn.commit().await?;
        Ok(true)
    }

    async fn reset_inbound_counters(&self, inbound_id: i64, enable: bool) -> Result<()> {
        let mut update = Inbound::update_many()
            .col_expr(inbound::Column::AllTime, Expr::cust("all_time + up + down"))
            .col_expr(inbound::Column::Up, Expr::value(0i64))
            .col_expr(inbound::Column::Down, Expr::value(0i64));
        if enable {
            update = update.col_expr(inbound::Column::Enable, Expr::value(true));
        }
        let result = update
            .filter(inbound::Column::Id.eq(inbound_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(anyhow!("入站 #{} 不存在", inbound_id));
        }
        Ok(())
    }

    async fn renew_client(&self, client_id: i64, expiry_time: i64) -> Result<()> {
        let result = ClientTraffic::update_many()
            .col_expr(client_traffic::Column::AllTime, Expr::cust("all_time + up + down"))
            .col_expr(client_traffic::Column::Up, Expr::value(0i64))
            .col_expr(client_traffic::Column::Down, Expr::value(0i64))
            .col_expr(client_traffic::Column::ExpiryTime, Expr::value(expiry_time))
            .col_expr(client_traffic::Column::Enable, Expr::value(true))
            .filter(client_traffic::Column::Id.eq(client_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(anyhow!("客户端 #{} 不存在", client_id));
        }
        Ok(())
    }

    async fn reset_client_traffic(&self, client_id: i64, enable: bool) -> Result<()> {
        let mut update = ClientTraffic::update_many()
            .col_expr(client_traffic::Column::AllTime, Expr::cust("all_time + up + down"))
            .col_expr(client_traffic::Column::Up, Expr::value(0i64))
            .col_expr(client_traffic::Column::Down, Expr::value(0i64));
        if enable {
            update = update.col_expr(client_traffic::Column::Enable, Expr::value(true));
        }
        let result = update
            .filter(client_traffic::Column::Id.eq(client_id))
            .exec(&self.db)
            .await?;
        if result.rows_affected == 0 {
            return Err(anyhow!("客户端 #{} 不存在", client_id));
        }
        Ok(())
    }

    async fn delete_clients(&self, client_ids: &[i64]) -> Result<u64> {
        if client_ids.is_empty() {
            return Ok(0);
        }
        let result = ClientTraffic::delete_many()
            .filter(client_traffic::Column::Id.is_in(client_ids.iter().copied()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
