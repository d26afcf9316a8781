//! 流量上报相关类型
//!
//! 引擎每次被读取后会清零自身计数器，因此这里的每一条记录
//! 都是"本周期增量"，只会被消费一次。

use serde::{Deserialize, Serialize};

/// 单个入站的流量增量（按 tag 标识）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundTraffic {
    pub tag: String,
    pub up: i64,
    pub down: i64,
}

/// 单个客户端的流量增量（按 email 标识）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientTraffic {
    pub email: String,
    pub up: i64,
    pub down: i64,
}

impl InboundTraffic {
    pub fn new(tag: impl Into<String>, up: i64, down: i64) -> Self {
        Self { tag: tag.into(), up, down }
    }

    pub fn is_empty(&self) -> bool {
        self.up == 0 && self.down == 0
    }
}

impl ClientTraffic {
    pub fn new(email: impl Into<String>, up: i64, down: i64) -> Self {
        Self { email: email.into(), up, down }
    }

    pub fn is_empty(&self) -> bool {
        self.up == 0 && self.down == 0
    }
}

/// 一次读取得到的完整流量快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSnapshot {
    #[serde(default)]
    pub inbounds: Vec<InboundTraffic>,
    #[serde(default)]
    pub clients: Vec<ClientTraffic>,
}

impl TrafficSnapshot {
    pub fn is_empty(&self) -> bool {
        self.inbounds.iter().all(InboundTraffic::is_empty)
            && self.clients.iter().all(ClientTraffic::is_empty)
    }

    /// 本周期内产生过流量的客户端
    pub fn active_emails(&self) -> impl Iterator<Item = &str> {
        self.clients
            .iter()
            .filter(|c| !c.is_empty())
            .map(|c| c.email.as_str())
    }
}
