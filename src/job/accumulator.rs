//! 流量累加与定期重置
//!
//! 先把本周期增量写入各实体计数器，再检查入站的重置周期。
//! 单个实体写入失败只记录下来，不影响其余实体。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::TrafficSnapshot;
use tracing::{debug, info, warn};

use crate::error::PersistenceFailure;
use crate::reset_schedule::ResetSchedule;
use crate::store::{InboundReset, InboundStore, InboundWithClients};

#[derive(Debug, Default)]
pub struct Accumulated {
    /// 仅统计已提交的重新启用
    pub restart_needed: bool,
    pub resets: usize,
    pub failures: Vec<PersistenceFailure>,
}

pub struct TrafficAccumulator {
    store: Arc<dyn InboundStore>,
}

impl TrafficAccumulator {
    pub fn new(store: Arc<dyn InboundStore>) -> Self {
        Self { store }
    }

    pub async fn apply(&self, snapshot: &TrafficSnapshot, now: DateTime<Utc>) -> Accumulated {
        let mut result = Accumulated::default();

        for delta in &snapshot.inbounds {
            if !usable_delta("入站", &delta.tag, delta.up, delta.down) {
                continue;
            }
            match self.store.add_inbound_traffic(&delta.tag, delta.up, delta.down).await {
                Ok(true) => {}
                Ok(false) => debug!("忽略未知入站 {} 的流量", delta.tag),
                Err(e) => {
                    warn!("写入入站 {} 流量失败: {}", delta.tag, e);
                    result
                        .failures
                        .push(PersistenceFailure::new(format!("inbound:{}", delta.tag), e));
                }
            }
        }

        for delta in &snapshot.clients {
            if !usable_delta("客户端", &delta.email, delta.up, delta.down) {
                continue;
            }
            match self.store.add_client_traffic(&delta.email, delta.up, delta.down).await {
                Ok(true) => {}
                Ok(false) => debug!("忽略未知客户端 {} 的流量", delta.email),
                Err(e) => {
                    warn!("写入客户端 {} 流量失败: {}", delta.email, e);
                    result
                        .failures
                        .push(PersistenceFailure::new(format!("client:{}", delta.email), e));
                }
            }
        }

        self.apply_resets(now, &mut result).await;
        result
    }

    async fn apply_resets(&self, now: DateTime<Utc>, result: &mut Accumulated) {
        let inbounds = match self.store.list_inbounds().await {
            Ok(inbounds) => inbounds,
            Err(e) => {
                warn!("读取入站列表失败，跳过本周期的流量重置: {}", e);
                result.failures.push(PersistenceFailure::new("inbounds", e));
                return;
            }
        };

        for entry in &inbounds {
            let inbound = &entry.inbound;
            let schedule = match ResetSchedule::parse(&inbound.traffic_reset) {
                Ok(Some(schedule)) => schedule,
                Ok(None) => continue,
                Err(e) => {
                    warn!("入站 {} 跳过流量重置: {}", inbound.tag, e);
                    continue;
                }
            };

            let Some(boundary) = schedule.due_boundary(inbound.last_traffic_reset_time, now) else {
                continue;
            };

            let reset = plan_reset(entry, boundary, now);
            match self.store.reset_inbound_traffic(&reset).await {
                Ok(true) => {
                    if reset.fold_traffic {
                        result.resets += 1;
                        info!(
                            "🔄 入站 {} 流量已重置 (周期起点 {})",
                            inbound.tag,
                            boundary.format("%Y-%m-%d %H:%M")
                        );
                    } else {
                        debug!("入站 {} 设置流量重置锚点 {}", inbound.tag, boundary);
                    }
                    if reset.reenable_inbound || !reset.reenable_clients.is_empty() {
                        info!(
                            "入站 {} 重置后重新启用 {} 个客户端",
                            inbound.tag,
                            reset.reenable_clients.len()
                        );
                        result.restart_needed = true;
                    }
                }
                Ok(false) => debug!("入站 {} 的重置边界已处理", inbound.tag),
                Err(e) => {
                    warn!("重置入站 {} 流量失败: {}", inbound.tag, e);
                    result
                        .failures
                        .push(PersistenceFailure::new(format!("inbound:{}", inbound.tag), e));
                }
            }
        }
    }
}

/// 负数增量视为引擎异常，零增量无需写入
fn usable_delta(kind: &str, key: &str, up: i64, down: i64) -> bool {
    if up < 0 || down < 0 {
        warn!("{} {} 上报了负数流量 ({}/{})，已忽略", kind, key, up, down);
        return false;
    }
    up > 0 || down > 0
}

/// 决定一次重置要写入的内容
///
/// 从未重置过的入站只设置锚点；因配额被禁用、且未过期的入站与客户端在折算后重新启用。
fn plan_reset(entry: &InboundWithClients, boundary: DateTime<Utc>, now: DateTime<Utc>) -> InboundReset {
    let inbound = &entry.inbound;
    let now_ms = now.timestamp_millis();
    let fold_traffic = inbound.last_traffic_reset_time > 0;

    let reenable_inbound =
        fold_traffic && !inbound.enable && inbound.quota_exhausted() && !inbound.expired_at(now_ms);

    let reenable_clients = if fold_traffic {
        entry
            .client_stats
            .iter()
            .filter(|c| !c.enable && c.quota_exhausted() && !c.expired_at(now_ms))
            .map(|c| c.id)
            .collect()
    } else {
        Vec::new()
    };

    InboundReset {
        inbound_id: inbound.id,
        boundary: boundary.timestamp_millis(),
        fold_traffic,
        reenable_inbound,
        reenable_clients,
    }
}
