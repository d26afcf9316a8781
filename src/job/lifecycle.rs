//! 客户端与入站的生命周期策略
//!
//! 周期任务只会禁用或续期，从不删除；删除只发生在显式的清理操作中。

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::entity::client_traffic;
use crate::error::PersistenceFailure;
use crate::store::InboundStore;

const DAY_MS: i64 = 86_400_000;

/// 被禁用的客户端及原因，配额与到期两个条件都会记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DisabledClient {
    pub email: String,
    pub inbound_id: i64,
    pub by_quota: bool,
    pub by_expiry: bool,
}

#[derive(Debug, Default)]
pub struct Enforced {
    pub restart_needed: bool,
    pub disabled: Vec<DisabledClient>,
    pub disabled_inbounds: Vec<String>,
    pub renewed: Vec<String>,
    pub failures: Vec<PersistenceFailure>,
}

/// 一次清理的结果
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Purged {
    pub deleted: u64,
    pub emails: Vec<String>,
}

/// 因配额被禁用且未到期，清零后应重新启用
fn reenable_after_reset(enable: bool, quota_exhausted: bool, expired: bool) -> bool {
    !enable && quota_exhausted && !expired
}

pub struct ClientLifecycleEnforcer {
    store: Arc<dyn InboundStore>,
}

impl ClientLifecycleEnforcer {
    pub fn new(store: Arc<dyn InboundStore>) -> Self {
        Self { store }
    }

    /// 按已提交的计数执行配额与到期策略
    pub async fn enforce(&self, now: DateTime<Utc>) -> Enforced {
        let now_ms = now.timestamp_millis();
        let mut result = Enforced::default();

        let inbounds = match self.store.list_inbounds().await {
            Ok(inbounds) => inbounds,
            Err(e) => {
                warn!("读取入站列表失败，跳过本周期的生命周期检查: {}", e);
                result.failures.push(PersistenceFailure::new("inbounds", e));
                return result;
            }
        };

        for entry in &inbounds {
            let inbound = &entry.inbound;
            if inbound.enable && inbound.is_depleted(now_ms) {
                match self.store.set_inbound_enable(inbound.id, false).await {
                    Ok(()) => {
                        info!(
                            "⛔ 入站 {} 已禁用 (配额用尽: {}, 已到期: {})",
                            inbound.tag,
                            inbound.quota_exhausted(),
                            inbound.expired_at(now_ms)
                        );
                        result.restart_needed = true;
                        result.disabled_inbounds.push(inbound.tag.clone());
                    }
                    Err(e) => {
                        warn!("禁用入站 {} 失败: {}", inbound.tag, e);
                        result
                            .failures
                            .push(PersistenceFailure::new(format!("inbound:{}", inbound.tag), e));
                    }
                }
            }

            for client in &entry.client_stats {
                self.enforce_client(client, now_ms, &mut result).await;
            }
        }

        result
    }

    async fn enforce_client(&self, client: &client_traffic::Model, now_ms: i64, result: &mut Enforced) {
        if let Some(expiry) = renewed_expiry(client, now_ms) {
            match self.store.renew_client(client.id, expiry).await {
                Ok(()) => {
                    info!("🔁 客户端 {} 已自动续期 {} 天", client.email, client.reset);
                    if !client.enable {
                        result.restart_needed = true;
                    }
                    result.renewed.push(client.email.clone());
                }
                Err(e) => {
                    warn!("续期客户端 {} 失败: {}", client.email, e);
                    result
                        .failures
                        .push(PersistenceFailure::new(format!("client:{}", client.email), e));
                }
            }
            return;
        }

        if !client.enable {
            return;
        }

        let by_quota = client.quota_exhausted();
        let by_expiry = client.expired_at(now_ms);
        if !(by_quota || by_expiry) {
            return;
        }

        match self.store.set_client_enable(client.id, false).await {
            Ok(()) => {
                info!(
                    "⛔ 客户端 {} 已禁用 (配额用尽: {}, 已到期: {})",
                    client.email, by_quota, by_expiry
                );
                result.restart_needed = true;
                result.disabled.push(DisabledClient {
                    email: client.email.clone(),
                    inbound_id: client.inbound_id,
                    by_quota,
                    by_expiry,
                });
            }
            Err(e) => {
                warn!("禁用客户端 {} 失败: {}", client.email, e);
                result
                    .failures
                    .push(PersistenceFailure::new(format!("client:{}", client.email), e));
            }
        }
    }

    /// 删除已禁用且配额用尽或已到期的客户端
    ///
    /// `inbound_id` 为 None 时处理全部入站。
    pub async fn purge_depleted(&self, inbound_id: Option<i64>, now: DateTime<Utc>) -> Result<Purged> {
        let now_ms = now.timestamp_millis();
        let (ids, emails): (Vec<i64>, Vec<String>) = self
            .store
            .list_inbounds()
            .await?
            .iter()
            .filter(|entry| inbound_id.map_or(true, |id| entry.inbound.id == id))
            .flat_map(|entry| entry.client_stats.iter())
            .filter(|c| !c.enable && c.is_depleted(now_ms))
            .map(|c| (c.id, c.email.clone()))
            .unzip();

        let deleted = self.store.delete_clients(&ids).await?;
        if deleted > 0 {
            info!("🗑️ 已清理 {} 个耗尽的客户端", deleted);
        }
        Ok(Purged { deleted, emails })
    }

    /// 清零单个客户端流量
    ///
    /// 返回 None 表示客户端不存在；`Some(true)` 表示客户端因配额被禁用、
    /// 清零后重新启用，需要重载引擎。管理员手动停用的客户端保持停用。
    pub async fn reset_client_traffic(
        &self,
        inbound_id: i64,
        email: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<bool>> {
        let inbounds = self.store.list_inbounds().await?;
        let Some(client) = inbounds
            .iter()
            .filter(|entry| entry.inbound.id == inbound_id)
            .flat_map(|entry| entry.client_stats.iter())
            .find(|c| c.email == email)
        else {
            return Ok(None);
        };

        let reenable = reenable_after_reset(
            client.enable,
            client.quota_exhausted(),
            client.expired_at(now.timestamp_millis()),
        );
        self.store.reset_client_traffic(client.id, reenable).await?;
        info!("客户端 {} 流量已清零", client.email);
        Ok(Some(reenable))
    }

    /// 清零所有入站自身的计数，返回重新启用的入站数
    pub async fn reset_all_inbound_traffic(&self, now: DateTime<Utc>) -> Result<usize> {
        let now_ms = now.timestamp_millis();
        let mut reenabled = 0;
        for entry in self.store.list_inbounds().await? {
            let inbound = &entry.inbound;
            let reenable =
                reenable_after_reset(inbound.enable, inbound.quota_exhausted(), inbound.expired_at(now_ms));
            self.store.reset_inbound_counters(inbound.id, reenable).await?;
            if reenable {
                reenabled += 1;
            }
        }
        info!("所有入站流量已清零，重新启用 {} 个入站", reenabled);
        Ok(reenabled)
    }

    /// 清零客户端计数，`inbound_id` 为 None 时处理全部入站，返回重新启用的客户端数
    pub async fn reset_all_client_traffic(
        &self,
        inbound_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let now_ms = now.timestamp_millis();
        let mut reenabled = 0;
        let inbounds = self.store.list_inbounds().await?;
        for client in inbounds
            .iter()
            .filter(|entry| inbound_id.map_or(true, |id| entry.inbound.id == id))
            .flat_map(|entry| entry.client_stats.iter())
        {
            let reenable =
                reenable_after_reset(client.enable, client.quota_exhausted(), client.expired_at(now_ms));
            self.store.reset_client_traffic(client.id, reenable).await?;
            if reenable {
                reenabled += 1;
            }
        }
        info!("客户端流量已清零，重新启用 {} 个客户端", reenabled);
        Ok(reenabled)
    }
}

/// 到期且设置了续期天数的客户端，返回越过 `now` 的新到期时间
fn renewed_expiry(client: &client_traffic::Model, now_ms: i64) -> Option<i64> {
    if client.reset <= 0 || !client.expired_at(now_ms) {
        return None;
    }
    let period = i64::from(client.reset) * DAY_MS;
    let steps = (now_ms - client.expiry_time) / period + 1;
    Some(client.expiry_time + steps * period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{client, inbound, MemoryStore};

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn test_quota_and_expiry_boundaries_disable() {
        let mut exact_quota = client(1, 1, "quota");
        exact_quota.total = 1000;
        exact_quota.up = 600;
        exact_quota.down = 400;
        let mut exact_expiry = client(2, 1, "expiry");
        exact_expiry.expiry_time = 5_000;
        let mut both = client(3, 1, "both");
        both.total = 10;
        both.up = 10;
        both.expiry_time = 1;
        let mut under = client(4, 1, "under");
        under.total = 1000;
        under.up = 999;
        under.expiry_time = 5_001;

        let store = Arc::new(MemoryStore::new(
            vec![inbound(1, "proxy1")],
            vec![exact_quota, exact_expiry, both, under],
        ));
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        let result = enforcer.enforce(at(5_000)).await;
        assert!(result.restart_needed);
        assert_eq!(
            result.disabled,
            vec![
                DisabledClient { email: "quota".into(), inbound_id: 1, by_quota: true, by_expiry: false },
                DisabledClient { email: "expiry".into(), inbound_id: 1, by_quota: false, by_expiry: true },
                DisabledClient { email: "both".into(), inbound_id: 1, by_quota: true, by_expiry: true },
            ]
        );
        assert!(store.client_by_email("under").enable);

        // 再次执行无变化
        let again = enforcer.enforce(at(5_000)).await;
        assert!(!again.restart_needed);
        assert!(again.disabled.is_empty());
    }

    #[tokio::test]
    async fn test_depleted_inbound_is_disabled() {
        let mut proxy = inbound(1, "proxy1");
        proxy.total = 100;
        proxy.down = 100;
        let store = Arc::new(MemoryStore::new(vec![proxy, inbound(2, "proxy2")], vec![]));
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        let result = enforcer.enforce(at(1)).await;
        assert_eq!(result.disabled_inbounds, vec!["proxy1"]);
        assert!(!store.inbound_by_tag("proxy1").enable);
        assert!(store.inbound_by_tag("proxy2").enable);
    }

    #[tokio::test]
    async fn test_auto_renew_instead_of_disable() {
        let mut renewing = client(1, 1, "renew");
        renewing.reset = 30;
        renewing.expiry_time = 1_000;
        renewing.up = 50;
        renewing.enable = false;
        let store = Arc::new(MemoryStore::new(vec![inbound(1, "proxy1")], vec![renewing]));
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        let now = 1_000 + 45 * DAY_MS;
        let result = enforcer.enforce(at(now)).await;
        assert!(result.restart_needed);
        assert_eq!(result.renewed, vec!["renew"]);
        assert!(result.disabled.is_empty());

        let renewed = store.client_by_email("renew");
        assert!(renewed.enable);
        assert_eq!(renewed.expiry_time, 1_000 + 60 * DAY_MS);
        assert_eq!((renewed.up, renewed.all_time), (0, 50));
    }

    #[tokio::test]
    async fn test_persistence_failure_is_collected() {
        let mut broken = client(1, 1, "broken");
        broken.expiry_time = 1;
        let mut other = client(2, 1, "other");
        other.expiry_time = 1;
        let store = Arc::new(MemoryStore::new(vec![inbound(1, "proxy1")], vec![broken, other]));
        store.fail_on("broken");
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        let result = enforcer.enforce(at(10)).await;
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].entity, "client:broken");
        assert!(result.restart_needed);
        assert!(!store.client_by_email("other").enable);
    }

    #[tokio::test]
    async fn test_purge_only_disabled_and_depleted() {
        let mut gone = client(1, 1, "gone");
        gone.enable = false;
        gone.expiry_time = 1;
        let mut paused = client(2, 1, "paused");
        paused.enable = false;
        let mut active_depleted = client(3, 1, "active");
        active_depleted.expiry_time = 1;
        let mut elsewhere = client(4, 2, "elsewhere");
        elsewhere.enable = false;
        elsewhere.total = 1;
        elsewhere.up = 1;

        let store = Arc::new(MemoryStore::new(
            vec![inbound(1, "proxy1"), inbound(2, "proxy2")],
            vec![gone, paused, active_depleted, elsewhere],
        ));
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        assert_eq!(
            enforcer.purge_depleted(Some(1), at(10)).await.unwrap(),
            Purged { deleted: 1, emails: vec!["gone".into()] }
        );
        assert_eq!(enforcer.purge_depleted(None, at(10)).await.unwrap().emails, vec!["elsewhere"]);
        assert_eq!(enforcer.purge_depleted(None, at(10)).await.unwrap(), Purged::default());
        let left: Vec<String> = store
            .list_inbounds()
            .await
            .unwrap()
            .into_iter()
            .flat_map(|e| e.client_stats)
            .map(|c| c.email)
            .collect();
        assert_eq!(left, vec!["paused", "active"]);
    }

    #[tokio::test]
    async fn test_reset_single_client() {
        let mut u1 = client(1, 1, "u1");
        u1.total = 10;
        u1.up = 10;
        u1.enable = false;
        let store = Arc::new(MemoryStore::new(vec![inbound(1, "proxy1")], vec![u1]));
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        assert_eq!(enforcer.reset_client_traffic(1, "u1", at(10)).await.unwrap(), Some(true));
        let u1 = store.client_by_email("u1");
        assert!(u1.enable);
        assert_eq!((u1.up, u1.all_time), (0, 10));

        assert_eq!(enforcer.reset_client_traffic(1, "u1", at(10)).await.unwrap(), Some(false));
        assert_eq!(enforcer.reset_client_traffic(2, "u1", at(10)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_reset_keeps_admin_paused_client_disabled() {
        let mut paused = client(1, 1, "paused");
        paused.enable = false;
        paused.up = 5;
        paused.total = 1000;
        let mut lapsed = client(2, 1, "lapsed");
        lapsed.enable = false;
        lapsed.total = 10;
        lapsed.up = 10;
        lapsed.expiry_time = 1;
        let store = Arc::new(MemoryStore::new(vec![inbound(1, "proxy1")], vec![paused, lapsed]));
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        assert_eq!(enforcer.reset_client_traffic(1, "paused", at(10)).await.unwrap(), Some(false));
        let paused = store.client_by_email("paused");
        assert!(!paused.enable);
        assert_eq!((paused.up, paused.all_time), (0, 5));

        // 已到期的客户端清零后也不启用
        assert_eq!(enforcer.reset_client_traffic(1, "lapsed", at(10)).await.unwrap(), Some(false));
        assert!(!store.client_by_email("lapsed").enable);
    }

    #[tokio::test]
    async fn test_reset_all_client_traffic_scoped() {
        let mut over = client(1, 1, "over");
        over.enable = false;
        over.total = 10;
        over.up = 10;
        let mut paused = client(2, 1, "paused");
        paused.enable = false;
        paused.down = 3;
        let mut other = client(3, 2, "other");
        other.enable = false;
        other.total = 1;
        other.up = 1;
        let store = Arc::new(MemoryStore::new(
            vec![inbound(1, "proxy1"), inbound(2, "proxy2")],
            vec![over, paused, other],
        ));
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        assert_eq!(enforcer.reset_all_client_traffic(Some(1), at(10)).await.unwrap(), 1);
        assert!(store.client_by_email("over").enable);
        assert!(!store.client_by_email("paused").enable);
        assert_eq!(store.client_by_email("paused").all_time, 3);
        assert_eq!(store.client_by_email("other").up, 1);

        assert_eq!(enforcer.reset_all_client_traffic(None, at(10)).await.unwrap(), 1);
        assert!(store.client_by_email("other").enable);
    }

    #[tokio::test]
    async fn test_reset_all_inbound_traffic() {
        let mut full = inbound(1, "proxy1");
        full.enable = false;
        full.total = 100;
        full.up = 100;
        let mut stopped = inbound(2, "proxy2");
        stopped.enable = false;
        stopped.down = 7;
        let mut u1 = client(1, 1, "u1");
        u1.up = 4;
        let store = Arc::new(MemoryStore::new(vec![full, stopped], vec![u1]));
        let enforcer = ClientLifecycleEnforcer::new(store.clone());

        assert_eq!(enforcer.reset_all_inbound_traffic(at(10)).await.unwrap(), 1);
        let full = store.inbound_by_tag("proxy1");
        assert!(full.enable);
        assert_eq!((full.up, full.all_time), (0, 100));
        let stopped = store.inbound_by_tag("proxy2");
        assert!(!stopped.enable);
        assert_eq!(stopped.all_time, 7);
        assert_eq!(store.client_by_email("u1").up, 4);
    }
}
