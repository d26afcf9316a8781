//! 流量统计周期任务
//!
//! 一个周期依次执行：拉取增量、刷新在线状态、累加与定期重置、
//! 生命周期检查、合并重载、提交后读取并广播，最后按配置推送外部地址。
//! 同一时刻最多只有一个周期在执行。

mod accumulator;
mod collector;
mod lifecycle;
mod restart;

pub use accumulator::{Accumulated, TrafficAccumulator};
pub use collector::TrafficCollector;
pub use lifecycle::{ClientLifecycleEnforcer, DisabledClient, Enforced, Purged};
pub use restart::{combine, RestartCoordinator};

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use common::ProxyEngine;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::broadcast::{BroadcastPublisher, PublishStats, TrafficUpdate};
use crate::config_manager::ConfigManager;
use crate::error::{PersistenceFailure, TrafficError};
use crate::notifier::ExternalNotifier;
use crate::online::OnlineClientTracker;
use crate::store::InboundStore;

/// 单个周期的执行结果
#[derive(Debug, Default)]
pub struct CycleReport {
    pub inbound_deltas: usize,
    pub client_deltas: usize,
    pub resets: usize,
    pub disabled: Vec<DisabledClient>,
    pub disabled_inbounds: Vec<String>,
    pub renewed: Vec<String>,
    pub reload_requested: bool,
    pub online: usize,
    pub published: Option<PublishStats>,
    pub notified: bool,
}

#[derive(Debug)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// 上一个周期仍在执行，本次未做任何事
    Busy,
}

pub struct TrafficJob {
    store: Arc<dyn InboundStore>,
    collector: TrafficCollector,
    accumulator: TrafficAccumulator,
    enforcer: ClientLifecycleEnforcer,
    restart: RestartCoordinator,
    tracker: Arc<OnlineClientTracker>,
    publisher: BroadcastPublisher,
    notifier: ExternalNotifier,
    config_manager: Arc<ConfigManager>,
    running: Mutex<()>,
}

impl TrafficJob {
    pub fn new(
        store: Arc<dyn InboundStore>,
        engine: Arc<dyn ProxyEngine>,
        tracker: Arc<OnlineClientTracker>,
        publisher: BroadcastPublisher,
        notifier: ExternalNotifier,
        config_manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            collector: TrafficCollector::new(engine.clone()),
            accumulator: TrafficAccumulator::new(store.clone()),
            enforcer: ClientLifecycleEnforcer::new(store.clone()),
            restart: RestartCoordinator::new(engine),
            store,
            tracker,
            publisher,
            notifier,
            config_manager,
            running: Mutex::new(()),
        }
    }

    pub async fn run(&self) -> Result<CycleOutcome, TrafficError> {
        self.run_at(Utc::now()).await
    }

    /// 以给定时刻执行一个周期
    ///
    /// 引擎不可用时返回 `EngineUnavailable` 且不做任何写入与广播；
    /// 部分实体写入失败时其余阶段照常执行，最后返回 `Persistence` 汇总。
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CycleOutcome, TrafficError> {
        let Ok(_guard) = self.running.try_lock() else {
            return Ok(CycleOutcome::Busy);
        };

        let snapshot = self.collector.collect().await?;
        let mut report = CycleReport {
            inbound_deltas: snapshot.inbounds.len(),
            client_deltas: snapshot.clients.len(),
            ..CycleReport::default()
        };

        let active = self.collector.active_clients(&snapshot).await;
        let online = self.tracker.refresh(active, now.timestamp_millis()).await;
        report.online = online.online_clients.len();

        let accumulated = self.accumulator.apply(&snapshot, now).await;
        let enforced = self.enforcer.enforce(now).await;

        report.reload_requested = self
            .restart
            .reload_if_needed(&[accumulated.restart_needed, enforced.restart_needed])
            .await;
        report.resets = accumulated.resets;
        report.disabled = enforced.disabled;
        report.disabled_inbounds = enforced.disabled_inbounds;
        report.renewed = enforced.renewed;

        let mut failures = accumulated.failures;
        failures.extend(enforced.failures);

        // 广播内容全部来自提交后的同一次读取
        match self.store.list_inbounds().await {
            Ok(inbound_snapshot) => {
                let update = TrafficUpdate {
                    inbound_snapshot,
                    traffic_deltas: snapshot.inbounds.clone(),
                    client_traffic_deltas: snapshot.clients.clone(),
                    online_clients: online.online_clients.clone(),
                    last_online: online.last_online.clone(),
                };
                report.published = Some(self.publisher.publish(update).await);
            }
            Err(e) => {
                warn!("读取入站快照失败，本周期不广播: {}", e);
                failures.push(PersistenceFailure::new("inbounds", e));
            }
        }

        if let Some(uri) = self.config_manager.external_traffic_inform().await {
            self.notifier.notify(uri, snapshot.inbounds, snapshot.clients);
            report.notified = true;
        }

        if !failures.is_empty() {
            return Err(TrafficError::Persistence(failures));
        }
        Ok(CycleOutcome::Completed(report))
    }

    /// 显式清理耗尽的客户端，与周期任务互斥
    ///
    /// 删除了客户端时清掉它们的在线记录，并请求一次引擎重载。
    pub async fn purge_depleted(&self, inbound_id: Option<i64>) -> Result<u64> {
        let _guard = self.running.lock().await;
        let purged = self.enforcer.purge_depleted(inbound_id, Utc::now()).await?;
        if purged.deleted > 0 {
            self.tracker.forget(&purged.emails).await;
            self.restart.reload_if_needed(&[true]).await;
        }
        Ok(purged.deleted)
    }

    /// 清零单个客户端流量；客户端因此被重新启用时请求一次引擎重载
    pub async fn reset_client_traffic(&self, inbound_id: i64, email: &str) -> Result<bool> {
        let _guard = self.running.lock().await;
        match self.enforcer.reset_client_traffic(inbound_id, email, Utc::now()).await? {
            Some(reenabled) => {
                self.restart.reload_if_needed(&[reenabled]).await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// 清零所有入站自身的流量，之后请求一次引擎重载
    pub async fn reset_all_traffic(&self) -> Result<()> {
        let _guard = self.running.lock().await;
        self.enforcer.reset_all_inbound_traffic(Utc::now()).await?;
        self.restart.reload_if_needed(&[true]).await;
        Ok(())
    }

    /// 清零客户端流量，`inbound_id` 为 None 时处理全部入站，之后请求一次引擎重载
    pub async fn reset_all_client_traffic(&self, inbound_id: Option<i64>) -> Result<()> {
        let _guard = self.running.lock().await;
        self.enforcer.reset_all_client_traffic(inbound_id, Utc::now()).await?;
        self.restart.reload_if_needed(&[true]).await;
        Ok(())
    }

    /// 按固定周期执行，错过的节拍直接跳过
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!("📋 流量统计任务已启动，周期 {:?}", period);

            loop {
                interval.tick().await;

                match self.run().await {
                    Ok(CycleOutcome::Completed(report)) => debug!(
                        "流量周期完成: {} 个入站增量, {} 个客户端增量, {} 人在线, 重载: {}",
                        report.inbound_deltas, report.client_deltas, report.online, report.reload_requested
                    ),
                    Ok(CycleOutcome::Busy) => debug!("上一个流量周期仍在执行，跳过本次"),
                    Err(TrafficError::EngineUnavailable { reason }) => {
                        debug!("跳过流量周期: {}", reason)
                    }
                    Err(e) => warn!("流量周期部分失败: {}", e),
                }
            }
        })
    }
}
