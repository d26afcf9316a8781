//! 从引擎拉取本周期流量增量

use std::sync::Arc;

use common::{ProxyEngine, TrafficSnapshot};
use tracing::debug;

use crate::error::TrafficError;

pub struct TrafficCollector {
    engine: Arc<dyn ProxyEngine>,
}

impl TrafficCollector {
    pub fn new(engine: Arc<dyn ProxyEngine>) -> Self {
        Self { engine }
    }

    /// 读取并消费引擎计数器
    ///
    /// 引擎未运行或读取失败都返回 `EngineUnavailable`，调用方应跳过整个周期。
    pub async fn collect(&self) -> Result<TrafficSnapshot, TrafficError> {
        if !self.engine.is_running().await {
            return Err(TrafficError::EngineUnavailable {
                reason: "引擎未运行".to_string(),
            });
        }

        self.engine
            .read_traffic_snapshot()
            .await
            .map_err(|e| TrafficError::EngineUnavailable {
                reason: format!("读取流量失败: {:#}", e),
            })
    }

    /// 本周期在线客户端：活跃连接与产生流量的客户端的并集
    ///
    /// 连接查询失败时只使用流量推断的结果。
    pub async fn active_clients(&self, snapshot: &TrafficSnapshot) -> Vec<String> {
        let mut active: Vec<String> = snapshot.active_emails().map(str::to_string).collect();
        match self.engine.active_connections().await {
            Ok(connections) => active.extend(connections),
            Err(e) => debug!("读取活跃连接失败，仅按流量判断在线: {}", e),
        }
        active
    }
}
