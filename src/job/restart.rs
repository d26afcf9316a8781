//! 合并本周期的重载信号，每周期最多请求一次引擎重载

use std::sync::Arc;

use common::ProxyEngine;
use tracing::{info, warn};

pub fn combine(signals: &[bool]) -> bool {
    signals.iter().any(|signal| *signal)
}

pub struct RestartCoordinator {
    engine: Arc<dyn ProxyEngine>,
}

impl RestartCoordinator {
    pub fn new(engine: Arc<dyn ProxyEngine>) -> Self {
        Self { engine }
    }

    /// 任一信号为 true 时请求一次重载，返回是否已成功发出请求
    pub async fn reload_if_needed(&self, signals: &[bool]) -> bool {
        if !combine(signals) {
            return false;
        }
        match self.engine.request_reload().await {
            Ok(()) => {
                info!("🔃 已请求代理引擎重新加载配置");
                true
            }
            Err(e) => {
                warn!("请求代理引擎重新加载失败: {}", e);
                false
            }
        }
    }
}
