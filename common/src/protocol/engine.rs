//! 代理引擎控制 trait
//!
//! 定义了面板对运行中代理引擎的全部依赖。

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::traffic::TrafficSnapshot;

/// 引擎运行状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub running: bool,
    #[serde(default)]
    pub version: Option<String>,
}

/// 当前有活跃连接的客户端
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActiveConnections {
    pub clients: Vec<String>,
}

/// 代理引擎接口
///
/// 由引擎侧代理实现（本地直接调用），或由面板通过 HTTP 远程调用。
#[async_trait]
pub trait ProxyEngine: Send + Sync {
    /// 引擎是否正在运行
    async fn is_running(&self) -> bool;

    /// 读取并清零引擎的流量计数器
    ///
    /// 返回值是自上次读取以来的增量，同一份增量不会被返回两次。
    async fn read_traffic_snapshot(&self) -> Result<TrafficSnapshot>;

    /// 当前有活跃连接的客户端 email 列表
    async fn active_connections(&self) -> Result<Vec<String>>;

    /// 请求引擎重新加载配置（幂等，短时间内多次调用效果相同）
    async fn request_reload(&self) -> Result<()>;
}
