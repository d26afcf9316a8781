//! 流量任务错误分类

use std::fmt;

use thiserror::Error;

/// 单个实体持久化失败
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceFailure {
    /// 失败实体，如 `inbound:proxy1`、`client:u1`
    pub entity: String,
    pub reason: String,
}

impl PersistenceFailure {
    pub fn new(entity: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            entity: entity.into(),
            reason: error.to_string(),
        }
    }
}

impl fmt::Display for PersistenceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum TrafficError {
    /// 引擎未运行或读取失败，本周期整体跳过
    #[error("代理引擎不可用: {reason}")]
    EngineUnavailable { reason: String },

    /// 部分实体写入失败，其余实体已正常处理
    #[error("{} 个实体持久化失败: {}", .0.len(), join_failures(.0))]
    Persistence(Vec<PersistenceFailure>),

    /// 外部推送失败，只记录日志
    #[error("外部流量推送失败: {0}")]
    Notification(String),

    /// 重置周期表达式等配置无效，受影响实体本次跳过
    #[error("配置错误: {0}")]
    Configuration(String),
}

fn join_failures(failures: &[PersistenceFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
