//! 在线客户端跟踪
//!
//! 在线集合和最后在线时间只保存在内存中，每个周期整体替换。
//! 读者拿到的是 `Arc` 快照，不会看到写了一半的周期。

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnlineSnapshot {
    /// 当前在线的客户端，已排序去重
    pub online_clients: Vec<String>,
    /// 客户端最后一次被观察到在线的时间（毫秒）
    pub last_online: HashMap<String, i64>,
}

#[derive(Clone, Default)]
pub struct OnlineClientTracker {
    state: Arc<RwLock<Arc<OnlineSnapshot>>>,
}

impl OnlineClientTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 用本周期观察到的在线集合替换旧状态
    ///
    /// 不在集合中的客户端移出在线列表，但保留其最后在线时间。
    pub async fn refresh<I, S>(&self, active: I, now_ms: i64) -> Arc<OnlineSnapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let online: BTreeSet<String> = active.into_iter().map(Into::into).collect();

        // 新快照在锁外构建，写锁只用于替换指针
        let previous = self.snapshot().await;
        let mut last_online = previous.last_online.clone();
        for key in &online {
            last_online.insert(key.clone(), now_ms);
        }

        let next = Arc::new(OnlineSnapshot {
            online_clients: online.into_iter().collect(),
            last_online,
        });

        *self.state.write().await = next.clone();
        next
    }

    /// 移除已删除客户端的在线状态与最后在线时间
    pub async fn forget(&self, keys: &[String]) {
        if keys.is_empty() {
            return;
        }
        let mut state = self.state.write().await;
        let mut next = (**state).clone();
        next.online_clients.retain(|k| !keys.contains(k));
        next.last_online.retain(|k, _| !keys.contains(k));
        *state = Arc::new(next);
    }

    pub async fn snapshot(&self) -> Arc<OnlineSnapshot> {
        self.state.read().await.clone()
    }

    pub async fn is_online(&self, key: &str) -> bool {
        self.snapshot()
            .await
            .online_clients
            .binary_search_by(|k| k.as_str().cmp(key))
            .is_ok()
    }

    pub async fn online_clients(&self) -> Vec<String> {
        self.snapshot().await.online_clients.clone()
    }

    pub async fn last_online_snapshot(&self) -> HashMap<String, i64> {
        self.snapshot().await.last_online.clone()
    }
}
