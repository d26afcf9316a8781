//! 实时状态广播
//!
//! 每个订阅者一个有界通道。发送使用 `try_send`，通道满时丢弃该订阅者
//! 本次消息，已断开的订阅者直接移除，不会阻塞流量任务。

use std::collections::HashMap;
use std::sync::Arc;

use common::{ClientTraffic, InboundTraffic};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

use crate::store::InboundWithClients;

/// 每个周期推送给订阅者的完整快照
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficUpdate {
    pub inbound_snapshot: Vec<InboundWithClients>,
    pub traffic_deltas: Vec<InboundTraffic>,
    pub client_traffic_deltas: Vec<ClientTraffic>,
    pub online_clients: Vec<String>,
    pub last_online: HashMap<String, i64>,
}

pub struct Subscription {
    pub id: Uuid,
    pub receiver: mpsc::Receiver<Arc<TrafficUpdate>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub delivered: usize,
    pub dropped: usize,
    pub removed: usize,
}

#[derive(Clone)]
pub struct BroadcastPublisher {
    subscribers: Arc<Mutex<HashMap<Uuid, mpsc::Sender<Arc<TrafficUpdate>>>>>,
    buffer: usize,
}

impl BroadcastPublisher {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            buffer: buffer.max(1),
        }
    }

    pub async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        let mut subs = self.subscribers.lock().await;
        subs.insert(id, tx);
        debug!("新增实时订阅者 {} (共 {} 个)", id, subs.len());
        Subscription { id, receiver: rx }
    }

    pub async fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.lock().await.remove(&id).is_some() {
            debug!("移除实时订阅者 {}", id);
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.lock().await.len()
    }

    /// 推送一份快照；没有订阅者时什么也不做
    pub async fn publish(&self, update: TrafficUpdate) -> PublishStats {
        let mut subs = self.subscribers.lock().await;
        let mut stats = PublishStats::default();
        if subs.is_empty() {
            return stats;
        }

        let update = Arc::new(update);
        subs.retain(|id, tx| match tx.try_send(update.clone()) {
            Ok(()) => {
                stats.delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("订阅者 {} 缓冲区已满，丢弃本次推送", id);
                stats.dropped += 1;
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                stats.removed += 1;
                false
            }
        });

        if stats.removed > 0 {
            debug!("移除 {} 个已断开的实时订阅者", stats.removed);
        }
        stats
    }
}
