//! 代理引擎远程控制客户端
//!
//! 通过 HTTP REST API 调用引擎侧代理的内部接口，
//! 实现 ProxyEngine trait。

use anyhow::Result;
use async_trait::async_trait;
use common::protocol::engine::{ActiveConnections, EngineStatus, ProxyEngine};
use common::TrafficSnapshot;
use std::time::Duration;
use tracing::{debug, warn};

/// 远程引擎客户端
pub struct RemoteEngine {
    base_url: String,
    secret: String,
    client: reqwest::Client,
}

impl RemoteEngine {
    pub fn new(base_url: String, secret: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(resp: reqwest::Response, action: &str) -> Result<reqwest::Response> {
        if resp.status().is_success() {
            Ok(resp)
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(anyhow::anyhow!("引擎{}失败: {} - {}", action, status, body))
        }
    }
}

#[async_trait]
impl ProxyEngine for RemoteEngine {
    async fn is_running(&self) -> bool {
        let resp = self.client
            .get(self.url("/internal/status"))
            .header("X-Internal-Secret", &self.secret)
            .send()
            .await;

        match resp {
            Ok(resp) if resp.status().is_success() => match resp.json::<EngineStatus>().await {
                Ok(status) => status.running,
                Err(e) => {
                    warn!("解析引擎状态失败: {}", e);
                    false
                }
            },
            Ok(resp) => {
                debug!("引擎状态接口返回 {}", resp.status());
                false
            }
            Err(e) => {
                debug!("引擎状态接口不可达: {}", e);
                false
            }
        }
    }

    async fn read_traffic_snapshot(&self) -> Result<TrafficSnapshot> {
        let resp = self.client
            .post(self.url("/internal/traffic/snapshot"))
            .header("X-Internal-Secret", &self.secret)
            .send()
            .await?;

        let snapshot: TrafficSnapshot = Self::check(resp, "读取流量").await?.json().await?;
        debug!(
            "读取引擎流量: {} 个入站, {} 个客户端",
            snapshot.inbounds.len(),
            snapshot.clients.len()
        );
        Ok(snapshot)
    }

    async fn active_connections(&self) -> Result<Vec<String>> {
        let resp = self.client
            .get(self.url("/internal/connections"))
            .header("X-Internal-Secret", &self.secret)
            .send()
            .await?;

        let active: ActiveConnections = Self::check(resp, "读取在线连接").await?.json().await?;
        Ok(active.clients)
    }

    async fn request_reload(&self) -> Result<()> {
        debug!("请求引擎重新加载配置");
        let resp = self.client
            .post(self.url("/internal/reload"))
            .header("X-Internal-Secret", &self.secret)
            .send()
            .await?;

        Self::check(resp, "重新加载").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use common::{ClientTraffic, InboundTraffic};

    async fn spawn_engine(running: bool) -> String {
        let app = Router::new()
            .route(
                "/internal/status",
                get(move || async move { Json(EngineStatus { running, version: None }) }),
            )
            .route(
                "/internal/traffic/snapshot",
                post(|| async {
                    Json(TrafficSnapshot {
                        inbounds: vec![InboundTraffic::new("proxy1", 500, 200)],
                        clients: vec![ClientTraffic::new("u1", 60, 0)],
                    })
                }),
            )
            .route(
                "/internal/connections",
                get(|| async { Json(ActiveConnections { clients: vec!["u1".to_string()] }) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/", addr)
    }

    #[tokio::test]
    async fn test_remote_engine_reads_snapshot() {
        let url = spawn_engine(true).await;
        let engine = RemoteEngine::new(url, String::new(), Duration::from_secs(5)).unwrap();

        assert!(engine.is_running().await);
        let snapshot = engine.read_traffic_snapshot().await.unwrap();
        assert_eq!(snapshot.inbounds[0].tag, "proxy1");
        assert_eq!(snapshot.clients[0].up, 60);
        assert_eq!(engine.active_connections().await.unwrap(), vec!["u1".to_string()]);
        // 未注册的路由返回 404
        assert!(engine.request_reload().await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_not_running() {
        let url = spawn_engine(false).await;
        let engine = RemoteEngine::new(url, String::new(), Duration::from_secs(5)).unwrap();
        assert!(!engine.is_running().await);

        let engine = RemoteEngine::new(
            "http://127.0.0.1:1".to_string(),
            String::new(),
            Duration::from_millis(500),
        )
        .unwrap();
        assert!(!engine.is_running().await);
    }
}
