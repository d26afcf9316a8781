//! 外部流量推送
//!
//! 每个周期最多一次 POST，不重试。推送在独立任务中执行，
//! 结果只记录日志，不影响记账、生命周期判断和实时广播。

use std::time::Duration;

use common::{ClientTraffic, InboundTraffic};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::TrafficError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InformPayload<'a> {
    client_traffics: &'a [ClientTraffic],
    inbound_traffics: &'a [InboundTraffic],
}

#[derive(Clone)]
pub struct ExternalNotifier {
    client: reqwest::Client,
}

impl ExternalNotifier {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// 在后台任务中推送本周期增量，调用方无需等待
    pub fn notify(
        &self,
        uri: String,
        inbounds: Vec<InboundTraffic>,
        clients: Vec<ClientTraffic>,
    ) -> JoinHandle<()> {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.post(&uri, &inbounds, &clients).await {
                warn!("{}", e);
            }
        })
    }

    pub async fn post(
        &self,
        uri: &str,
        inbounds: &[InboundTraffic],
        clients: &[ClientTraffic],
    ) -> Result<(), TrafficError> {
        let payload = InformPayload {
            client_traffics: clients,
            inbound_traffics: inbounds,
        };

        let resp = self
            .client
            .post(uri)
            .json(&payload)
            .send()
            .await
            .map_err(|e| TrafficError::Notification(format!("{}: {}", uri, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TrafficError::Notification(format!("{} 返回 {}", uri, status)));
        }

        debug!("📤 外部流量推送完成: {}", uri);
        Ok(())
    }
}
