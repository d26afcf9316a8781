use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Extension, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::api::{secret_matches, AppState};
use crate::broadcast::{BroadcastPublisher, Subscription};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub secret: Option<String>,
}

/// 实时流量推送
///
/// 浏览器无法为 WebSocket 设置请求头，密钥通过查询参数传入。
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<AppState>,
    Query(query): Query<WsQuery>,
) -> Response {
    if !secret_matches(query.secret.as_deref(), &state.panel_secret) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    ws.on_upgrade(move |socket| handle_socket(socket, state.publisher))
}

async fn handle_socket(mut socket: WebSocket, publisher: BroadcastPublisher) {
    let Subscription { id, mut receiver } = publisher.subscribe().await;

    loop {
        tokio::select! {
            update = receiver.recv() => {
                let Some(update) = update else { break };
                let json = match serde_json::to_string(update.as_ref()) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("序列化实时快照失败: {}", e);
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {}
                }
            }
        }
    }

    publisher.unsubscribe(id).await;
    debug!("实时订阅 {} 已断开", id);
}
