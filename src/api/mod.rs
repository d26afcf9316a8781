use std::sync::Arc;

use axum::extract::Request;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{from_fn, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::broadcast::BroadcastPublisher;
use crate::config_manager::ConfigManager;
use crate::job::TrafficJob;
use crate::online::OnlineClientTracker;

pub mod handlers;

use handlers::ApiResponse;

/// 管理接口共享状态
#[derive(Clone)]
pub struct AppState {
    pub job: Arc<TrafficJob>,
    pub tracker: Arc<OnlineClientTracker>,
    pub publisher: BroadcastPublisher,
    pub config_manager: Arc<ConfigManager>,
    /// 为空时不校验
    pub panel_secret: String,
}

pub fn router(app_state: AppState) -> Router {
    let api_routes = Router::new()
        // 在线状态
        .route("/inbounds/onlines", post(handlers::onlines))
        .route("/inbounds/lastOnline", post(handlers::last_online))
        // 客户端维护
        .route("/inbounds/delDepletedClients/{id}", post(handlers::del_depleted_clients))
        .route("/inbounds/{id}/resetClientTraffic/{email}", post(handlers::reset_client_traffic))
        .route("/inbounds/resetAllTraffics", post(handlers::reset_all_traffics))
        .route("/inbounds/resetAllClientTraffics/{id}", post(handlers::reset_all_client_traffics))
        // 运行时配置
        .route("/settings/all", get(handlers::all_settings))
        .route("/settings/update", post(handlers::update_setting))
        .layer(from_fn(secret_middleware));

    Router::new()
        .nest("/panel/api", api_routes)
        .route("/ws", get(handlers::ws_handler))
        .layer(Extension(app_state))
        .layer(CorsLayer::permissive())
}

/// 启动 Web 服务
pub fn start_web_server(app_state: AppState, web_port: u16) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = router(app_state);

        let web_addr = format!("0.0.0.0:{}", web_port);
        match tokio::net::TcpListener::bind(web_addr.clone()).await {
            Ok(listener) => {
                info!("🌐 面板接口: http://{}", web_addr);
                if let Err(err) = axum::serve(listener, app).await {
                    tracing::error!("Web服务错误：{}", err);
                }
            }
            Err(err) => {
                tracing::error!("Web服务启动失败：{}", err);
            }
        }
    })
}

pub(crate) fn secret_matches(provided: Option<&str>, expected: &str) -> bool {
    if expected.is_empty() {
        return true;
    }
    provided.map(|s| s == expected).unwrap_or(false)
}

fn header_secret(headers: &HeaderMap) -> Option<&str> {
    headers.get("X-Panel-Secret").and_then(|v| v.to_str().ok())
}

async fn secret_middleware(request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AppState>()
        .map(|state| state.panel_secret.clone())
        .unwrap_or_default();

    if !secret_matches(header_secret(request.headers()), &expected) {
        return (
            StatusCode::UNAUTHORIZED,
            ApiResponse::<()>::error("未授权".to_string()),
        )
            .into_response();
    }
    next.run(request).await
}
