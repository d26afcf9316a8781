use std::collections::HashMap;

use axum::extract::{Extension, Path};
use axum::response::Json;
use tracing::warn;

use super::ApiResponse;
use crate::api::AppState;

/// 当前在线的客户端
pub async fn onlines(Extension(state): Extension<AppState>) -> Json<ApiResponse<Vec<String>>> {
    ApiResponse::success(state.tracker.online_clients().await)
}

/// 客户端最后在线时间（毫秒）
pub async fn last_online(
    Extension(state): Extension<AppState>,
) -> Json<ApiResponse<HashMap<String, i64>>> {
    ApiResponse::success(state.tracker.last_online_snapshot().await)
}

/// 清理已禁用且耗尽的客户端，`id = -1` 表示全部入站
pub async fn del_depleted_clients(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> Json<ApiResponse<u64>> {
    let inbound_id = (id >= 0).then_some(id);
    match state.job.purge_depleted(inbound_id).await {
        Ok(count) => ApiResponse::success(count),
        Err(e) => {
            warn!("清理耗尽客户端失败: {}", e);
            ApiResponse::error(format!("清理耗尽客户端失败: {}", e))
        }
    }
}

pub async fn reset_client_traffic(
    Extension(state): Extension<AppState>,
    Path((id, email)): Path<(i64, String)>,
) -> Json<ApiResponse<()>> {
    match state.job.reset_client_traffic(id, &email).await {
        Ok(true) => ApiResponse::success(()),
        Ok(false) => ApiResponse::error(format!("入站 #{} 中不存在客户端 {}", id, email)),
        Err(e) => {
            warn!("重置客户端 {} 流量失败: {}", email, e);
            ApiResponse::error(format!("重置客户端流量失败: {}", e))
        }
    }
}

/// 清零所有入站自身的流量
pub async fn reset_all_traffics(Extension(state): Extension<AppState>) -> Json<ApiResponse<()>> {
    match state.job.reset_all_traffic().await {
        Ok(()) => ApiResponse::success(()),
        Err(e) => {
            warn!("重置所有入站流量失败: {}", e);
            ApiResponse::error(format!("重置所有入站流量失败: {}", e))
        }
    }
}

/// 清零入站下所有客户端的流量，`id = -1` 表示全部入站
pub async fn reset_all_client_traffics(
    Extension(state): Extension<AppState>,
    Path(id): Path<i64>,
) -> Json<ApiResponse<()>> {
    let inbound_id = (id >= 0).then_some(id);
    match state.job.reset_all_client_traffic(inbound_id).await {
        Ok(()) => ApiResponse::success(()),
        Err(e) => {
            warn!("重置客户端流量失败: {}", e);
            ApiResponse::error(format!("重置客户端流量失败: {}", e))
        }
    }
}
