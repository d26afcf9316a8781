use std::mem::discriminant;

use axum::extract::Extension;
use axum::response::Json;
use serde::Deserialize;
use tracing::info;

use super::ApiResponse;
use crate::api::AppState;
use crate::config_manager::ConfigValue;
use crate::entity::system_config::SystemConfigItem;

#[derive(Debug, Deserialize)]
pub struct UpdateSettingRequest {
    pub key: String,
    pub value: serde_json::Value,
}

/// 获取全部运行时配置
pub async fn all_settings(
    Extension(state): Extension<AppState>,
) -> Json<ApiResponse<Vec<SystemConfigItem>>> {
    match state.config_manager.list_items().await {
        Ok(items) => ApiResponse::success(items),
        Err(e) => ApiResponse::error(format!("获取配置失败: {}", e)),
    }
}

/// 更新单个运行时配置，下一个流量周期生效
pub async fn update_setting(
    Extension(state): Extension<AppState>,
    Json(payload): Json<UpdateSettingRequest>,
) -> Json<ApiResponse<()>> {
    let Some(current) = state.config_manager.get(&payload.key).await else {
        return ApiResponse::error(format!("配置项不存在: {}", payload.key));
    };

    let value = ConfigValue::from_json(&payload.value);
    if discriminant(&current) != discriminant(&value) {
        return ApiResponse::error(format!("配置值类型错误: {}", payload.key));
    }

    match state.config_manager.set(&payload.key, value).await {
        Ok(()) => {
            info!("配置项 {} 已更新", payload.key);
            ApiResponse::success(())
        }
        Err(e) => ApiResponse::error(format!("更新配置失败: {}", e)),
    }
}
