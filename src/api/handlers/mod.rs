pub mod inbounds;
pub mod settings;
pub mod ws;

pub use inbounds::*;
pub use settings::*;
pub use ws::*;

use serde::Serialize;

/// 统一响应格式
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub msg: String,
    pub obj: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(obj: T) -> axum::response::Json<Self> {
        axum::response::Json(Self {
            success: true,
            msg: String::new(),
            obj: Some(obj),
        })
    }

    pub fn error(msg: String) -> axum::response::Json<Self> {
        axum::response::Json(Self {
            success: false,
            msg,
            obj: None,
        })
    }
}
