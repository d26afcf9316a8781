//! 面板进程配置模块

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// 面板配置
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// Web 管理界面端口
    #[serde(default = "default_web_port")]
    pub web_port: u16,

    /// 数据库路径
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// 代理引擎内部 API 地址
    #[serde(default = "default_engine_url")]
    pub engine_url: String,

    /// 调用引擎内部 API 的共享密钥
    #[serde(default)]
    pub engine_secret: Option<String>,

    /// 管理 API 共享密钥，为空时不校验
    #[serde(default)]
    pub panel_secret: Option<String>,

    /// 流量统计周期（秒）
    #[serde(default = "default_traffic_interval")]
    pub traffic_interval_secs: u64,

    /// 外部流量推送超时（秒）
    #[serde(default = "default_inform_timeout")]
    pub inform_timeout_secs: u64,

    /// 每个实时订阅者的待发送消息上限
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,

    /// 日志目录，设置后按天轮转写文件
    #[serde(default)]
    pub log_dir: Option<String>,
}

fn default_web_port() -> u16 {
    2053
}

fn default_db_path() -> String {
    "./data/x-ui.db".to_string()
}

fn default_engine_url() -> String {
    "http://127.0.0.1:62789".to_string()
}

fn default_traffic_interval() -> u64 {
    10
}

fn default_inform_timeout() -> u64 {
    10
}

fn default_subscriber_buffer() -> usize {
    32
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web_port: default_web_port(),
            db_path: default_db_path(),
            engine_url: default_engine_url(),
            engine_secret: None,
            panel_secret: None,
            traffic_interval_secs: default_traffic_interval(),
            inform_timeout_secs: default_inform_timeout(),
            subscriber_buffer: default_subscriber_buffer(),
            log_dir: None,
        }
    }
}

impl Config {
    /// 加载配置：显式路径优先，其次默认位置，最后使用默认值
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let config_paths = ["xpanel.toml", "../xpanel.toml"];
        for path_str in &config_paths {
            let path = Path::new(path_str);
            if path.exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("无法读取配置文件: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        Ok(config)
    }

    pub fn traffic_interval(&self) -> Duration {
        Duration::from_secs(self.traffic_interval_secs.max(1))
    }

    pub fn inform_timeout(&self) -> Duration {
        Duration::from_secs(self.inform_timeout_secs.max(1))
    }

    pub fn engine_secret(&self) -> String {
        self.engine_secret.clone().unwrap_or_default()
    }

    /// 管理 API 密钥，未配置或为空时返回空串
    pub fn panel_secret(&self) -> String {
        self.panel_secret.clone().unwrap_or_default()
    }
}
